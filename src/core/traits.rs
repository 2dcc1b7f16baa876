use std::sync::Arc;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;
use url::Url;
use crate::protocol::graphql::UploadPayload;
use super::types::UploadResult;
use super::errors::Result;

/// 进度回调：(已发送字节, 总字节)
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// 一次传输请求
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub endpoint: Url,
    pub headers: HeaderMap,
    pub payload: UploadPayload,
}

/// 传输适配器 trait - 负责把请求发送到服务端并报告进度
///
/// 每次调用只进行一次网络传输。`sent` 单调不减；调用返回后不得再触发回调。
/// `cancel` 被触发时以 `UploadError::Cancelled` 结束。
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
        progress: ProgressCallback,
        cancel: CancellationToken,
    ) -> Result<UploadResult>;
}
