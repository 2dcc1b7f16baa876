use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use crate::core::{ProgressCallback, Result, Transport, TransportRequest, UploadError, UploadResult};
use crate::progress::ProgressReporter;
use crate::protocol::graphql::parse_response;

/// 默认上传超时（2 分钟）
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub tcp_nodelay: bool,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_UPLOAD_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
            tcp_nodelay: true,
        }
    }
}

/// 基于 reqwest 的传输适配器
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .tcp_nodelay(config.tcp_nodelay)
            .build()
            .map_err(|err| UploadError::invalid_input(format!("Failed to build HTTP client: {}", err)))?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn network_error(err: reqwest::Error) -> UploadError {
    if err.is_timeout() {
        UploadError::network("Request timed out")
    } else if err.is_connect() {
        UploadError::network(format!("Network error occurred: {}", err))
    } else {
        UploadError::network(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: TransportRequest,
        progress: ProgressCallback,
        cancel: CancellationToken,
    ) -> Result<UploadResult> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let TransportRequest { endpoint, headers, payload } = request;
        let result_field = payload.descriptor.result_field;
        let file_name = payload.file_name.clone();
        let total = payload.size();

        let reporter = Arc::new(ProgressReporter::new(total, progress).with_cancel(cancel.clone()));
        let form = payload.into_form(reporter.clone())?;

        tracing::debug!(endpoint = %endpoint, bytes = total, "sending upload request");

        let request = self.client.post(endpoint.clone()).headers(headers).multipart(form);
        reporter.start();

        let exchange = async {
            let response = request.send().await.map_err(network_error)?;
            let status = response.status();

            let body = match response.text().await {
                Ok(body) => body,
                Err(err) if status.is_success() => return Err(network_error(err)),
                Err(_) => String::new(),
            };

            parse_response(status, &body, result_field, &file_name)
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UploadError::Cancelled),
            outcome = exchange => outcome,
        };

        // 之后连接任务可能仍在读取请求体，但不会再触发回调
        reporter.settle();

        match &outcome {
            Ok(result) => tracing::debug!(endpoint = %endpoint, id = %result.id, "upload request settled"),
            Err(err) => tracing::debug!(endpoint = %endpoint, error = %err, "upload request failed"),
        }

        outcome
    }
}
