use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;
use crate::auth::AuthSession;
use crate::core::{
    ProgressCallback, Result, SourceFile, Transport, TransportRequest, UploadError, UploadEvent,
    UploadId, UploadMode, UploadOperation, UploadResult, UploadState, UploadTask,
};
use crate::progress::percent_of;
use crate::protocol::graphql::UploadPayload;
use crate::transport::create_headers;
use crate::utils::retry::{retry_with_config, RetryConfig};
use crate::validation::{FileConstraints, FileLimits, Validator};
use super::preview::{PreviewHandle, PreviewStore};

/// 事件通道容量
const EVENT_CAPACITY: usize = 256;

/// 会话配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint: Url,
    pub auth: AuthSession,
    pub mode: UploadMode,
    pub limits: FileLimits,
    pub retry: RetryConfig,
    pub extra_headers: HashMap<String, String>,
}

impl SessionConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            auth: AuthSession::anonymous(),
            mode: UploadMode::default(),
            limits: FileLimits::default(),
            retry: RetryConfig::default(),
            extra_headers: HashMap::new(),
        }
    }

    pub fn with_auth(mut self, auth: AuthSession) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_mode(mut self, mode: UploadMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_limits(mut self, limits: FileLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }
}

struct SessionInner {
    task: UploadTask,
    mode: UploadMode,
    cancel: Option<CancellationToken>,
    preview: Option<PreviewHandle>,
}

/// 会话内部共享状态，进度回调也持有一份
struct Shared {
    inner: Mutex<SessionInner>,
    event_tx: broadcast::Sender<UploadEvent>,
}

impl Shared {
    fn emit(&self, event: UploadEvent) {
        // 没有订阅者时发送失败，忽略即可
        let _ = self.event_tx.send(event);
    }

    /// 对指定任务做状态迁移；任务已被替换或迁移非法时返回 false
    fn transition(&self, inner: &mut SessionInner, upload_id: UploadId, to: UploadState) -> bool {
        if inner.task.id != upload_id {
            return false;
        }

        match inner.task.transition(to) {
            Some(old_state) => {
                tracing::debug!(upload_id = %upload_id, from = ?old_state, to = ?to, "state changed");
                self.emit(UploadEvent::StateChanged {
                    upload_id,
                    old_state,
                    new_state: to,
                });
                true
            }
            None => false,
        }
    }

    /// 检查和迁移在同一把锁内完成；任务已被取消或重置时返回 `Cancelled`
    fn fail(&self, upload_id: UploadId, error: UploadError) -> UploadError {
        let mut inner = self.inner.lock();
        if !self.transition(&mut inner, upload_id, UploadState::Failed) {
            tracing::debug!(upload_id = %upload_id, error = %error, "discarding late upload error");
            return UploadError::Cancelled;
        }

        inner.task.error = Some(error.clone());
        inner.cancel = None;
        tracing::warn!(upload_id = %upload_id, error = %error, "upload failed");
        self.emit(UploadEvent::Failed {
            upload_id,
            error: error.to_string(),
        });
        error
    }

    fn progress(&self, upload_id: UploadId, percent: u8) {
        let mut inner = self.inner.lock();
        if inner.task.id == upload_id && inner.task.advance_progress(percent) {
            self.emit(UploadEvent::Progress {
                upload_id,
                percent: inner.task.progress,
            });
        }
    }
}

/// 上传会话控制器
///
/// 同一时刻最多一个活跃上传。通过 `Arc<UploadSession>` 共享，所有方法只需 `&self`。
///
/// 锁顺序：进度回调在上报器锁内获取会话锁，因此会话持锁期间不得调用上报器。
pub struct UploadSession {
    transport: Arc<dyn Transport>,
    endpoint: Url,
    limits: FileLimits,
    retry: RetryConfig,
    extra_headers: HashMap<String, String>,
    auth: RwLock<AuthSession>,
    previews: PreviewStore,
    shared: Arc<Shared>,
}

impl UploadSession {
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            transport,
            endpoint: config.endpoint,
            limits: config.limits,
            retry: config.retry,
            extra_headers: config.extra_headers,
            auth: RwLock::new(config.auth),
            previews: PreviewStore::new(),
            shared: Arc::new(Shared {
                inner: Mutex::new(SessionInner {
                    task: UploadTask::idle(config.mode),
                    mode: config.mode,
                    cancel: None,
                    preview: None,
                }),
                event_tx,
            }),
        }
    }

    /// 上传一个文件，直到成功、失败或被取消
    pub async fn begin(&self, file: SourceFile, operation: UploadOperation) -> Result<UploadResult> {
        let (upload_id, mode, cancel) = {
            let mut inner = self.shared.inner.lock();
            if inner.task.state.is_active() {
                return Err(UploadError::AlreadyInProgress);
            }

            let task = UploadTask::new(file.info(), operation, inner.mode);
            let cancel = CancellationToken::new();
            let upload_id = task.id;
            inner.task = task;
            inner.cancel = Some(cancel.clone());
            (upload_id, inner.mode, cancel)
        };

        tracing::info!(
            upload_id = %upload_id,
            file = file.name(),
            size = file.size(),
            operation = %operation,
            "upload started"
        );

        let payload = match UploadPayload::build(&file, operation) {
            Ok(payload) => payload,
            Err(err) => return Err(self.shared.fail(upload_id, err)),
        };

        if !self.enter(upload_id, UploadState::Validating) {
            return Err(UploadError::Cancelled);
        }

        let outcome = FileConstraints::new(operation, mode, &self.limits).validate(&file);
        if !outcome.is_valid() {
            return Err(self.shared.fail(upload_id, UploadError::ValidationFailed(outcome)));
        }

        let headers = match create_headers(&self.auth.read(), &payload.descriptor, &self.extra_headers) {
            Ok(headers) => headers,
            Err(err) => return Err(self.shared.fail(upload_id, err)),
        };

        if let UploadMode::Chunked { chunk_size } = mode {
            tracing::warn!(
                upload_id = %upload_id,
                chunk_size,
                "chunked transfer is not supported by the endpoint, sending a single request"
            );
        }

        if !self.enter(upload_id, UploadState::Uploading) {
            return Err(UploadError::Cancelled);
        }

        let shared = self.shared.clone();
        let callback: ProgressCallback = Arc::new(move |sent: u64, total: u64| {
            shared.progress(upload_id, percent_of(sent, total));
        });

        let request = TransportRequest {
            endpoint: self.endpoint.clone(),
            headers,
            payload,
        };
        let transport: &dyn Transport = self.transport.as_ref();
        let token = cancel.clone();

        let outcome = retry_with_config(&self.retry, &cancel, move |attempt| {
            if attempt > 0 {
                tracing::info!(upload_id = %upload_id, attempt, "retrying upload");
            }
            transport.send(request.clone(), callback.clone(), token.clone())
        })
        .await;

        self.settle(upload_id, outcome)
    }

    /// 进入 Validating / Uploading；已被取消或重置时返回 false
    fn enter(&self, upload_id: UploadId, to: UploadState) -> bool {
        let mut inner = self.shared.inner.lock();
        self.shared.transition(&mut inner, upload_id, to)
    }

    fn settle(&self, upload_id: UploadId, outcome: Result<UploadResult>) -> Result<UploadResult> {
        match outcome {
            Ok(result) => {
                let mut inner = self.shared.inner.lock();
                if inner.task.id != upload_id || inner.task.state != UploadState::Uploading {
                    // cancel() 已先行结束任务
                    tracing::debug!(upload_id = %upload_id, "discarding late upload result");
                    return Err(UploadError::Cancelled);
                }

                if inner.task.advance_progress(100) {
                    self.shared.emit(UploadEvent::Progress { upload_id, percent: 100 });
                }
                inner.task.result = Some(result.clone());
                inner.cancel = None;
                self.shared.transition(&mut inner, upload_id, UploadState::Completed);
                self.shared.emit(UploadEvent::Completed {
                    upload_id,
                    result: result.clone(),
                });

                tracing::info!(upload_id = %upload_id, url = %result.url, "upload completed");
                Ok(result)
            }
            Err(UploadError::Cancelled) => {
                let mut inner = self.shared.inner.lock();
                if self.shared.transition(&mut inner, upload_id, UploadState::Cancelled) {
                    inner.cancel = None;
                }
                Err(UploadError::Cancelled)
            }
            Err(err) => Err(self.shared.fail(upload_id, err)),
        }
    }

    /// 外部上报的进度（百分比）
    ///
    /// 仅在 Uploading 时生效，超过 100 截断，低于当前值忽略。
    pub fn progress(&self, percent: u8) {
        let upload_id = self.shared.inner.lock().task.id;
        self.shared.progress(upload_id, percent);
    }

    /// 取消当前上传；没有活跃上传时无操作
    pub fn cancel(&self) {
        let token = {
            let mut inner = self.shared.inner.lock();
            if !inner.task.state.is_active() {
                return;
            }

            let upload_id = inner.task.id;
            self.shared.transition(&mut inner, upload_id, UploadState::Cancelled);
            tracing::info!(upload_id = %upload_id, "upload cancelled");
            inner.cancel.take()
        };

        // 锁外触发，避免与进度回调的锁顺序冲突
        if let Some(token) = token {
            token.cancel();
        }
    }

    /// 回到空闲状态：取消活跃上传，清除错误和结果，回收预览
    pub fn reset(&self) {
        let (token, preview) = {
            let mut inner = self.shared.inner.lock();
            let old_id = inner.task.id;
            let old_state = inner.task.state;
            let mode = inner.mode;
            inner.task = UploadTask::idle(mode);

            if old_state != UploadState::Idle {
                self.shared.emit(UploadEvent::StateChanged {
                    upload_id: old_id,
                    old_state,
                    new_state: UploadState::Idle,
                });
            }
            (inner.cancel.take(), inner.preview.take())
        };

        if let Some(token) = token {
            token.cancel();
        }
        if let Some(preview) = preview {
            preview.revoke();
        }
    }

    /// 选择文件并生成预览；上一个预览被回收
    pub fn select(&self, file: &SourceFile) -> Option<PreviewHandle> {
        let preview = self.previews.create(file);
        let previous = {
            let mut inner = self.shared.inner.lock();
            std::mem::replace(&mut inner.preview, preview.clone())
        };

        if let Some(previous) = previous {
            previous.revoke();
        }
        preview
    }

    /// 切换上传模式，上传进行中时拒绝
    pub fn set_mode(&self, mode: UploadMode) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.task.state.is_active() {
            return Err(UploadError::AlreadyInProgress);
        }

        inner.mode = mode;
        if inner.task.state == UploadState::Idle {
            inner.task.mode = mode;
        }
        Ok(())
    }

    pub fn mode(&self) -> UploadMode {
        self.shared.inner.lock().mode
    }

    pub fn with_auth(self, auth: AuthSession) -> Self {
        *self.auth.write() = auth;
        self
    }

    /// 替换认证会话，对下一次上传生效
    pub fn set_auth(&self, auth: AuthSession) {
        *self.auth.write() = auth;
    }

    pub fn auth(&self) -> AuthSession {
        self.auth.read().clone()
    }

    pub fn snapshot(&self) -> UploadTask {
        self.shared.inner.lock().task.clone()
    }

    pub fn state(&self) -> UploadState {
        self.shared.inner.lock().task.state
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }

    /// 订阅事件
    ///
    /// 接收过慢会丢失事件（lagged），每个订阅者收到完整副本。
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.shared.event_tx.subscribe()
    }

    pub fn subscribe_filtered<F>(&self, filter: F) -> FilteredEventReceiver<F>
    where
        F: Fn(&UploadEvent) -> bool,
    {
        FilteredEventReceiver {
            receiver: self.shared.event_tx.subscribe(),
            filter,
        }
    }
}

/// 过滤的事件接收器
pub struct FilteredEventReceiver<F> {
    receiver: broadcast::Receiver<UploadEvent>,
    filter: F,
}

impl<F> FilteredEventReceiver<F>
where
    F: Fn(&UploadEvent) -> bool,
{
    pub async fn recv(&mut self) -> std::result::Result<UploadEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if (self.filter)(&event) {
                return Ok(event);
            }
        }
    }
}

const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn assert_types() {
        assert_send_sync::<UploadSession>();
    }
};
