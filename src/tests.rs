//! 测试辅助：生成图片、模拟传输，以及会话的端到端场景

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use crate::core::{
    ProgressCallback, Result, SourceFile, Transport, TransportRequest, UploadError, UploadResult,
};

/// 生成指定尺寸的纯色图片
pub(crate) fn encode_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub(crate) fn png_file(name: &str, width: u32, height: u32) -> SourceFile {
    SourceFile::new(name, "image/png", encode_image(width, height, ImageFormat::Png))
}

/// JPEG 末尾补零到 `padded_len` 字节，头部尺寸不变
pub(crate) fn jpeg_file(name: &str, width: u32, height: u32, padded_len: usize) -> SourceFile {
    let mut bytes = encode_image(width, height, ImageFormat::Jpeg);
    if bytes.len() < padded_len {
        bytes.resize(padded_len, 0);
    }
    SourceFile::new(name, "image/jpeg", bytes)
}

pub(crate) fn result_for(request: &TransportRequest) -> UploadResult {
    let payload = &request.payload;
    UploadResult {
        id: "upl_1".to_string(),
        filename: format!("stored-{}", payload.file_name),
        original_name: payload.file_name.clone(),
        url: format!("https://cdn.example.com/{}", payload.file_name),
        thumbnail_url: None,
        size: payload.size(),
        mimetype: payload.mime_type.clone(),
        created_at: "2024-01-01T00:00:00.000Z".to_string(),
    }
}

/// 进度上报完之后的行为
pub(crate) enum Finish {
    Succeed,
    Fail(UploadError),
    /// 一直等到取消
    WaitForCancel,
    /// 忽略取消，延迟后成功
    Delay(Duration),
    /// 忽略取消，延迟后失败
    DelayThenFail(Duration, UploadError),
}

/// 模拟传输，按脚本上报百分比进度
pub(crate) struct MockTransport {
    steps: Vec<u8>,
    finish: Finish,
    failures: Mutex<VecDeque<UploadError>>,
    calls: AtomicUsize,
    last_request: Mutex<Option<TransportRequest>>,
}

impl MockTransport {
    pub(crate) fn new(steps: Vec<u8>, finish: Finish) -> Self {
        Self {
            steps,
            finish,
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub(crate) fn succeeding(steps: Vec<u8>) -> Self {
        Self::new(steps, Finish::Succeed)
    }

    /// 前几次调用直接失败
    pub(crate) fn with_failures(self, failures: Vec<UploadError>) -> Self {
        *self.failures.lock() = failures.into();
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<TransportRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: TransportRequest,
        progress: ProgressCallback,
        cancel: CancellationToken,
    ) -> Result<UploadResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());

        let failure = self.failures.lock().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }

        let total = request.payload.size();
        progress(0, total);

        for percent in &self.steps {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }
            progress(total * u64::from(*percent) / 100, total);
            tokio::task::yield_now().await;
        }

        match &self.finish {
            Finish::Succeed => Ok(result_for(&request)),
            Finish::Fail(err) => Err(err.clone()),
            Finish::WaitForCancel => {
                cancel.cancelled().await;
                Err(UploadError::Cancelled)
            }
            Finish::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(result_for(&request))
            }
            Finish::DelayThenFail(delay, err) => {
                tokio::time::sleep(*delay).await;
                Err(err.clone())
            }
        }
    }
}

#[cfg(test)]
mod session_tests {
    use super::*;
    use tokio::sync::broadcast;
    use tokio::time::timeout;
    use url::Url;
    use crate::auth::AuthSession;
    use crate::core::{ErrorKind, UploadEvent, UploadMode, UploadOperation, UploadState};
    use crate::session::{SessionConfig, UploadSession};
    use crate::utils::retry::{RetryBuilder, RetryStrategy};
    use crate::validation::{FieldPath, FileLimits};

    fn config() -> SessionConfig {
        SessionConfig::new(Url::parse("http://localhost:4000/graphql").unwrap())
    }

    fn session_with(transport: Arc<MockTransport>, config: SessionConfig) -> Arc<UploadSession> {
        Arc::new(UploadSession::new(config, transport))
    }

    fn drain_progress(rx: &mut broadcast::Receiver<UploadEvent>) -> Vec<u8> {
        let mut percents = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let UploadEvent::Progress { percent, .. } = event {
                percents.push(percent);
            }
        }
        percents
    }

    async fn wait_for_progress(rx: &mut broadcast::Receiver<UploadEvent>) -> u8 {
        timeout(Duration::from_secs(5), async {
            loop {
                if let UploadEvent::Progress { percent, .. } = rx.recv().await.unwrap() {
                    return percent;
                }
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_padded_jpeg_completes() {
        let transport = Arc::new(MockTransport::succeeding(vec![25, 50, 100]));
        let session = session_with(transport.clone(), config());
        let mut rx = session.subscribe();

        let file = jpeg_file("photo.jpg", 500, 500, 2 * 1024 * 1024);
        let result = session.begin(file, UploadOperation::Image).await.unwrap();

        assert_eq!(result.mimetype, "image/jpeg");
        assert_eq!(result.size, 2 * 1024 * 1024);
        assert_eq!(drain_progress(&mut rx), vec![25, 50, 100]);

        let task = session.snapshot();
        assert_eq!(task.state, UploadState::Completed);
        assert_eq!(task.progress, 100);
        assert_eq!(task.result, Some(result));
        assert!(task.completed_at.is_some());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_file_never_reaches_network() {
        let transport = Arc::new(MockTransport::succeeding(vec![100]));
        let session = session_with(transport.clone(), config());

        let file = SourceFile::new("empty.png", "image/png", Vec::<u8>::new());
        let err = session.begin(file, UploadOperation::Image).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let task = session.snapshot();
        assert_eq!(task.state, UploadState::Failed);
        assert_eq!(task.error.map(|e| e.kind()), Some(ErrorKind::InvalidInput));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_small_image_fails_validation() {
        let transport = Arc::new(MockTransport::succeeding(vec![100]));
        let session = session_with(transport.clone(), config());

        let err = session
            .begin(png_file("tiny.png", 200, 200), UploadOperation::Image)
            .await
            .unwrap_err();

        match err {
            UploadError::ValidationFailed(outcome) => {
                assert_eq!(
                    outcome.get(&FieldPath::field("file")),
                    Some("Image must be ≥ 300x300px")
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(session.state(), UploadState::Failed);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_then_reset() {
        let transport = Arc::new(MockTransport::new(vec![10], Finish::WaitForCancel));
        let session = session_with(transport.clone(), config());
        let mut rx = session.subscribe();

        let handle = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .begin(png_file("a.png", 320, 320), UploadOperation::Image)
                    .await
            }
        });

        assert_eq!(wait_for_progress(&mut rx).await, 10);
        session.cancel();

        let outcome = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert_eq!(outcome.unwrap_err(), UploadError::Cancelled);
        assert_eq!(session.state(), UploadState::Cancelled);

        // 已取消后再取消无副作用
        session.cancel();
        assert_eq!(session.state(), UploadState::Cancelled);

        let cancelled_id = session.snapshot().id;
        session.reset();
        let task = session.snapshot();
        assert_eq!(task.state, UploadState::Idle);
        assert_eq!(task.progress, 0);
        assert!(task.error.is_none());
        assert!(task.result.is_none());
        assert_ne!(task.id, cancelled_id);
    }

    #[tokio::test]
    async fn test_begin_while_uploading_is_rejected() {
        let transport = Arc::new(MockTransport::new(vec![30], Finish::WaitForCancel));
        let session = session_with(transport.clone(), config());
        let mut rx = session.subscribe();

        let handle = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .begin(png_file("a.png", 320, 320), UploadOperation::Image)
                    .await
            }
        });
        wait_for_progress(&mut rx).await;

        let before = session.snapshot();
        let err = session
            .begin(png_file("b.png", 320, 320), UploadOperation::Image)
            .await
            .unwrap_err();
        assert_eq!(err, UploadError::AlreadyInProgress);

        let after = session.snapshot();
        assert_eq!(after.id, before.id);
        assert_eq!(after.state, UploadState::Uploading);
        assert_eq!(after.progress, 30);
        assert_eq!(
            session.set_mode(UploadMode::chunked()).unwrap_err(),
            UploadError::AlreadyInProgress
        );

        session.cancel();
        let _ = handle.await;
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_clamped() {
        let transport = Arc::new(MockTransport::new(vec![40, 20], Finish::WaitForCancel));
        let session = session_with(transport.clone(), config());
        let mut rx = session.subscribe();

        // 空闲时忽略
        session.progress(50);
        assert_eq!(session.snapshot().progress, 0);

        let handle = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .begin(png_file("a.png", 320, 320), UploadOperation::Image)
                    .await
            }
        });
        assert_eq!(wait_for_progress(&mut rx).await, 40);

        session.progress(10);
        assert_eq!(session.snapshot().progress, 40);
        session.progress(250);
        assert_eq!(session.snapshot().progress, 100);

        session.cancel();
        let _ = handle.await;

        let mut seen = vec![40];
        seen.extend(drain_progress(&mut rx));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&100));
    }

    #[tokio::test]
    async fn test_late_result_after_cancel_is_discarded() {
        let transport = Arc::new(MockTransport::new(vec![50], Finish::Delay(Duration::from_millis(50))));
        let session = session_with(transport.clone(), config());
        let mut rx = session.subscribe();

        let handle = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .begin(png_file("a.png", 320, 320), UploadOperation::Image)
                    .await
            }
        });
        wait_for_progress(&mut rx).await;
        session.cancel();

        let outcome = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert_eq!(outcome.unwrap_err(), UploadError::Cancelled);

        let task = session.snapshot();
        assert_eq!(task.state, UploadState::Cancelled);
        assert!(task.result.is_none());
    }

    #[tokio::test]
    async fn test_late_error_after_cancel_reports_cancelled() {
        let transport = Arc::new(MockTransport::new(
            vec![50],
            Finish::DelayThenFail(Duration::from_millis(50), UploadError::network("connection reset")),
        ));
        let session = session_with(transport.clone(), config());
        let mut rx = session.subscribe();

        let handle = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .begin(png_file("a.png", 320, 320), UploadOperation::Image)
                    .await
            }
        });
        wait_for_progress(&mut rx).await;
        session.cancel();

        let outcome = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert_eq!(outcome.unwrap_err(), UploadError::Cancelled);

        let task = session.snapshot();
        assert_eq!(task.state, UploadState::Cancelled);
        assert!(task.error.is_none());
        while let Ok(event) = rx.try_recv() {
            assert!(!matches!(event, UploadEvent::Failed { .. }));
        }
    }

    #[tokio::test]
    async fn test_reset_event_carries_previous_task_id() {
        let transport = Arc::new(MockTransport::succeeding(vec![100]));
        let session = session_with(transport, config());
        let mut rx = session.subscribe();

        // 空闲时重置不发事件
        session.reset();
        assert!(rx.try_recv().is_err());

        session.begin(png_file("a.png", 320, 320), UploadOperation::Image).await.unwrap();
        let completed_id = session.snapshot().id;
        while rx.try_recv().is_ok() {}

        session.reset();
        match rx.try_recv().unwrap() {
            UploadEvent::StateChanged { upload_id, old_state, new_state } => {
                assert_eq!(upload_id, completed_id);
                assert_eq!(old_state, UploadState::Completed);
                assert_eq!(new_state, UploadState::Idle);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
        assert_ne!(session.snapshot().id, completed_id);
    }

    #[tokio::test]
    async fn test_server_error_fails_task() {
        let transport = Arc::new(MockTransport::new(
            vec![100],
            Finish::Fail(UploadError::server_error(413, "Payload too large")),
        ));
        let session = session_with(transport.clone(), config());
        let mut rx = session.subscribe();

        let err = session
            .begin(png_file("a.png", 320, 320), UploadOperation::Image)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);

        let task = session.snapshot();
        assert_eq!(task.state, UploadState::Failed);
        assert_eq!(task.error, Some(err));

        let mut failed = false;
        while let Ok(event) = rx.try_recv() {
            if let UploadEvent::Failed { error, .. } = event {
                assert!(error.contains("Payload too large"));
                failed = true;
            }
        }
        assert!(failed);

        // 失败后可以重新开始
        session.begin(png_file("b.png", 320, 320), UploadOperation::Image).await.unwrap_err();
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_network_errors_are_retried_when_enabled() {
        let transport = Arc::new(
            MockTransport::succeeding(vec![100])
                .with_failures(vec![UploadError::network("refused"), UploadError::network("reset")]),
        );
        let retry = RetryBuilder::new()
            .max_attempts(3)
            .strategy(RetryStrategy::Fixed(Duration::from_millis(1)))
            .build();
        let session = session_with(transport.clone(), config().with_retry(retry));

        session
            .begin(png_file("a.png", 320, 320), UploadOperation::Image)
            .await
            .unwrap();
        assert_eq!(transport.calls(), 3);
        assert_eq!(session.state(), UploadState::Completed);
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let transport = Arc::new(
            MockTransport::succeeding(vec![100]).with_failures(vec![UploadError::network("refused")]),
        );
        let session = session_with(transport.clone(), config());

        let err = session
            .begin(png_file("a.png", 320, 320), UploadOperation::Image)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_chunked_mode_raises_video_limit() {
        let limits = FileLimits {
            video_normal_max_bytes: 1024,
            video_chunked_max_bytes: 1024 * 1024,
            ..FileLimits::default()
        };
        let transport = Arc::new(MockTransport::succeeding(vec![100]));
        let session = session_with(transport.clone(), config().with_limits(limits));
        let video = SourceFile::new("clip.mp4", "video/mp4", vec![7u8; 4096]);

        let err = session.begin(video.clone(), UploadOperation::Video).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);

        session.set_mode(UploadMode::chunked()).unwrap();
        let result = session.begin(video, UploadOperation::Video).await.unwrap();
        assert_eq!(result.mimetype, "video/mp4");

        let request = transport.last_request().unwrap();
        assert_eq!(request.payload.operation, UploadOperation::Video);
        assert_eq!(session.snapshot().mode, UploadMode::chunked());
    }

    #[tokio::test]
    async fn test_auth_header_follows_session() {
        let transport = Arc::new(MockTransport::succeeding(vec![100]));
        let session = session_with(
            transport.clone(),
            config().with_auth(AuthSession::anonymous().login("secret")),
        );

        session.begin(png_file("a.png", 320, 320), UploadOperation::Image).await.unwrap();
        let headers = transport.last_request().unwrap().headers;
        assert_eq!(headers.get("authorization").unwrap(), "Bearer secret");

        session.set_auth(session.auth().logout());
        session.begin(png_file("a.png", 320, 320), UploadOperation::Image).await.unwrap();
        let headers = transport.last_request().unwrap().headers;
        assert!(headers.get("authorization").is_none());
        assert_eq!(headers.get("apollo-require-preflight").unwrap(), "true");
    }

    #[tokio::test]
    async fn test_previews_are_revoked() {
        let transport = Arc::new(MockTransport::succeeding(vec![100]));
        let session = session_with(transport, config());
        let store = session.previews().clone();

        let first = session.select(&png_file("a.png", 320, 320)).unwrap();
        assert!(first.data_url().unwrap().starts_with("data:image/png;base64,"));
        assert_eq!(store.live_count(), 1);

        let second = session.select(&png_file("b.png", 320, 320)).unwrap();
        assert!(!first.is_live());
        assert!(second.is_live());
        assert_eq!(store.live_count(), 1);

        let doc = SourceFile::new("notes.pdf", "application/pdf", vec![1u8]);
        assert!(session.select(&doc).is_none());
        assert_eq!(store.live_count(), 0);

        session.select(&png_file("c.png", 320, 320)).unwrap();
        session.reset();
        assert_eq!(store.live_count(), 0);
    }
}
