mod speed;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use pin_project_lite::pin_project;
use tokio_util::sync::CancellationToken;
use crate::core::ProgressCallback;

pub use speed::SpeedCalculator;

/// 字节数换算为百分比（四舍五入）
pub fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }

    let percent = (sent.min(total) as f64 / total as f64 * 100.0).round();
    percent as u8
}

struct ReporterState {
    sent: u64,
    settled: bool,
    speed: SpeedCalculator,
    last_log: Instant,
}

/// 进度上报器
///
/// `sent` 只增不减；`settle` 之后或取消令牌触发后不再触发回调。
/// 回调在锁内执行，因此 `settle` 返回后不会有正在进行的回调。
pub struct ProgressReporter {
    total: u64,
    callback: ProgressCallback,
    state: Mutex<ReporterState>,
    cancel: Option<CancellationToken>,
    log_interval: Duration,
}

impl ProgressReporter {
    pub fn new(total: u64, callback: ProgressCallback) -> Self {
        Self {
            total,
            callback,
            state: Mutex::new(ReporterState {
                sent: 0,
                settled: false,
                speed: SpeedCalculator::new(20),
                last_log: Instant::now(),
            }),
            cancel: None,
            log_interval: Duration::from_secs(1),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_stopped(&self, state: &ReporterState) -> bool {
        state.settled || self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn sent(&self) -> u64 {
        self.state.lock().sent
    }

    /// 发送初始进度 (0, total)
    pub fn start(&self) {
        let state = self.state.lock();
        if !self.is_stopped(&state) {
            (self.callback)(state.sent, self.total);
        }
    }

    /// 累加字节并上报
    pub fn record(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }

        let mut state = self.state.lock();
        if self.is_stopped(&state) {
            return;
        }

        state.sent = (state.sent + bytes).min(self.total);
        state.speed.add_sample(bytes);

        let now = Instant::now();
        if now.duration_since(state.last_log) >= self.log_interval {
            state.last_log = now;
            tracing::debug!(
                sent = state.sent,
                total = self.total,
                speed = state.speed.instant_speed(),
                eta = ?state.speed.eta(self.total - state.sent),
                "upload progress"
            );
        }

        (self.callback)(state.sent, self.total);
    }

    /// 标记传输已结束，之后的 record/start 都被忽略
    pub fn settle(&self) {
        self.state.lock().settled = true;
    }

    pub fn is_settled(&self) -> bool {
        self.state.lock().settled
    }
}

pin_project! {
    /// 读取时上报进度的字节流
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        reporter: Arc<ProgressReporter>,
    }
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, reporter: Arc<ProgressReporter>) -> Self {
        Self { inner, reporter }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>>,
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.reporter.record(chunk.len() as u64);
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}
