use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use crate::core::{Result, UploadError};

/// 重试策略
#[derive(Debug, Clone)]
pub enum RetryStrategy {
    /// 固定延迟
    Fixed(Duration),
    /// 指数退避
    Exponential {
        initial: Duration,
        multiplier: f64,
        max_delay: Duration,
    },
    /// 线性退避
    Linear {
        initial: Duration,
        increment: Duration,
        max_delay: Duration,
    },
}

impl RetryStrategy {
    /// 计算第 n 次重试的延迟
    pub fn get_delay(&self, attempt: u32) -> Duration {
        match self {
            RetryStrategy::Fixed(delay) => *delay,
            RetryStrategy::Exponential { initial, multiplier, max_delay } => {
                let delay = initial.as_secs_f64() * multiplier.powf(attempt as f64);
                let delay = Duration::from_secs_f64(delay.min(max_delay.as_secs_f64()));
                std::cmp::min(delay, *max_delay)
            }
            RetryStrategy::Linear { initial, increment, max_delay } => {
                let delay = *initial + (*increment * attempt);
                std::cmp::min(delay, *max_delay)
            }
        }
    }
}

/// 重试配置
///
/// 默认只尝试一次，即不自动重试。
#[derive(Clone)]
pub struct RetryConfig {
    /// 最大尝试次数（含第一次）
    pub max_attempts: u32,
    /// 重试策略
    pub strategy: RetryStrategy,
    /// 是否重试的判断函数
    pub should_retry: Arc<dyn Fn(&UploadError) -> bool + Send + Sync>,
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            strategy: RetryStrategy::Exponential {
                initial: Duration::from_secs(1),
                multiplier: 2.0,
                max_delay: Duration::from_secs(60),
            },
            should_retry: Arc::new(|error| matches!(error, UploadError::Network(_))),
        }
    }
}

/// 执行带重试的操作
///
/// `cancel` 触发后立即以 `Cancelled` 结束，包括等待重试的间隔。
pub async fn retry_with_config<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let error = match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(error) => error,
        };

        attempt += 1;
        if matches!(error, UploadError::Cancelled)
            || attempt >= max_attempts
            || !(config.should_retry)(&error)
        {
            return Err(error);
        }

        let delay = config.strategy.get_delay(attempt - 1);
        tracing::warn!(attempt, delay = ?delay, error = %error, "retrying upload");

        tokio::select! {
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            _ = sleep(delay) => {}
        }
    }
}

/// 重试构建器
pub struct RetryBuilder {
    config: RetryConfig,
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryBuilder {
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn strategy(mut self, strategy: RetryStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn should_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(&UploadError) -> bool + Send + Sync + 'static,
    {
        self.config.should_retry = Arc::new(f);
        self
    }

    pub fn build(self) -> RetryConfig {
        self.config
    }
}
