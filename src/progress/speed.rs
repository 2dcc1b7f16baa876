use std::time::{Duration, Instant};

/// 速度计算器 - 使用环形缓冲区
pub struct SpeedCalculator {
    /// 采样的时间跟字节
    samples: Vec<(Instant, u64)>,

    /// 最大采样
    max_samples: usize,

    /// 下一个要写入的位置
    current_index: usize,

    /// 累计传输的字节数，用于计算整体平均速度
    total_bytes: u64,

    /// 开始时间
    start_time: Instant,
}

impl SpeedCalculator {
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(2);
        Self {
            max_samples,
            samples: Vec::with_capacity(max_samples),
            current_index: 0,
            total_bytes: 0,
            start_time: Instant::now(),
        }
    }

    pub fn add_sample(&mut self, bytes: u64) {
        self.add_sample_at(Instant::now(), bytes);
    }

    fn add_sample_at(&mut self, now: Instant, bytes: u64) {
        self.total_bytes += bytes;

        if self.samples.len() < self.max_samples {
            self.samples.push((now, bytes));
        } else {
            // 缓冲区已满，覆盖最老的样本
            self.samples[self.current_index] = (now, bytes);
            self.current_index = (self.current_index + 1) % self.max_samples;
        }
    }

    /// 按时间顺序返回样本
    fn ordered(&self) -> impl Iterator<Item = &(Instant, u64)> {
        let (newer, older) = if self.samples.len() == self.max_samples {
            self.samples.split_at(self.current_index)
        } else {
            self.samples.split_at(0)
        };
        older.iter().chain(newer.iter())
    }

    /// 瞬时速度 (bytes/sec)，基于窗口内的样本
    pub fn instant_speed(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }

        let mut iter = self.ordered();
        let Some(&(first_at, _)) = iter.next() else {
            return 0.0;
        };

        // 第一个样本只作为时间起点
        let mut bytes = 0u64;
        let mut last_at = first_at;
        for &(at, b) in iter {
            bytes += b;
            last_at = at;
        }

        let duration = last_at.duration_since(first_at).as_secs_f64();
        if duration > 0.0 {
            bytes as f64 / duration
        } else {
            0.0
        }
    }

    /// 平均速度 (bytes/sec)
    pub fn average_speed(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_bytes as f64 / elapsed
        } else {
            0.0
        }
    }

    /// 预计剩余时间
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = match self.instant_speed() {
            s if s > 0.0 => s,
            _ => self.average_speed(),
        };

        if speed > 0.0 {
            Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
        } else {
            None
        }
    }
}
