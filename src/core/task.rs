use chrono::{DateTime, Utc};
use super::errors::UploadError;
use super::types::{FileInfo, UploadId, UploadMode, UploadOperation, UploadResult, UploadState};

/// 上传任务
#[derive(Debug, Clone)]
pub struct UploadTask {
    /// 任务 ID
    pub id: UploadId,
    /// 源文件信息
    pub file: Option<FileInfo>,
    /// 目标操作
    pub operation: Option<UploadOperation>,
    /// 上传模式
    pub mode: UploadMode,
    /// 当前状态
    pub state: UploadState,
    /// 完成百分比 (0-100)
    pub progress: u8,
    /// 最近一次错误
    pub error: Option<UploadError>,
    /// 上传结果，仅在 Completed 时存在
    pub result: Option<UploadResult>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 开始上传时间
    pub started_at: Option<DateTime<Utc>>,
    /// 结束时间
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadTask {
    pub fn idle(mode: UploadMode) -> Self {
        Self {
            id: UploadId::new(),
            file: None,
            operation: None,
            mode,
            state: UploadState::Idle,
            progress: 0,
            error: None,
            result: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn new(file: FileInfo, operation: UploadOperation, mode: UploadMode) -> Self {
        Self {
            file: Some(file),
            operation: Some(operation),
            ..Self::idle(mode)
        }
    }

    /// 状态迁移是否合法
    ///
    /// 回到 Idle 只能通过 reset，不在此表中。
    pub fn is_valid_transition(from: UploadState, to: UploadState) -> bool {
        use UploadState::*;

        matches!(
            (from, to),
            (Idle, Validating)
                | (Idle, Failed)
                | (Validating, Uploading)
                | (Validating, Failed)
                | (Validating, Cancelled)
                | (Uploading, Completed)
                | (Uploading, Failed)
                | (Uploading, Cancelled)
        )
    }

    /// 迁移到新状态，返回旧状态；非法迁移返回 None 且不修改任务
    pub fn transition(&mut self, to: UploadState) -> Option<UploadState> {
        let from = self.state;
        if !Self::is_valid_transition(from, to) {
            return None;
        }

        self.state = to;
        match to {
            UploadState::Uploading => {
                self.started_at = Some(Utc::now());
            }
            UploadState::Completed | UploadState::Failed | UploadState::Cancelled => {
                self.completed_at = Some(Utc::now());
            }
            _ => {}
        }

        Some(from)
    }

    /// 更新进度，只增不减；返回是否有变化
    pub fn advance_progress(&mut self, percent: u8) -> bool {
        let percent = percent.min(100);
        if self.state != UploadState::Uploading || percent <= self.progress {
            return false;
        }

        self.progress = percent;
        true
    }
}
