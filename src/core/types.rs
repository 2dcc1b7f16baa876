use std::path::Path;
use std::str::FromStr;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use super::errors::{Result, UploadError};

/// 上传任务唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct UploadId(pub Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 上传状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum UploadState {
    /// 空闲（尚未开始或已重置）
    Idle,
    /// 校验中
    Validating,
    /// 上传中
    Uploading,
    /// 已完成
    Completed,
    /// 失败
    Failed,
    /// 已取消
    Cancelled,
}

impl UploadState {
    /// 是否有正在进行的传输
    pub fn is_active(&self) -> bool {
        matches!(self, UploadState::Validating | UploadState::Uploading)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Completed | UploadState::Failed | UploadState::Cancelled
        )
    }
}

/// 上传目标操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadOperation {
    Image,
    Video,
    File,
}

impl UploadOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadOperation::Image => "image",
            UploadOperation::Video => "video",
            UploadOperation::File => "file",
        }
    }
}

impl std::fmt::Display for UploadOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadOperation {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" | "image-upload" => Ok(UploadOperation::Image),
            "video" | "video-upload" => Ok(UploadOperation::Video),
            "file" | "generic-file-upload" => Ok(UploadOperation::File),
            other => Err(UploadError::invalid_input(format!("Unknown operation: {}", other))),
        }
    }
}

/// 上传模式
///
/// `Chunked` 目前只放宽视频大小限制，实际仍以单个请求发送。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum UploadMode {
    Normal,
    Chunked { chunk_size: usize },
}

impl Default for UploadMode {
    fn default() -> Self {
        UploadMode::Normal
    }
}

impl UploadMode {
    pub fn chunked() -> Self {
        UploadMode::Chunked {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// 分片模式默认分片大小 (1MB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// 文件描述信息（不含内容）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

/// 用户选择的源文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    name: String,
    mime_type: String,
    content: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content: content.into(),
        }
    }

    /// 从磁盘读取文件，按扩展名推断 MIME 类型
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UploadError::invalid_input(format!("Invalid file path: {}", path.display())))?
            .to_string();

        let content = tokio::fs::read(path).await?;
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self::new(name, mime_type, content))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }

    pub fn info(&self) -> FileInfo {
        FileInfo {
            name: self.name.clone(),
            size: self.size(),
            mime_type: self.mime_type.clone(),
        }
    }
}

/// 服务端确认的上传结果
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub original_name: String,
    pub url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub size: u64,
    pub mimetype: String,
    pub created_at: String,
}

/// 上传事件
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// 状态变更
    StateChanged {
        upload_id: UploadId,
        old_state: UploadState,
        new_state: UploadState,
    },
    /// 进度更新（百分比）
    Progress {
        upload_id: UploadId,
        percent: u8,
    },
    /// 任务完成
    Completed {
        upload_id: UploadId,
        result: UploadResult,
    },
    /// 任务失败
    Failed {
        upload_id: UploadId,
        error: String,
    },
}

// 静态断言确保类型是 Send 的
const _: () = {
    fn assert_send<T: Send + Sync>() {}
    fn assert_types() {
        assert_send::<SourceFile>();
        assert_send::<UploadEvent>();
        assert_send::<UploadResult>();
    }
};
