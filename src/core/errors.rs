use thiserror::Error;
use crate::validation::ValidationOutcome;

/// 错误分类，对应上传流程的失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    ValidationFailed,
    AlreadyInProgress,
    Network,
    Server,
    Protocol,
    Cancelled,
    Io,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed: {}", .0.first_message().unwrap_or("invalid input"))]
    ValidationFailed(ValidationOutcome),

    #[error("An upload is already in progress")]
    AlreadyInProgress,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: status code {status_code}, message: {message}")]
    Server {
        status_code: u16,
        message: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Upload was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(String),
}

impl UploadError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn server_error(status_code: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status_code,
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::AlreadyInProgress => ErrorKind::AlreadyInProgress,
            Self::Network(_) => ErrorKind::Network,
            Self::Server { .. } => ErrorKind::Server,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// 用户可见的横幅消息
    ///
    /// 校验错误按字段内联展示，这里只取第一条。
    pub fn banner_message(&self) -> String {
        match self {
            Self::ValidationFailed(outcome) => outcome
                .first_message()
                .unwrap_or("Invalid input")
                .to_string(),
            Self::Server { message, .. } => message.clone(),
            Self::Network(message) | Self::Protocol(message) | Self::InvalidInput(message) => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Error alias
pub type Result<T, E = UploadError> = std::result::Result<T, E>;
