pub mod auth;
pub mod config;
pub mod core;
pub mod progress;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod utils;
pub mod validation;

// 重新导出核心类型
pub use auth::AuthSession;
pub use core::{
    ErrorKind,
    Result,
    SourceFile,
    Transport,
    TransportRequest,
    UploadError,
    UploadEvent,
    UploadId,
    UploadMode,
    UploadOperation,
    UploadResult,
    UploadState,
    UploadTask,
};
pub use protocol::graphql::UploadPayload;
pub use session::{PreviewHandle, SessionConfig, UploadSession};
pub use transport::{HttpTransport, HttpTransportConfig};
pub use validation::{FieldPath, ValidationOutcome, Validator};

#[cfg(test)]
mod tests;
