mod types;
mod traits;
mod task;
mod errors;


pub use task::UploadTask;
pub use types::{
    FileInfo,
    SourceFile,
    UploadEvent,
    UploadId,
    UploadMode,
    UploadOperation,
    UploadResult,
    UploadState,
    DEFAULT_CHUNK_SIZE,
};
pub use traits::{ProgressCallback, Transport, TransportRequest};
pub use errors::{ErrorKind, Result, UploadError};
