//! 上传会话：状态机、取消与本地预览

mod controller;
pub mod preview;

pub use controller::{FilteredEventReceiver, SessionConfig, UploadSession};
pub use preview::{PreviewHandle, PreviewStore};
