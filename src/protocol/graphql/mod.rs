//! GraphQL multipart 上传请求约定
//!
//! 请求由 `operations`、`map` 和编号文件部分组成，响应是带 `data` 或
//! `errors` 的 JSON。

mod operations;
mod payload;
mod response;

pub use operations::{
    OperationDescriptor,
    UPLOAD_GENERIC_FILE_MUTATION,
    UPLOAD_IMAGE_MUTATION,
    UPLOAD_MEDIA_MUTATION,
};
pub use payload::{UploadPayload, FALLBACK_MIME_TYPE, FILE_PART_NAME};
pub use response::parse_response;
