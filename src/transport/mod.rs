//! 传输适配器：把构建好的请求发送到服务端，报告进度并支持取消

mod headers;
mod http;

pub use headers::{create_headers, OPERATION_NAME_HEADER, PREFLIGHT_HEADER};
pub use http::{HttpTransport, HttpTransportConfig, DEFAULT_UPLOAD_TIMEOUT};
