use std::collections::HashMap;
use std::str::FromStr;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use crate::auth::AuthSession;
use crate::core::{Result, UploadError};
use crate::protocol::graphql::OperationDescriptor;

/// 服务端 CSRF 预检约定要求的头
pub const PREFLIGHT_HEADER: &str = "apollo-require-preflight";
pub const OPERATION_NAME_HEADER: &str = "x-apollo-operation-name";

/// 构建上传请求头：认证、预检绕过、操作名，以及调用方附加的头
pub fn create_headers(
    auth: &AuthSession,
    descriptor: &OperationDescriptor,
    extra: &HashMap<String, String>,
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(PREFLIGHT_HEADER, HeaderValue::from_static("true"));
    headers.insert(
        OPERATION_NAME_HEADER,
        HeaderValue::from_static(descriptor.operation_name),
    );

    if let Some(token) = auth.token() {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|err| UploadError::invalid_input(format!("Invalid token: {}", err)))?;
        headers.insert(AUTHORIZATION, value);
    }

    for (k, v) in extra {
        let name = HeaderName::from_str(k)
            .map_err(|err| UploadError::invalid_input(format!("Invalid header name '{}': {}", k, err)))?;
        let value = HeaderValue::from_str(v)
            .map_err(|err| UploadError::invalid_input(format!("Invalid header value for '{}': {}", k, err)))?;
        headers.insert(name, value);
    }

    Ok(headers)
}
