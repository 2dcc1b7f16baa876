use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use crate::core::{Result, UploadError, UploadResult};

#[derive(Debug, Deserialize)]
struct GraphQlError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

impl GraphQlResponse {
    fn first_error(&self) -> Option<String> {
        let errors = self.errors.as_ref()?;
        let first = errors.first()?;
        Some(
            first
                .message
                .clone()
                .unwrap_or_else(|| "GraphQL error occurred".to_string()),
        )
    }
}

/// 解析服务端响应
///
/// `result_field` 是 `data` 中对应操作的字段名；服务端没有返回
/// `originalName` 时使用 `file_name` 填充。
pub fn parse_response(
    status: StatusCode,
    body: &str,
    result_field: &str,
    file_name: &str,
) -> Result<UploadResult> {
    let parsed = serde_json::from_str::<GraphQlResponse>(body);

    if !status.is_success() {
        let message = parsed
            .ok()
            .and_then(|response| response.first_error())
            .or_else(|| {
                let text = body.trim();
                (!text.is_empty()).then(|| text.to_string())
            })
            .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));

        return Err(UploadError::server_error(status.as_u16(), message));
    }

    let response = parsed
        .map_err(|err| UploadError::protocol(format!("Invalid response body: {}", err)))?;

    if let Some(message) = response.first_error() {
        return Err(UploadError::protocol(message));
    }

    let value = response
        .data
        .as_ref()
        .and_then(|data| data.get(result_field))
        .filter(|value| !value.is_null())
        .cloned()
        .ok_or_else(|| UploadError::protocol(format!("Response is missing data.{}", result_field)))?;

    let mut result: UploadResult = serde_json::from_value(value)
        .map_err(|err| UploadError::protocol(format!("Invalid {} result: {}", result_field, err)))?;

    if result.original_name.is_empty() {
        result.original_name = file_name.to_string();
    }

    Ok(result)
}
