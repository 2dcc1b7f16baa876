use std::sync::Arc;
use bytes::Bytes;
use reqwest::Body;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use crate::core::{Result, SourceFile, UploadError, UploadOperation};
use crate::progress::{ProgressReporter, ProgressStream};
use super::operations::OperationDescriptor;

/// 文件部分的编号，同时是 `map` 中的键
pub const FILE_PART_NAME: &str = "0";

/// 流式发送时每次读取的大小 (64KB)
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// 类型为空或无法解析时文件部分使用的类型
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

fn part_mime_type(mime_type: &str) -> String {
    let mime_type = mime_type.trim();
    match mime_type.parse::<mime_guess::Mime>() {
        Ok(_) => mime_type.to_string(),
        Err(_) => FALLBACK_MIME_TYPE.to_string(),
    }
}

/// 可直接发送的 multipart 请求体
///
/// 三个部分：`operations`（操作和变量占位）、`map`（文件部分到变量路径）、
/// 以及编号为 `0` 的文件内容。
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub operation: UploadOperation,
    pub descriptor: OperationDescriptor,
    pub operations: Value,
    pub map: Value,
    pub file_name: String,
    pub mime_type: String,
    pub content: Bytes,
}

impl UploadPayload {
    pub fn build(file: &SourceFile, operation: UploadOperation) -> Result<Self> {
        if file.is_empty() {
            return Err(UploadError::invalid_input(format!(
                "File '{}' is empty",
                file.name()
            )));
        }

        let descriptor = OperationDescriptor::for_operation(operation);

        let operations = json!({
            "query": descriptor.query,
            "variables": { "file": null },
        });
        let map = json!({ FILE_PART_NAME: ["variables.file"] });

        Ok(Self {
            operation,
            descriptor,
            operations,
            map,
            file_name: file.name().to_string(),
            mime_type: part_mime_type(file.mime_type()),
            content: file.content().clone(),
        })
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    /// 文件内容按固定大小切片（零拷贝）
    pub fn chunks(&self) -> Vec<Bytes> {
        let mut chunks = Vec::with_capacity(self.content.len() / STREAM_CHUNK_SIZE + 1);
        let mut offset = 0;
        while offset < self.content.len() {
            let end = (offset + STREAM_CHUNK_SIZE).min(self.content.len());
            chunks.push(self.content.slice(offset..end));
            offset = end;
        }
        chunks
    }

    /// 构建 multipart 表单，文件部分经过进度上报流
    pub fn into_form(self, reporter: Arc<ProgressReporter>) -> Result<Form> {
        let size = self.size();
        let chunks = self.chunks().into_iter().map(Ok::<_, std::io::Error>);
        let stream = ProgressStream::new(futures_util::stream::iter(chunks), reporter);

        let file_part = Part::stream_with_length(Body::wrap_stream(stream), size)
            .file_name(self.file_name)
            .mime_str(&self.mime_type)
            .map_err(|err| UploadError::invalid_input(format!("Invalid MIME type: {}", err)))?;

        Ok(Form::new()
            .text("operations", self.operations.to_string())
            .text("map", self.map.to_string())
            .part(FILE_PART_NAME, file_part))
    }
}
