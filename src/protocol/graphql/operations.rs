use crate::core::UploadOperation;

pub const UPLOAD_IMAGE_MUTATION: &str = r#"
  mutation UploadFile($file: Upload!) {
    uploadImage(input: { file: $file }) {
      id
      filename
      originalName
      url
      thumbnailUrl
      size
      mimetype
      createdAt
    }
  }
"#;

pub const UPLOAD_MEDIA_MUTATION: &str = r#"
  mutation UploadMedia($file: Upload!, $folder: String) {
    uploadMedia(input: { file: $file, folder: $folder }) {
      id
      filename
      url
      mimetype
      size
      createdAt
    }
  }
"#;

pub const UPLOAD_GENERIC_FILE_MUTATION: &str = r#"
  mutation UploadGenericFile($file: Upload!) {
    uploadFile(input: { file: $file }) {
      id
      filename
      originalName
      url
      size
      mimetype
      createdAt
    }
  }
"#;

/// 操作描述：mutation 文本、操作名、结果字段名
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub query: &'static str,
    pub operation_name: &'static str,
    pub result_field: &'static str,
}

impl OperationDescriptor {
    pub fn for_operation(operation: UploadOperation) -> Self {
        match operation {
            UploadOperation::Image => Self {
                query: UPLOAD_IMAGE_MUTATION,
                operation_name: "UploadFile",
                result_field: "uploadImage",
            },
            UploadOperation::Video => Self {
                query: UPLOAD_MEDIA_MUTATION,
                operation_name: "UploadMedia",
                result_field: "uploadMedia",
            },
            UploadOperation::File => Self {
                query: UPLOAD_GENERIC_FILE_MUTATION,
                operation_name: "UploadGenericFile",
                result_field: "uploadFile",
            },
        }
    }
}
