//! 输入校验
//!
//! 所有校验器都实现同一个约定：原始输入 -> 字段路径到错误消息的映射。

mod path;
mod constraints;
mod form;

pub use path::{FieldPath, ParsePathError, Segment};
pub use constraints::{
    FileConstraints,
    FileLimits,
    IMAGE_ALLOWED_TYPES,
    IMAGE_MAX_BYTES,
    IMAGE_MIN_HEIGHT,
    IMAGE_MIN_WIDTH,
    VIDEO_CHUNKED_MAX_BYTES,
    VIDEO_NORMAL_MAX_BYTES,
    VIDEO_SUPPORTED_TYPES,
};
pub use form::{UploadForm, UploadFormValidator};

/// 校验器约定
pub trait Validator<T: ?Sized> {
    fn validate(&self, input: &T) -> ValidationOutcome;
}

/// 校验结果：字段路径 -> 错误消息
///
/// 每次校验都整体重新生成。同一路径多次出错时保留最后一条。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    errors: Vec<(FieldPath, String)>,
}

impl ValidationOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<FieldPath>, message: impl Into<String>) {
        let path = path.into();
        let message = message.into();

        match self.errors.iter_mut().find(|(p, _)| *p == path) {
            Some(entry) => entry.1 = message,
            None => self.errors.push((path, message)),
        }
    }

    /// 合并另一个结果，`other` 中的消息覆盖同路径的已有消息
    pub fn merge(&mut self, other: ValidationOutcome) {
        for (path, message) in other.errors {
            self.insert(path, message);
        }
    }

    pub fn get(&self, path: &FieldPath) -> Option<&str> {
        self.errors
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, m)| m.as_str())
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn first_message(&self) -> Option<&str> {
        self.errors.first().map(|(_, m)| m.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &str)> {
        self.errors.iter().map(|(p, m)| (p, m.as_str()))
    }
}

impl serde::Serialize for ValidationOutcome {
    /// 序列化为 `{"experiences.0.company": "Min 2 chars"}` 形式
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.errors.len()))?;
        for (path, message) in &self.errors {
            map.serialize_entry(&path.to_string(), message)?;
        }
        map.end()
    }
}
