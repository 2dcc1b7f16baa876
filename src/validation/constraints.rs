use std::io::Cursor;
use image::ImageReader;
use crate::core::{SourceFile, UploadMode, UploadOperation};
use super::{FieldPath, ValidationOutcome, Validator};

pub const IMAGE_ALLOWED_TYPES: &[&str] = &["image/jpeg", "image/png"];
pub const IMAGE_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const IMAGE_MIN_WIDTH: u32 = 300;
pub const IMAGE_MIN_HEIGHT: u32 = 300;

pub const VIDEO_SUPPORTED_TYPES: &[&str] = &[
    "video/mp4",
    "video/webm",
    "video/ogg",
    "video/quicktime",
    "video/x-msvideo",
];
pub const VIDEO_NORMAL_MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const VIDEO_CHUNKED_MAX_BYTES: u64 = 5 * 1000 * 1024 * 1024;

const INVALID_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// 各操作的文件限制
#[derive(Debug, Clone)]
pub struct FileLimits {
    pub image_types: Vec<String>,
    pub image_max_bytes: u64,
    pub image_min_width: u32,
    pub image_min_height: u32,
    pub video_types: Vec<String>,
    pub video_normal_max_bytes: u64,
    pub video_chunked_max_bytes: u64,
    /// 通用文件大小上限，None 表示不限制
    pub file_max_bytes: Option<u64>,
}

impl Default for FileLimits {
    fn default() -> Self {
        Self {
            image_types: IMAGE_ALLOWED_TYPES.iter().map(|t| t.to_string()).collect(),
            image_max_bytes: IMAGE_MAX_BYTES,
            image_min_width: IMAGE_MIN_WIDTH,
            image_min_height: IMAGE_MIN_HEIGHT,
            video_types: VIDEO_SUPPORTED_TYPES.iter().map(|t| t.to_string()).collect(),
            video_normal_max_bytes: VIDEO_NORMAL_MAX_BYTES,
            video_chunked_max_bytes: VIDEO_CHUNKED_MAX_BYTES,
            file_max_bytes: None,
        }
    }
}

impl FileLimits {
    pub fn video_max_bytes(&self, mode: UploadMode) -> u64 {
        match mode {
            UploadMode::Normal => self.video_normal_max_bytes,
            UploadMode::Chunked { .. } => self.video_chunked_max_bytes,
        }
    }
}

/// 按操作和模式校验文件
#[derive(Debug, Clone)]
pub struct FileConstraints<'a> {
    pub operation: UploadOperation,
    pub mode: UploadMode,
    pub limits: &'a FileLimits,
    pub path: FieldPath,
}

impl<'a> FileConstraints<'a> {
    pub fn new(operation: UploadOperation, mode: UploadMode, limits: &'a FileLimits) -> Self {
        Self {
            operation,
            mode,
            limits,
            path: FieldPath::field("file"),
        }
    }

    fn validate_image(&self, file: &SourceFile, outcome: &mut ValidationOutcome) {
        let limits = self.limits;

        let allowed = limits.image_types.iter().any(|t| t == file.mime_type());
        if !allowed {
            outcome.insert(self.path.clone(), "Only JPG/PNG allowed");
        }

        if file.size() > limits.image_max_bytes {
            outcome.insert(
                self.path.clone(),
                format!("Max size {}MB", limits.image_max_bytes / (1024 * 1024)),
            );
        }

        // 只对允许的类型读取尺寸
        if allowed {
            match image_dimensions(file) {
                Some((width, height)) => {
                    if width < limits.image_min_width || height < limits.image_min_height {
                        outcome.insert(
                            self.path.clone(),
                            format!(
                                "Image must be ≥ {}x{}px",
                                limits.image_min_width, limits.image_min_height
                            ),
                        );
                    }
                }
                None => outcome.insert(self.path.clone(), "Failed to read image"),
            }
        }
    }

    fn validate_video(&self, file: &SourceFile, outcome: &mut ValidationOutcome) {
        let limits = self.limits;

        if !limits.video_types.iter().any(|t| t == file.mime_type()) {
            let supported = limits
                .video_types
                .iter()
                .map(|t| t.split('/').nth(1).unwrap_or(t.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            outcome.insert(
                self.path.clone(),
                format!("Unsupported file type. Supported: {}", supported),
            );
            return;
        }

        let max_bytes = limits.video_max_bytes(self.mode);
        if file.size() > max_bytes {
            outcome.insert(
                self.path.clone(),
                format!("File too large. Maximum size: {}MB", max_bytes / (1024 * 1024)),
            );
        }
    }

    fn validate_file(&self, file: &SourceFile, outcome: &mut ValidationOutcome) {
        if file.name().contains(INVALID_NAME_CHARS) {
            outcome.insert(self.path.clone(), "File name cannot contain special characters");
        }

        if let Some(max_bytes) = self.limits.file_max_bytes {
            if file.size() > max_bytes {
                outcome.insert(
                    self.path.clone(),
                    format!("File size must be less than {}MB", max_bytes / (1024 * 1024)),
                );
            }
        }
    }
}

impl Validator<SourceFile> for FileConstraints<'_> {
    fn validate(&self, file: &SourceFile) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::new();

        match self.operation {
            UploadOperation::Image => self.validate_image(file, &mut outcome),
            UploadOperation::Video => self.validate_video(file, &mut outcome),
            UploadOperation::File => self.validate_file(file, &mut outcome),
        }

        outcome
    }
}

/// 只读取图片头部获取尺寸
fn image_dimensions(file: &SourceFile) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(file.content().as_ref()))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
