use crate::core::{SourceFile, UploadMode, UploadOperation};
use super::{FieldPath, FileConstraints, FileLimits, ValidationOutcome, Validator};

/// 上传表单的原始输入
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub file: Option<SourceFile>,
    pub accept_terms: bool,
}

/// 上传表单校验：文件必填、必须同意条款，再叠加文件约束
#[derive(Debug, Clone)]
pub struct UploadFormValidator {
    pub operation: UploadOperation,
    pub mode: UploadMode,
    pub limits: FileLimits,
}

impl UploadFormValidator {
    pub fn new(operation: UploadOperation) -> Self {
        Self {
            operation,
            mode: UploadMode::Normal,
            limits: FileLimits::default(),
        }
    }

    pub fn with_mode(mut self, mode: UploadMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_limits(mut self, limits: FileLimits) -> Self {
        self.limits = limits;
        self
    }
}

impl Validator<UploadForm> for UploadFormValidator {
    fn validate(&self, form: &UploadForm) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::new();

        match &form.file {
            Some(file) => {
                let constraints = FileConstraints::new(self.operation, self.mode, &self.limits);
                outcome.merge(constraints.validate(file));
            }
            None => outcome.insert(FieldPath::field("file"), "File is required"),
        }

        if !form.accept_terms {
            outcome.insert(FieldPath::field("acceptTerms"), "You must accept the terms");
        }

        outcome
    }
}
