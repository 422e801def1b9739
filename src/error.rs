use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AoiError {
    #[error("unable to parse input time: {0}")]
    TimeParse(String),

    #[error("unable to parse geojson: {0}")]
    GeometryParse(String),

    #[error("additional metadata cannot be parsed: {0}")]
    MetadataParse(String),

    #[error("failed to read context file at {0}")]
    ContextRead(PathBuf),

    #[error("invalid job context: {0}")]
    ContextParse(String),

    #[error("failed to read template at {0}")]
    TemplateRead(PathBuf),

    #[error("invalid template {path}: {message}")]
    TemplateParse { path: PathBuf, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("browse request failed: {0}")]
    BrowseHttp(String),

    #[error("browse server returned status {status}: {message}")]
    BrowseStatus { status: u16, message: String },

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("external tool failed: {0}")]
    ToolFailed(String),

    #[error("invalid email template: {0}")]
    EmailTemplate(String),

    #[error("email delivery failed: {0}")]
    Email(String),
}

impl AoiError {
    /// True for the errors raised while validating the job context fields.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AoiError::TimeParse(_) | AoiError::GeometryParse(_) | AoiError::MetadataParse(_)
        )
    }
}
