use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("render failed: {0}")]
    RenderError(String),

    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    #[error("a prompt is already open: {0}")]
    AlreadyOpen(String),
}
