use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to parse session: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialize session: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("no command at position {0}")]
    NoSuchCommand(usize),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("prompt error: {0}")]
    Prompt(#[from] sesh_prompt::PromptError),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
