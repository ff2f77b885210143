use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeftError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Sandbox error: {0}")]
    Sandbox(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Markup error: {0}")]
    Markup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WeftError>;
