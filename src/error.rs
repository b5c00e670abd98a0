use thiserror::Error;

/// Errors surfaced by the converter.
///
/// Malformed Markdown is never an error: unresolved references, unterminated
/// code spans and unbalanced HTML all fall back to literal output. The
/// variants here cover configuration problems and the nesting guard.
#[derive(Debug, Error)]
pub enum MarkdownError {
    #[error("nesting depth limit of {limit} exceeded")]
    RecursionLimit { limit: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to compile pattern: {0}")]
    Pattern(#[from] fancy_regex::Error),

    #[error("failed to compile pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MarkdownError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

pub type Result<T> = std::result::Result<T, MarkdownError>;
