use std::path::PathBuf;
use thiserror::Error;

/// Malformed filter expression.
///
/// A parse error never aborts the session: the filter is reset to an
/// unrestricted state and the error is reported once.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterParseError {
    #[error("Char '{ch}' cannot be escaped. At {index} of '{input}'")]
    UnescapableChar { ch: char, index: usize, input: String },
    #[error("Unexpected ':' at index {index} of '{input}'")]
    UnexpectedColon { index: usize, input: String },
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Analysis cancelled during stage '{stage}'")]
    Cancelled { stage: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest {path}: {source}")]
    Manifest { path: PathBuf, source: serde_json::Error },

    #[error("Invalid configuration: {0}")]
    Config(String),
}
