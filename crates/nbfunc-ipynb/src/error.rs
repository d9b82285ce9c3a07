//! Error types for notebook loading.

use std::path::PathBuf;

/// Result type for notebook operations.
pub type NotebookResult<T> = Result<T, NotebookError>;

/// Errors that can occur while reading or writing notebooks.
#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    /// Failed to read the notebook file.
    #[error("Failed to read file {path}: {message}")]
    ReadError { path: PathBuf, message: String },

    /// Failed to write the notebook file.
    #[error("Failed to write file {path}: {message}")]
    WriteError { path: PathBuf, message: String },

    /// Failed to serialize/deserialize JSON.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Notebook structure we cannot scan (e.g. pre-v4 worksheets).
    #[error("Invalid notebook: {0}")]
    InvalidNotebook(String),
}
