//! Error types for nbfunc-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for nbfunc-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while exporting or building a function.
#[derive(Debug, Error)]
pub enum Error {
    /// A directive marker without a recognizable command name.
    #[error("directive syntax error: {0:?}")]
    DirectiveSyntax(String),

    /// Directive name not in the registry.
    #[error("unknown nuclio command: {name}")]
    UnknownDirective { name: String, supported: Vec<String> },

    /// Config assignment line that does not match `path op value`.
    #[error("bad config line {line:?}: {reason}")]
    ConfigLine { line: String, reason: String },

    /// Key path that runs through a non-mapping (or appends to a non-list).
    #[error("cannot update {path}: {reason}")]
    PathConflict { path: String, reason: String },

    /// Boundary annotations out of order.
    #[error("{message}{}", target_suffix(.target))]
    State { target: String, message: String },

    /// A referenced file does not exist.
    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// Environment line without `=`.
    #[error("cannot parse environment value from {line:?}{}", origin_suffix(.origin))]
    EnvParse {
        line: String,
        origin: Option<PathBuf>,
    },

    /// Directive arguments rejected by its argument parser.
    #[error("bad arguments to {directive}: {message}")]
    InvalidArguments { directive: String, message: String },

    /// Source file kind that cannot be turned into a function.
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    /// Notebook could not be loaded.
    #[error(transparent)]
    Notebook(#[from] nbfunc_ipynb::NotebookError),

    /// YAML (de)serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn target_suffix(target: &str) -> String {
    if target.is_empty() {
        String::new()
    } else {
        format!(" (function {target:?})")
    }
}

fn origin_suffix(origin: &Option<PathBuf>) -> String {
    origin
        .as_ref()
        .map(|path| format!(" ({})", path.display()))
        .unwrap_or_default()
}

impl Error {
    pub(crate) fn state(target: &str, message: impl Into<String>) -> Self {
        Error::State {
            target: target.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn config_line(line: &str, reason: impl Into<String>) -> Self {
        Error::ConfigLine {
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    /// Render the error with a recovery hint for the command line.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Error::UnknownDirective { supported, .. } if !supported.is_empty() => {
                Some(format!("supported commands: {}", supported.join(", ")))
            }
            Error::DirectiveSyntax(_) => {
                Some("directives look like `%nuclio <command> [args]`".to_string())
            }
            Error::ConfigLine { .. } => Some(
                "use `path.to.key = value` or `path.to.key += value` with a literal value"
                    .to_string(),
            ),
            Error::State { .. } => Some(
                "every `start-code` must be closed by an `end-code` before it is opened again"
                    .to_string(),
            ),
            Error::EnvParse { .. } => Some("environment lines look like KEY=value".to_string()),
            _ => None,
        };

        match hint {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_message_names_target() {
        let err = Error::state("my-fn", "multiple consecutive start-code annotations");
        assert_eq!(
            err.to_string(),
            "multiple consecutive start-code annotations (function \"my-fn\")"
        );
        let err = Error::state("", "multiple consecutive end-code annotations");
        assert_eq!(err.to_string(), "multiple consecutive end-code annotations");
    }

    #[test]
    fn test_unknown_directive_hint_lists_commands() {
        let err = Error::UnknownDirective {
            name: "deplyo".to_string(),
            supported: vec!["cmd".to_string(), "deploy".to_string()],
        };
        let text = err.with_hint();
        assert!(text.starts_with("unknown nuclio command: deplyo"));
        assert!(text.contains("supported commands: cmd, deploy"));
    }

    #[test]
    fn test_env_parse_mentions_file() {
        let err = Error::EnvParse {
            line: "FOO".to_string(),
            origin: Some(PathBuf::from("env.txt")),
        };
        assert_eq!(
            err.to_string(),
            "cannot parse environment value from \"FOO\" (env.txt)"
        );
    }
}
