use thiserror::Error;

/// Result type for parsing and extraction
pub type Result<T> = std::result::Result<T, ParseError>;

/// A per-file parse failure.
///
/// Parse errors are recoverable at the pipeline level: the sync controller
/// skips the file, records the error in its summary and retries on the next
/// pass. They must never surface as unrelated low-level failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{file_path}:{line}:{column}: {message}")]
pub struct ParseError {
    /// File the failure belongs to
    pub file_path: String,

    /// 1-based line of the first offending position
    pub line: usize,

    /// 1-based column of the first offending position
    pub column: usize,

    /// Human-readable description
    pub message: String,
}

impl ParseError {
    pub fn new(
        file_path: impl Into<String>,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Failure not tied to a position in the file (unsupported language,
    /// grammar initialization, ...)
    pub fn file_level(file_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(file_path, 1, 1, message)
    }
}
