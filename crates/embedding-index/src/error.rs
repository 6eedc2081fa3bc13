use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbeddingIndexError>;

#[derive(Error, Debug)]
pub enum EmbeddingIndexError {
    /// A single text failed to embed. Recoverable: the caller records the
    /// affected unit as pending and keeps indexing the rest of the file.
    #[error("Embedding failed: {message}")]
    Embedding { message: String },

    #[error("Embedding timed out after {seconds}s")]
    EmbeddingTimeout { seconds: u64 },

    /// The persisted store file cannot be decoded. Fatal: only an explicit
    /// rebuild recovers from this, never a silent re-index.
    #[error("Corrupt embedding store at {path}: {reason}")]
    CorruptStore { path: String, reason: String },

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EmbeddingIndexError {
    /// Whether indexing may continue past this error
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Embedding { .. } | Self::EmbeddingTimeout { .. }
        )
    }
}
