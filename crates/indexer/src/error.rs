use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The manifest file cannot be decoded. Fatal: sync refuses to guess
    /// what the index contains; only an explicit rebuild clears this.
    #[error("Corrupt manifest at {path}: {reason} (run a rebuild to recover)")]
    ManifestCorrupt { path: String, reason: String },

    #[error("Sync time budget exceeded")]
    BudgetExceeded,

    #[error("Worker task panicked: {0}")]
    TaskPanicked(String),

    #[error(transparent)]
    Store(#[from] devagent_embedding_index::EmbeddingIndexError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
