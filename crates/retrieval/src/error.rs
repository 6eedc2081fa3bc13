use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Retrieval failures are fatal: a query against a broken or missing index
/// must fail loudly, never return partial context as if it were complete.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("No index found at {path}; run a sync first")]
    NoIndex { path: String },

    #[error("Index was built with model {stored}, current model is {current}; re-index to query")]
    ModelMismatch { stored: String, current: String },

    #[error("Unknown anchor unit: {0}")]
    UnknownAnchor(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Index(#[from] devagent_embedding_index::EmbeddingIndexError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
