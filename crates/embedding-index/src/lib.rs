//! Embedding store and similarity primitives.
//!
//! Keeps one [`EmbeddingRecord`] per code unit, persisted as a single JSON
//! document under `.devagent/index/`. The [`Embedder`] trait abstracts the
//! vector backend; [`HashEmbedder`] is the deterministic default.
//!
//! ```no_run
//! use devagent_embedding_index::{EmbeddingStore, HashEmbedder};
//!
//! # async fn demo() -> devagent_embedding_index::Result<()> {
//! let embedder = HashEmbedder::new();
//! let store = EmbeddingStore::load(".devagent/index/embeddings.json").await?;
//! assert!(store.matches_embedder(&embedder));
//! # Ok(())
//! # }
//! ```

mod embedder;
mod error;
pub mod paths;
mod store;
mod types;

pub use embedder::{cosine_similarity, Embedder, HashEmbedder, DEFAULT_DIMENSION};
pub use error::{EmbeddingIndexError, Result};
pub use store::EmbeddingStore;
pub use types::{EmbeddingRecord, FileIndexOutcome};
