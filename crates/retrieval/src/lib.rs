//! Context retrieval over the embedding index.
//!
//! Given a free-text task description and an optional anchor unit, ranks
//! indexed code units by semantic similarity plus structural proximity and
//! returns the top k.
//!
//! ```no_run
//! use devagent_retrieval::{ContextRetriever, RetrievalQuery};
//! use devagent_embedding_index::HashEmbedder;
//! use std::sync::Arc;
//!
//! # async fn demo() -> devagent_retrieval::Result<()> {
//! let retriever = ContextRetriever::open(".", Arc::new(HashEmbedder::new())).await?;
//! let results = retriever
//!     .retrieve(&RetrievalQuery::new("validate session tokens").with_k(3))
//!     .await?;
//! for hit in results {
//!     println!("{:.3}  {}  {}", hit.score, hit.unit.file_path, hit.unit.qualified_name);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod query;
mod retriever;

pub use config::RetrievalConfig;
pub use error::{Result, RetrievalError};
pub use query::{RetrievalQuery, ScoredUnit};
pub use retriever::ContextRetriever;
