//! Incremental index synchronization.
//!
//! The [`SyncController`] owns the lifecycle of the on-disk index: it scans
//! the project, diffs file signatures against the [`IndexManifest`], parses
//! and extracts only what changed, and re-embeds only the units whose
//! content actually moved.
//!
//! ```no_run
//! use devagent_indexer::SyncController;
//! use devagent_embedding_index::HashEmbedder;
//! use std::sync::Arc;
//!
//! # async fn demo() -> devagent_indexer::Result<()> {
//! let controller = SyncController::new(".", Arc::new(HashEmbedder::new()))?;
//! let summary = controller.sync().await?;
//! println!("{} units embedded", summary.units_embedded);
//! # Ok(())
//! # }
//! ```

mod error;
mod manifest;
mod scanner;
mod summary;
mod sync;

pub use error::{Result, SyncError};
pub use manifest::{FileEntry, FileSignature, IndexManifest};
pub use scanner::FileScanner;
pub use summary::{IndexStatus, SyncSummary};
pub use sync::{SyncConfig, SyncController};
