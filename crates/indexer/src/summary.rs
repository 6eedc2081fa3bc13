use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What one sync pass did
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Files seen by the scanner
    pub files_scanned: usize,

    /// Files parsed and re-indexed this pass
    pub files_processed: usize,

    /// Files left alone because nothing changed
    pub files_skipped: usize,

    /// Files removed from the index because they no longer exist
    pub files_removed: usize,

    /// Units embedded (new or changed)
    pub units_embedded: usize,

    /// Units kept with their existing vector
    pub units_reused: usize,

    /// Stale unit records evicted
    pub units_evicted: usize,

    /// Lines of source across processed files
    pub lines: usize,

    /// Processed file count per language tag
    pub languages: HashMap<String, usize>,

    /// Per-file failures ("path: message"), whether the file failed to
    /// stat, read, or parse; these files keep their previous index entries
    /// and are retried next pass
    pub parse_errors: Vec<String>,

    /// Per-unit embedding failures (unit id, message); retried next pass
    pub embed_failures: Vec<(String, String)>,

    /// Wall time of the pass in milliseconds
    pub time_ms: u64,
}

impl SyncSummary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_processed_file(&mut self, language: &str, lines: usize) {
        self.files_processed += 1;
        self.lines += lines;
        *self.languages.entry(language.to_string()).or_insert(0) += 1;
    }

    pub fn add_parse_error(&mut self, error: impl Into<String>) {
        self.parse_errors.push(error.into());
    }

    /// Whether the pass finished without any per-file or per-unit failure
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.parse_errors.is_empty() && self.embed_failures.is_empty()
    }
}

/// Current state of the index, for status reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    /// Whether an index exists at all
    pub indexed: bool,

    /// Model tag of the stored vectors
    pub model: Option<String>,

    /// Files tracked by the manifest
    pub files: usize,

    /// Units tracked by the manifest
    pub units: usize,

    /// Units still awaiting an embedding
    pub pending_units: usize,
}
