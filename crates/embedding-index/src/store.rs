use crate::embedder::Embedder;
use crate::error::{EmbeddingIndexError, Result};
use crate::types::{EmbeddingRecord, FileIndexOutcome};
use devagent_code_units::CodeUnit;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// On-disk layout of the store file
#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    model: String,
    dimension: usize,
    records: Vec<EmbeddingRecord>,
}

const STORE_VERSION: u32 = 1;

/// Separator between a unit's source and docstring in the embedded text
const DOC_SEPARATOR: &str = "\n\n";

/// Text a unit is embedded from: its source, with the docstring appended
/// so documentation vocabulary lands in the vector too
fn embedding_text(unit: &CodeUnit) -> std::borrow::Cow<'_, str> {
    match &unit.doc {
        Some(doc) => std::borrow::Cow::Owned(format!("{}{DOC_SEPARATOR}{doc}", unit.source)),
        None => std::borrow::Cow::Borrowed(unit.source.as_str()),
    }
}

/// Persistent embedding index keyed by unit id.
///
/// Holds every indexed unit's metadata and vector in memory and persists
/// them as one JSON document. Writes go through a temp file and rename so
/// a crash mid-save never leaves a half-written store behind.
#[derive(Debug)]
pub struct EmbeddingStore {
    records: HashMap<String, EmbeddingRecord>,
    model_tag: String,
    dimension: usize,
    path: PathBuf,
    dirty: bool,
}

impl EmbeddingStore {
    /// Create an empty store bound to `path`, typed to `embedder`'s space
    pub fn new(path: impl AsRef<Path>, embedder: &dyn Embedder) -> Self {
        Self {
            records: HashMap::new(),
            model_tag: embedder.model_tag().to_string(),
            dimension: embedder.dimension(),
            path: path.as_ref().to_path_buf(),
            dirty: false,
        }
    }

    /// Load a store from disk.
    ///
    /// A file that exists but cannot be decoded is reported as
    /// [`EmbeddingIndexError::CorruptStore`]; callers must not paper over
    /// that by re-indexing without being told to rebuild.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading embedding store from {}", path.display());

        let data = tokio::fs::read_to_string(path).await?;
        let file: StoreFile =
            serde_json::from_str(&data).map_err(|e| EmbeddingIndexError::CorruptStore {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if file.version != STORE_VERSION {
            return Err(EmbeddingIndexError::CorruptStore {
                path: path.display().to_string(),
                reason: format!("unsupported store version {}", file.version),
            });
        }

        let mut records = HashMap::with_capacity(file.records.len());
        for record in file.records {
            if record.vector.len() != file.dimension {
                return Err(EmbeddingIndexError::CorruptStore {
                    path: path.display().to_string(),
                    reason: format!(
                        "record {} has dimension {}, store declares {}",
                        record.id(),
                        record.vector.len(),
                        file.dimension
                    ),
                });
            }
            records.insert(record.id().to_string(), record);
        }

        log::info!("Loaded {} embedding records", records.len());
        Ok(Self {
            records,
            model_tag: file.model,
            dimension: file.dimension,
            path: path.to_path_buf(),
            dirty: false,
        })
    }

    /// Whether the store's vectors were produced by `embedder`.
    /// A mismatch means every vector must be recomputed from scratch.
    #[must_use]
    pub fn matches_embedder(&self, embedder: &dyn Embedder) -> bool {
        self.model_tag == embedder.model_tag() && self.dimension == embedder.dimension()
    }

    /// Model tag the stored vectors belong to
    #[must_use]
    pub fn model_tag(&self) -> &str {
        &self.model_tag
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Insert or replace one record
    pub fn upsert(&mut self, record: EmbeddingRecord) -> Result<()> {
        if record.vector.len() != self.dimension {
            return Err(EmbeddingIndexError::InvalidDimension {
                expected: self.dimension,
                actual: record.vector.len(),
            });
        }
        self.records.insert(record.id().to_string(), record);
        self.dirty = true;
        Ok(())
    }

    /// Get a record by unit id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&EmbeddingRecord> {
        self.records.get(id)
    }

    /// Remove a record by unit id
    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.records.remove(id).is_some();
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Remove every record belonging to a file; returns how many
    pub fn remove_file(&mut self, file_path: &str) -> usize {
        let ids: Vec<String> = self
            .records
            .values()
            .filter(|r| r.unit.file_path == file_path)
            .map(|r| r.id().to_string())
            .collect();
        for id in &ids {
            self.records.remove(id);
        }
        if !ids.is_empty() {
            self.dirty = true;
        }
        ids.len()
    }

    /// Records belonging to one file
    #[must_use]
    pub fn records_for_file(&self, file_path: &str) -> Vec<&EmbeddingRecord> {
        self.records
            .values()
            .filter(|r| r.unit.file_path == file_path)
            .collect()
    }

    /// Iterate over all records
    pub fn records(&self) -> impl Iterator<Item = &EmbeddingRecord> {
        self.records.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct files with at least one record
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.records
            .values()
            .map(|r| r.unit.file_path.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Whether there are unsaved changes
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bring the store in line with one file's current units.
    ///
    /// Units whose content hash matches the stored record keep their
    /// vector; changed and new units are embedded; records for units that
    /// no longer exist in the file are evicted. A unit whose embedding
    /// fails is skipped and reported in the outcome, not inserted, so the
    /// next sync retries it.
    pub async fn index_file_units(
        &mut self,
        file_path: &str,
        units: Vec<CodeUnit>,
        embedder: &dyn Embedder,
    ) -> Result<FileIndexOutcome> {
        let mut outcome = FileIndexOutcome::default();
        let incoming: HashSet<String> = units.iter().map(|u| u.id.clone()).collect();

        for unit in units {
            if let Some(existing) = self.records.get(&unit.id) {
                if existing.unit.content_hash == unit.content_hash {
                    outcome.reused += 1;
                    continue;
                }
            }

            match embedder.embed(&embedding_text(&unit)).await {
                Ok(vector) => {
                    self.upsert(EmbeddingRecord::new(unit, vector))?;
                    outcome.embedded += 1;
                }
                Err(e) if e.is_recoverable() => {
                    log::warn!("Embedding failed for {}: {e}", unit.id);
                    outcome.failed.push((unit.id, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        let stale: Vec<String> = self
            .records
            .values()
            .filter(|r| r.unit.file_path == file_path && !incoming.contains(r.id()))
            .map(|r| r.id().to_string())
            .collect();
        for id in stale {
            self.records.remove(&id);
            self.dirty = true;
            outcome.evicted += 1;
        }

        log::debug!(
            "Indexed {}: {} embedded, {} reused, {} evicted, {} failed",
            file_path,
            outcome.embedded,
            outcome.reused,
            outcome.evicted,
            outcome.failed.len()
        );
        Ok(outcome)
    }

    /// Persist the store if it has unsaved changes.
    ///
    /// Writes to a sibling temp file and renames over the target so
    /// readers never observe a partial store.
    pub async fn save(&mut self) -> Result<()> {
        if !self.dirty {
            log::debug!("Embedding store unchanged, skipping save");
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut records: Vec<&EmbeddingRecord> = self.records.values().collect();
        records.sort_by(|a, b| a.id().cmp(b.id()));

        let file = StoreFile {
            version: STORE_VERSION,
            model: self.model_tag.clone(),
            dimension: self.dimension,
            records: records.into_iter().cloned().collect(),
        };
        let data = serde_json::to_string_pretty(&file)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        self.dirty = false;

        log::info!(
            "Saved {} embedding records to {}",
            self.records.len(),
            self.path.display()
        );
        Ok(())
    }
}
