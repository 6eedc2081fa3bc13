use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const MANIFEST_VERSION: u32 = 1;

/// Size + mtime fingerprint used to decide whether a file needs re-indexing.
/// Cheap to compute and conservative: a touched-but-identical file re-parses,
/// which the content hashes then turn into a no-op at the embedding level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSignature {
    pub mtime_ms: u64,
    pub size: u64,
}

impl FileSignature {
    /// Read the current signature of a file on disk
    pub async fn probe(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let meta = tokio::fs::metadata(path.as_ref()).await?;
        let mtime_ms = meta
            .modified()
            .ok()
            .and_then(|m| m.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Ok(Self {
            mtime_ms,
            size: meta.len(),
        })
    }
}

/// Per-file record in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub signature: FileSignature,

    /// Ids of the units currently indexed for this file
    pub unit_ids: Vec<String>,

    /// Ids of units whose embedding failed last time; a file with pending
    /// units is re-processed even when its signature is unchanged
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_units: Vec<String>,
}

/// Record of what the index currently covers.
///
/// The manifest is the sync controller's memory between runs: file
/// signatures for change detection, unit ids for eviction, pending units
/// for embedding retries. It is always persisted after the embedding store,
/// so a crash between the two leaves extra store records (harmless, content
/// hashes reconcile them) rather than manifest entries pointing at nothing.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexManifest {
    version: u32,
    model: String,
    // BTreeMap so identical content always serializes to identical bytes
    files: BTreeMap<String, FileEntry>,

    #[serde(skip)]
    dirty: bool,
}

impl IndexManifest {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            model: model.into(),
            files: BTreeMap::new(),
            dirty: true,
        }
    }

    /// Load a manifest from disk.
    ///
    /// Undecodable content is [`SyncError::ManifestCorrupt`]; callers must
    /// surface it instead of silently starting over.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read_to_string(path).await?;
        let manifest: Self =
            serde_json::from_str(&data).map_err(|e| SyncError::ManifestCorrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if manifest.version != MANIFEST_VERSION {
            return Err(SyncError::ManifestCorrupt {
                path: path.display().to_string(),
                reason: format!("unsupported manifest version {}", manifest.version),
            });
        }
        Ok(manifest)
    }

    /// Persist atomically via temp file + rename.
    /// A manifest without unsaved changes writes nothing.
    pub async fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if !self.dirty {
            log::debug!("Manifest unchanged, skipping save");
            return Ok(());
        }

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_string_pretty(self)?;
        let tmp = PathBuf::from(path).with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, path).await?;
        self.dirty = false;
        Ok(())
    }

    /// Model tag the indexed vectors belong to
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn entry(&self, rel_path: &str) -> Option<&FileEntry> {
        self.files.get(rel_path)
    }

    /// Whether a file needs processing: new, changed signature, or
    /// carrying units that still await an embedding
    #[must_use]
    pub fn needs_processing(&self, rel_path: &str, current: FileSignature) -> bool {
        match self.files.get(rel_path) {
            None => true,
            Some(entry) => entry.signature != current || !entry.pending_units.is_empty(),
        }
    }

    /// Record the outcome of processing one file
    pub fn set_file(
        &mut self,
        rel_path: impl Into<String>,
        signature: FileSignature,
        unit_ids: Vec<String>,
        pending_units: Vec<String>,
    ) {
        self.files.insert(
            rel_path.into(),
            FileEntry {
                signature,
                unit_ids,
                pending_units,
            },
        );
        self.dirty = true;
    }

    /// Forget a file; returns its entry if it was known
    pub fn remove_file(&mut self, rel_path: &str) -> Option<FileEntry> {
        let removed = self.files.remove(rel_path);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Whether there are unsaved changes
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Tracked files, unordered
    pub fn tracked_files(&self) -> impl Iterator<Item = (&str, &FileEntry)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Total units across all tracked files
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.files.values().map(|e| e.unit_ids.len()).sum()
    }

    /// Total units still awaiting an embedding
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.files.values().map(|e| e.pending_units.len()).sum()
    }
}
