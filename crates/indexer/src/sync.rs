use crate::error::{Result, SyncError};
use crate::manifest::{FileSignature, IndexManifest};
use crate::scanner::FileScanner;
use crate::summary::{IndexStatus, SyncSummary};
use async_trait::async_trait;
use devagent_code_units::{CodeUnit, Language, SourceParser, UnitExtractor};
use devagent_embedding_index::{paths, Embedder, EmbeddingIndexError, EmbeddingStore};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tuning knobs for a sync pass
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Per-unit embedding timeout; a timed-out unit becomes pending and is
    /// retried next pass
    pub embed_timeout: Duration,

    /// Worker cap for parse/extract fan-out; `None` adapts to the host
    pub max_workers: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            embed_timeout: Duration::from_secs(30),
            max_workers: None,
        }
    }
}

/// Keeps the embedding index in step with the project's source files.
///
/// A sync pass scans, diffs against the manifest, re-parses only what
/// changed, and re-embeds only the units whose content hash moved. Parse
/// failures skip the file and keep its previous index entries; embedding
/// failures skip the unit and mark it pending. Persisted state goes store
/// first, manifest second, both via atomic renames.
pub struct SyncController {
    root: PathBuf,
    store_path: PathBuf,
    manifest_path: PathBuf,
    embedder: Arc<dyn Embedder>,
    config: SyncConfig,
}

impl SyncController {
    /// Create a controller for a project root
    pub fn new(root: impl AsRef<Path>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::with_config(root, embedder, SyncConfig::default())
    }

    pub fn with_config(
        root: impl AsRef<Path>,
        embedder: Arc<dyn Embedder>,
        config: SyncConfig,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            return Err(SyncError::InvalidPath(format!(
                "Path does not exist: {}",
                root.display()
            )));
        }

        Ok(Self {
            store_path: paths::store_path(&root),
            manifest_path: paths::manifest_path(&root),
            root,
            embedder,
            config,
        })
    }

    /// Incremental sync
    pub async fn sync(&self) -> Result<SyncSummary> {
        self.sync_with_mode(false, None).await
    }

    /// Incremental sync with a best-effort time budget.
    ///
    /// Budget enforcement is cooperative and checked between phases. When
    /// the budget runs out, nothing is persisted; the previous index stays
    /// intact.
    pub async fn sync_with_budget(&self, max_duration: Duration) -> Result<SyncSummary> {
        self.sync_with_mode(false, Some(Instant::now() + max_duration))
            .await
    }

    /// Discard all index state and re-index from scratch.
    /// This is the only way past a corrupt store or manifest.
    pub async fn rebuild(&self) -> Result<SyncSummary> {
        self.sync_with_mode(true, None).await
    }

    /// Current index state without touching it
    pub async fn status(&self) -> Result<IndexStatus> {
        if !self.manifest_path.exists() {
            return Ok(IndexStatus {
                indexed: false,
                model: None,
                files: 0,
                units: 0,
                pending_units: 0,
            });
        }

        let manifest = IndexManifest::load(&self.manifest_path).await?;
        Ok(IndexStatus {
            indexed: true,
            model: Some(manifest.model().to_string()),
            files: manifest.file_count(),
            units: manifest.unit_count(),
            pending_units: manifest.pending_count(),
        })
    }

    async fn sync_with_mode(
        &self,
        force_full: bool,
        deadline: Option<Instant>,
    ) -> Result<SyncSummary> {
        let start = Instant::now();
        let mut summary = SyncSummary::new();
        let model_tag = self.embedder.model_tag();

        log::info!("Syncing index for {}", self.root.display());
        check_budget(deadline)?;

        // 1. Scan for files
        let scanner = FileScanner::new(&self.root);
        let files = scanner.scan();
        summary.files_scanned = files.len();
        check_budget(deadline)?;

        // 2. Load or create manifest and store
        let mut manifest = if force_full || !self.manifest_path.exists() {
            IndexManifest::new(model_tag)
        } else {
            IndexManifest::load(&self.manifest_path).await?
        };

        let mut store = if force_full || !self.store_path.exists() {
            EmbeddingStore::new(&self.store_path, self.embedder.as_ref())
        } else {
            let loaded = EmbeddingStore::load(&self.store_path).await?;
            if loaded.matches_embedder(self.embedder.as_ref()) {
                loaded
            } else {
                log::warn!(
                    "Embedding model changed ({} -> {model_tag}); re-embedding everything",
                    loaded.model_tag()
                );
                manifest = IndexManifest::new(model_tag);
                EmbeddingStore::new(&self.store_path, self.embedder.as_ref())
            }
        };
        if manifest.model() != model_tag {
            manifest = IndexManifest::new(model_tag);
        }
        check_budget(deadline)?;

        // 3. Drop files that no longer exist
        let live: HashSet<String> = files.iter().map(|p| self.normalize_path(p)).collect();
        let tracked: Vec<String> = manifest
            .tracked_files()
            .map(|(rel, _)| rel.to_string())
            .collect();
        for rel in tracked {
            if !live.contains(&rel) {
                manifest.remove_file(&rel);
                let removed = store.remove_file(&rel);
                summary.files_removed += 1;
                summary.units_evicted += removed;
                log::debug!("Dropped deleted file {rel} ({removed} units)");
            }
        }

        // 4. Decide which files need processing
        let mut to_process = Vec::new();
        let mut signatures: HashMap<String, FileSignature> = HashMap::new();
        for path in &files {
            check_budget(deadline)?;
            let rel = self.normalize_path(path);
            let signature = match FileSignature::probe(path).await {
                Ok(signature) => signature,
                // File vanished or became unreadable since the scan
                Err(e) => {
                    log::warn!("Failed to stat {rel}: {e}");
                    summary.add_parse_error(format!("{rel}: {e}"));
                    continue;
                }
            };
            if manifest.needs_processing(&rel, signature) {
                signatures.insert(rel, signature);
                to_process.push(path.clone());
            } else {
                summary.files_skipped += 1;
            }
        }
        log::info!(
            "Incremental: processing {} of {} files",
            to_process.len(),
            files.len()
        );

        // 5. Parse and extract in parallel, then apply serially
        let embedder = TimeoutEmbedder {
            inner: Arc::clone(&self.embedder),
            timeout: self.config.embed_timeout,
        };

        let results =
            process_files_parallel(&self.root, &to_process, self.config.max_workers, deadline)
                .await?;

        for result in results {
            check_budget(deadline)?;
            match result {
                Ok(processed) => {
                    summary.add_processed_file(&processed.language, processed.lines);

                    let all_ids: Vec<String> =
                        processed.units.iter().map(|u| u.id.clone()).collect();
                    let outcome = store
                        .index_file_units(&processed.rel_path, processed.units, &embedder)
                        .await?;

                    summary.units_embedded += outcome.embedded;
                    summary.units_reused += outcome.reused;
                    summary.units_evicted += outcome.evicted;
                    summary.embed_failures.extend(outcome.failed.clone());

                    let pending = outcome.failed_unit_ids();
                    let indexed_ids: Vec<String> = all_ids
                        .into_iter()
                        .filter(|id| !pending.contains(id))
                        .collect();
                    if let Some(signature) = signatures.get(&processed.rel_path) {
                        manifest.set_file(&processed.rel_path, *signature, indexed_ids, pending);
                    }
                }
                Err(message) => {
                    // The file keeps its previous index entries and stays
                    // eligible for the next pass
                    log::warn!("Failed to process file: {message}");
                    summary.add_parse_error(message);
                }
            }
        }

        // 6. Persist, store before manifest: a crash in between leaves
        // extra store records the content hashes reconcile later, never a
        // manifest pointing at vectors that do not exist
        check_budget(deadline)?;
        store.save().await?;
        manifest.save(&self.manifest_path).await?;

        summary.time_ms = u64::try_from(start.elapsed().as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        log::info!(
            "Sync completed: {} processed, {} skipped, {} embedded, {} reused in {}ms",
            summary.files_processed,
            summary.files_skipped,
            summary.units_embedded,
            summary.units_reused,
            summary.time_ms
        );
        Ok(summary)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    fn normalize_path(&self, path: &Path) -> String {
        normalize_path(&self.root, path)
    }
}

/// Wraps the configured embedder with a per-call timeout so one stuck
/// backend call cannot wedge a whole sync pass
struct TimeoutEmbedder {
    inner: Arc<dyn Embedder>,
    timeout: Duration,
}

#[async_trait]
impl Embedder for TimeoutEmbedder {
    async fn embed(&self, text: &str) -> devagent_embedding_index::Result<Vec<f32>> {
        match tokio::time::timeout(self.timeout, self.inner.embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(EmbeddingIndexError::EmbeddingTimeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_tag(&self) -> &str {
        self.inner.model_tag()
    }
}

struct ProcessedFile {
    rel_path: String,
    units: Vec<CodeUnit>,
    language: String,
    lines: usize,
}

/// Parse and extract files with a bounded fan-out.
///
/// Parsing is CPU-bound and reads are IO-bound; a small adaptive cap keeps
/// large re-index runs from spiking the host.
async fn process_files_parallel(
    root: &Path,
    files: &[PathBuf],
    max_workers: Option<usize>,
    deadline: Option<Instant>,
) -> Result<Vec<std::result::Result<ProcessedFile, String>>> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let max_concurrent = max_workers
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
        .clamp(2, 8);

    let mut aggregated = Vec::with_capacity(files.len());

    for batch in files.chunks(max_concurrent) {
        check_budget(deadline)?;
        let mut tasks = Vec::with_capacity(batch.len());
        for file_path in batch {
            let root = root.to_path_buf();
            let file_path = file_path.clone();
            tasks.push(tokio::spawn(
                async move { process_one_file(root, file_path).await },
            ));
        }

        for task in tasks {
            check_budget(deadline)?;
            match task.await {
                Ok(result) => aggregated.push(result),
                Err(e) => return Err(SyncError::TaskPanicked(e.to_string())),
            }
        }
    }

    Ok(aggregated)
}

async fn process_one_file(
    root: PathBuf,
    path: PathBuf,
) -> std::result::Result<ProcessedFile, String> {
    let rel_path = normalize_path(&root, &path);
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| format!("{rel_path}: {e}"))?;
    let lines = content.lines().count();

    let language = Language::from_path(&path);
    let mut parser =
        SourceParser::for_language(language).map_err(|e| format!("{rel_path}: {e}"))?;
    let tree = parser.parse(&rel_path, &content).map_err(|e| e.to_string())?;
    let units = UnitExtractor::extract(tree);

    Ok(ProcessedFile {
        rel_path,
        units,
        language: language.as_str().to_string(),
        lines,
    })
}

fn normalize_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut normalized = relative.to_string_lossy().to_string();
    if normalized.contains('\\') {
        normalized = normalized.replace('\\', "/");
    }
    normalized
}

fn check_budget(deadline: Option<Instant>) -> Result<()> {
    if let Some(deadline) = deadline {
        if Instant::now() >= deadline {
            return Err(SyncError::BudgetExceeded);
        }
    }
    Ok(())
}
