use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};
use crate::query::{RetrievalQuery, ScoredUnit};
use devagent_code_units::CodeUnit;
use devagent_embedding_index::{cosine_similarity, paths, Embedder, EmbeddingStore};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Read-only query surface over a synced index.
///
/// Scoring is cosine similarity against the query text, plus a flat bonus
/// for units structurally related to the anchor. Results are ordered
/// deterministically: score, then shorter file path, then unit id.
pub struct ContextRetriever {
    store: EmbeddingStore,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl fmt::Debug for ContextRetriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRetriever")
            .field("units", &self.store.len())
            .field("model", &self.store.model_tag())
            .finish_non_exhaustive()
    }
}

impl ContextRetriever {
    /// Open the index under a project root.
    ///
    /// Fails if no index exists, if the store is corrupt, or if the store
    /// was built by a different embedding model.
    pub async fn open(project_root: impl AsRef<Path>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let config = RetrievalConfig::load(&project_root).await?;
        Self::open_with_config(project_root, embedder, config).await
    }

    pub async fn open_with_config(
        project_root: impl AsRef<Path>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        let store_path = paths::store_path(&project_root);
        if !store_path.exists() {
            return Err(RetrievalError::NoIndex {
                path: store_path.display().to_string(),
            });
        }

        let store = EmbeddingStore::load(&store_path).await?;
        if !store.matches_embedder(embedder.as_ref()) {
            return Err(RetrievalError::ModelMismatch {
                stored: store.model_tag().to_string(),
                current: embedder.model_tag().to_string(),
            });
        }

        log::debug!("Opened index with {} units", store.len());
        Ok(Self {
            store,
            embedder,
            config,
        })
    }

    /// Retrieve the top-k units for a query
    pub async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<ScoredUnit>> {
        let k = query.k.unwrap_or(self.config.default_k);
        log::debug!("Retrieving top {k} for '{}'", query.text);

        let query_vector = self.embedder.embed(&query.text).await?;

        let anchor = match &query.anchor {
            Some(name) => Some(self.resolve_anchor(name)?),
            None => None,
        };

        let mut scored = Vec::new();
        for record in self.store.records() {
            // The anchor itself is what the developer already has open
            if anchor.is_some_and(|a| a.id == record.unit.id) {
                continue;
            }
            if !passes_filters(&record.unit, query) {
                continue;
            }

            let mut score = cosine_similarity(&query_vector, &record.vector)?;
            if let Some(anchor) = anchor {
                if is_structurally_related(anchor, &record.unit) {
                    score += self.config.structural_bonus;
                }
            }
            scored.push(ScoredUnit {
                unit: record.unit.clone(),
                score,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.unit.file_path.len().cmp(&b.unit.file_path.len()))
                .then_with(|| a.unit.id.cmp(&b.unit.id))
        });
        scored.truncate(k);

        log::debug!("Retrieved {} units", scored.len());
        Ok(scored)
    }

    /// All units of one file, in source order
    #[must_use]
    pub fn file_units(&self, rel_path: &str) -> Vec<CodeUnit> {
        let mut units: Vec<CodeUnit> = self
            .store
            .records_for_file(rel_path)
            .into_iter()
            .map(|r| r.unit.clone())
            .collect();
        units.sort_by_key(|u| (u.start_line, u.start_byte));
        units
    }

    /// Number of indexed units
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.store.len()
    }

    /// Resolve an anchor given as a unit id or a qualified name.
    /// Name collisions across files resolve to the lexically first file.
    fn resolve_anchor(&self, name: &str) -> Result<&CodeUnit> {
        if let Some(record) = self.store.get(name) {
            return Ok(&record.unit);
        }

        self.store
            .records()
            .filter(|r| r.unit.qualified_name == name)
            .min_by(|a, b| a.unit.file_path.cmp(&b.unit.file_path))
            .map(|r| &r.unit)
            .ok_or_else(|| RetrievalError::UnknownAnchor(name.to_string()))
    }
}

fn passes_filters(unit: &CodeUnit, query: &RetrievalQuery) -> bool {
    if let Some(language) = &query.language {
        if !unit.language.eq_ignore_ascii_case(language) {
            return false;
        }
    }
    if let Some(kind) = query.kind {
        if unit.kind != kind {
            return false;
        }
    }
    if let Some(prefix) = &query.path_prefix {
        if !unit.file_path.starts_with(prefix.as_str()) {
            return false;
        }
    }
    true
}

/// Same file as the anchor, or a textual caller/callee link in either
/// direction. The call check is a plain `name(` substring probe; cheap and
/// language-independent, with false positives accepted.
fn is_structurally_related(anchor: &CodeUnit, candidate: &CodeUnit) -> bool {
    if candidate.file_path == anchor.file_path {
        return true;
    }

    let anchor_call = format!("{}(", anchor.simple_name());
    let candidate_call = format!("{}(", candidate.simple_name());
    anchor.source.contains(&candidate_call) || candidate.source.contains(&anchor_call)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devagent_code_units::{content_hash, unit_id, UnitKind};

    fn unit(file: &str, name: &str, source: &str) -> CodeUnit {
        CodeUnit {
            id: unit_id(file, name),
            kind: UnitKind::Function,
            qualified_name: name.to_string(),
            file_path: file.to_string(),
            start_line: 1,
            end_line: 2,
            start_byte: 0,
            end_byte: source.len(),
            source: source.to_string(),
            doc: None,
            language: "python".to_string(),
            content_hash: content_hash(source),
        }
    }

    #[test]
    fn same_file_is_related() {
        let a = unit("a.py", "f", "def f(): pass");
        let b = unit("a.py", "g", "def g(): pass");
        assert!(is_structurally_related(&a, &b));
    }

    #[test]
    fn caller_callee_is_related_across_files() {
        let f = unit("a.py", "fetch_user", "def fetch_user(db): return db.get()");
        let caller = unit("b.py", "handler", "def handler():\n    fetch_user(db)");
        let unrelated = unit("c.py", "render", "def render(): pass");

        assert!(is_structurally_related(&f, &caller));
        assert!(is_structurally_related(&caller, &f));
        assert!(!is_structurally_related(&f, &unrelated));
    }

    #[test]
    fn filters_match_language_kind_and_path() {
        let mut u = unit("src/api/users.py", "f", "def f(): pass");
        u.kind = UnitKind::Function;

        let query = RetrievalQuery::new("x")
            .with_language("python")
            .with_kind(UnitKind::Function)
            .with_path_prefix("src/api/");
        assert!(passes_filters(&u, &query));

        let wrong_lang = RetrievalQuery::new("x").with_language("typescript");
        assert!(!passes_filters(&u, &wrong_lang));

        let wrong_kind = RetrievalQuery::new("x").with_kind(UnitKind::Class);
        assert!(!passes_filters(&u, &wrong_kind));

        let wrong_path = RetrievalQuery::new("x").with_path_prefix("tests/");
        assert!(!passes_filters(&u, &wrong_path));
    }
}
