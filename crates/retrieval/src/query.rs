use devagent_code_units::{CodeUnit, UnitKind};
use serde::Serialize;

/// What to retrieve context for
#[derive(Debug, Clone)]
pub struct RetrievalQuery {
    /// Free-text description of the task at hand
    pub text: String,

    /// How many results to return; `None` uses the configured default
    pub k: Option<usize>,

    /// Restrict to one language tag
    pub language: Option<String>,

    /// Restrict to one unit kind
    pub kind: Option<UnitKind>,

    /// Restrict to files under this path prefix
    pub path_prefix: Option<String>,

    /// Qualified name or id of the unit the developer is working in;
    /// structurally related units get a score bonus
    pub anchor: Option<String>,
}

impl RetrievalQuery {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            k: None,
            language: None,
            kind: None,
            path_prefix: None,
            anchor: None,
        }
    }

    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: UnitKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }
}

/// One retrieved unit with its final score
#[derive(Debug, Clone, Serialize)]
pub struct ScoredUnit {
    pub unit: CodeUnit,
    pub score: f32,
}
