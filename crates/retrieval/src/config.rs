use crate::error::{Result, RetrievalError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Retrieval tuning, loadable from `.devagent/config.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Results returned when a query does not set `k`
    pub default_k: usize,

    /// Additive score bonus for units structurally related to the anchor
    /// (same file, or a textual caller/callee link)
    pub structural_bonus: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            structural_bonus: 0.15,
        }
    }
}

#[derive(Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    retrieval: RetrievalConfig,
}

impl RetrievalConfig {
    /// Parse from a config document with a `[retrieval]` table
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| RetrievalError::Config(e.to_string()))?;
        file.retrieval.validate()?;
        Ok(file.retrieval)
    }

    /// Load from `<project>/.devagent/config.toml`, defaults when absent
    pub async fn load(project_root: impl AsRef<Path>) -> Result<Self> {
        let path = project_root.as_ref().join(".devagent").join("config.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = tokio::fs::read_to_string(&path).await?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.default_k == 0 {
            return Err(RetrievalError::Config(
                "default_k must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.structural_bonus) {
            return Err(RetrievalError::Config(format!(
                "structural_bonus must be in [0, 1], got {}",
                self.structural_bonus
            )));
        }
        Ok(())
    }
}
