use devagent_code_units::CodeUnit;
use serde::{Deserialize, Serialize};

/// One indexed unit: the unit's metadata plus its embedding vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub unit: CodeUnit,
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    #[must_use]
    pub fn new(unit: CodeUnit, vector: Vec<f32>) -> Self {
        Self { unit, vector }
    }

    /// The unit's stable identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.unit.id
    }
}

/// What happened when one file's units were (re-)indexed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileIndexOutcome {
    /// Units embedded and inserted or replaced
    pub embedded: usize,

    /// Units whose content hash matched the stored record, left untouched
    pub reused: usize,

    /// Stale records evicted because their unit no longer exists
    pub evicted: usize,

    /// Units whose embedding failed, with the failure message.
    /// These stay out of the store and are retried on the next sync.
    pub failed: Vec<(String, String)>,
}

impl FileIndexOutcome {
    /// Ids of units that failed to embed
    #[must_use]
    pub fn failed_unit_ids(&self) -> Vec<String> {
        self.failed.iter().map(|(id, _)| id.clone()).collect()
    }
}
