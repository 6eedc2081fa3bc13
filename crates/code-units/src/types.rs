use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind of code unit based on the declaration it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// File-level unit (one per source file)
    Module,
    /// Class definition
    Class,
    /// Free function
    Function,
    /// Function defined inside a class body
    Method,
}

impl UnitKind {
    /// Get human-readable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Function => "function",
            Self::Method => "method",
        }
    }

    /// Parse a kind tag as used in CLI filters and persisted metadata
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "module" => Some(Self::Module),
            "class" => Some(Self::Class),
            "function" => Some(Self::Function),
            "method" => Some(Self::Method),
            _ => None,
        }
    }
}

/// One indexable, addressable piece of source code.
///
/// Units are derived data: recomputable at any time from the file they came
/// from and never authoritative over it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeUnit {
    /// Stable identifier: digest of file path + qualified name.
    /// Survives re-parses while both stay unchanged.
    pub id: String,

    /// Unit kind
    pub kind: UnitKind,

    /// Dotted qualified name ("greet", "Parser.parse", "<module>").
    /// The enclosing scope of a nested unit is derived by prefix matching
    /// on this name; units hold no parent pointers.
    pub qualified_name: String,

    /// Project-relative source file path, `/`-separated
    pub file_path: String,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    /// Byte offset of the unit start in the file
    pub start_byte: usize,

    /// Byte offset one past the unit end
    pub end_byte: usize,

    /// The unit's source text
    pub source: String,

    /// Docstring or leading doc comment, if any
    pub doc: Option<String>,

    /// Language tag ("python", "javascript", "typescript")
    pub language: String,

    /// Digest of `source`; changes iff the unit's text changed
    pub content_hash: String,
}

impl CodeUnit {
    /// Qualified name of the enclosing unit, if this unit is nested
    /// ("Parser.parse" -> "Parser").
    #[must_use]
    pub fn enclosing_scope(&self) -> Option<&str> {
        self.qualified_name.rsplit_once('.').map(|(prefix, _)| prefix)
    }

    /// Unqualified name ("Parser.parse" -> "parse")
    #[must_use]
    pub fn simple_name(&self) -> &str {
        self.qualified_name
            .rsplit_once('.')
            .map_or(self.qualified_name.as_str(), |(_, name)| name)
    }

    /// Check if `other` is this unit's enclosing scope
    #[must_use]
    pub fn is_enclosed_by(&self, other: &CodeUnit) -> bool {
        self.file_path == other.file_path
            && self.enclosing_scope() == Some(other.qualified_name.as_str())
    }

    /// Number of lines spanned by the unit
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// Compute the stable unit identifier for a file path + qualified name pair.
///
/// The digest input separates the two fields with a NUL so that the pair is
/// unambiguous regardless of what characters appear in either field.
#[must_use]
pub fn unit_id(file_path: &str, qualified_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(qualified_name.as_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 16)
}

/// Compute the content hash of a unit's source text
#[must_use]
pub fn content_hash(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    hex_prefix(&digest, 16)
}

fn hex_prefix(digest: &[u8], bytes: usize) -> String {
    let mut out = String::with_capacity(bytes * 2);
    for byte in digest.iter().take(bytes) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unit_id_is_stable_and_distinct() {
        let a = unit_id("a.py", "f");
        assert_eq!(a, unit_id("a.py", "f"));
        assert_ne!(a, unit_id("a.py", "g"));
        assert_ne!(a, unit_id("b.py", "f"));
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn unit_id_separates_fields_unambiguously() {
        // "ab" + "c" must not collide with "a" + "bc"
        assert_ne!(unit_id("ab", "c"), unit_id("a", "bc"));
    }

    #[test]
    fn content_hash_tracks_text() {
        let h = content_hash("def f(): pass");
        assert_eq!(h, content_hash("def f(): pass"));
        assert_ne!(h, content_hash("def f(): return 1"));
    }

    #[test]
    fn enclosing_scope_via_prefix() {
        let unit = CodeUnit {
            id: unit_id("a.py", "Parser.parse"),
            kind: UnitKind::Method,
            qualified_name: "Parser.parse".to_string(),
            file_path: "a.py".to_string(),
            start_line: 3,
            end_line: 5,
            start_byte: 20,
            end_byte: 80,
            source: "def parse(self): ...".to_string(),
            doc: None,
            language: "python".to_string(),
            content_hash: content_hash("def parse(self): ..."),
        };
        assert_eq!(unit.enclosing_scope(), Some("Parser"));
        assert_eq!(unit.simple_name(), "parse");
    }

    #[test]
    fn kind_tag_roundtrip() {
        for kind in [
            UnitKind::Module,
            UnitKind::Class,
            UnitKind::Function,
            UnitKind::Method,
        ] {
            assert_eq!(UnitKind::from_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(UnitKind::from_tag("impl"), None);
    }
}
