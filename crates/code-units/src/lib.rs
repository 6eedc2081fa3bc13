//! # DevAgent Code Units
//!
//! Structural decomposition of source files into indexable code units.
//!
//! ## Pipeline
//!
//! ```text
//! Source text
//!     │
//!     ├──> Language Detection (from extension/tag)
//!     │
//!     ├──> Tree-sitter Parsing → ParseTree
//!     │
//!     └──> Unit Extraction
//!          ├─> Module unit (file-level, with module docstring)
//!          ├─> Functions / classes in document order
//!          └─> Methods as separate units, qualified "Class.method"
//! ```
//!
//! Every unit carries a stable identifier (digest of file path + qualified
//! name) and a content hash (digest of its source text). The identifier
//! survives re-parses of unchanged code; the content hash changes exactly
//! when the unit's text changes, which is what the incremental indexer
//! keys on.
//!
//! ## Example
//!
//! ```rust
//! use devagent_code_units::{Language, SourceParser, UnitExtractor};
//!
//! let code = "def greet(name):\n    return f\"hi {name}\"\n";
//! let mut parser = SourceParser::for_language(Language::Python).unwrap();
//! let tree = parser.parse("pkg/greet.py", code).unwrap();
//! let units = UnitExtractor::extract(tree);
//! assert!(units.iter().any(|u| u.qualified_name == "greet"));
//! ```

mod error;
mod extractor;
mod language;
mod parser;
mod types;

pub use error::{ParseError, Result};
pub use extractor::UnitExtractor;
pub use language::Language;
pub use parser::{ParseTree, SourceParser};
pub use types::{content_hash, unit_id, CodeUnit, UnitKind};
