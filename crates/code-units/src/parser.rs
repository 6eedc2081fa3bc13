use crate::error::{ParseError, Result};
use crate::language::Language;
use std::fmt;
use tree_sitter::{Node, Parser, Tree};

/// Language-polymorphic source parser.
///
/// One instance wraps one Tree-sitter grammar; construction fails for
/// unsupported languages so the pipeline never branches on language past
/// this point.
pub struct SourceParser {
    parser: Parser,
    language: Language,
}

/// Parse result for one file.
///
/// Owned exclusively by the extraction call that consumes it; never
/// persisted.
pub struct ParseTree {
    pub(crate) tree: Tree,
    pub(crate) source: String,
    pub(crate) file_path: String,
    pub(crate) language: Language,
}

impl fmt::Debug for ParseTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseTree")
            .field("file_path", &self.file_path)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl ParseTree {
    /// The file this tree was parsed from
    #[must_use]
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Language the file was parsed as
    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }
}

impl SourceParser {
    /// Create a parser for a language
    pub fn for_language(language: Language) -> std::result::Result<Self, String> {
        let Some(ts_language) = language.tree_sitter_language() else {
            return Err(format!("unsupported language: {}", language.as_str()));
        };

        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| format!("failed to load {} grammar: {e}", language.as_str()))?;

        Ok(Self { parser, language })
    }

    /// Create a parser for the language implied by a file path
    pub fn for_path(path: &str) -> std::result::Result<Self, String> {
        Self::for_language(Language::from_path(path))
    }

    /// Parse one file's text into a structural tree.
    ///
    /// The input is not mutated; the returned tree owns a copy of the
    /// source so extraction can slice unit text out of it. Syntactically
    /// invalid input fails with a positioned [`ParseError`] rather than a
    /// low-level grammar failure.
    pub fn parse(&mut self, file_path: &str, text: &str) -> Result<ParseTree> {
        let tree = self.parser.parse(text, None).ok_or_else(|| {
            ParseError::file_level(file_path, "parser returned no tree (cancelled or timed out)")
        })?;

        let root = tree.root_node();
        if root.has_error() {
            let node = first_error_node(root);
            let pos = node.start_position();
            let what = if node.is_missing() {
                format!("missing {}", node.kind())
            } else {
                "syntax error".to_string()
            };
            return Err(ParseError::new(
                file_path,
                pos.row + 1,
                pos.column + 1,
                what,
            ));
        }

        Ok(ParseTree {
            tree,
            source: text.to_string(),
            file_path: file_path.to_string(),
            language: self.language,
        })
    }
}

/// Locate the first ERROR or missing node in document order
fn first_error_node(root: Node) -> Node {
    let mut best = root;
    let mut cursor = root.walk();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            best = node;
            break;
        }
        // Push children in reverse so the leftmost subtree is visited first
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children.into_iter().rev() {
            if child.has_error() {
                stack.push(child);
            }
        }
    }

    best
}
