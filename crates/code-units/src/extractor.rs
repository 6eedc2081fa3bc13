use crate::language::Language;
use crate::parser::ParseTree;
use crate::types::{content_hash, unit_id, CodeUnit, UnitKind};
use tree_sitter::Node;

/// Walks a parse tree and emits code units in document order.
pub struct UnitExtractor;

impl UnitExtractor {
    /// Extract all units from one file's parse tree.
    ///
    /// Emits the module unit first, then top-level declarations in source
    /// order, with methods inside classes as separate units qualified
    /// `Class.method`. Anonymous declarations get a synthesized qualified
    /// name derived from their position so identifiers stay stable across
    /// re-parses of unchanged text.
    #[must_use]
    pub fn extract(tree: ParseTree) -> Vec<CodeUnit> {
        let root = tree.tree.root_node();
        let mut units = Vec::new();

        units.push(module_unit(&tree, root));

        match tree.language {
            Language::Python => extract_python(&tree, root, &mut units),
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                extract_js(&tree, root, &mut units);
            }
            Language::Unknown => {}
        }

        log::debug!(
            "Extracted {} units from {}",
            units.len(),
            tree.file_path
        );
        units
    }
}

/// Qualified name of the per-file module unit
pub(crate) const MODULE_QUALIFIED_NAME: &str = "<module>";

fn module_unit(tree: &ParseTree, root: Node) -> CodeUnit {
    let doc = match tree.language {
        Language::Python => python_module_docstring(tree, root),
        Language::JavaScript | Language::TypeScript | Language::Tsx => js_module_doc(tree),
        Language::Unknown => None,
    };

    let line_count = tree.source.lines().count().max(1);
    let source = tree.source.clone();
    CodeUnit {
        id: unit_id(&tree.file_path, MODULE_QUALIFIED_NAME),
        kind: UnitKind::Module,
        qualified_name: MODULE_QUALIFIED_NAME.to_string(),
        file_path: tree.file_path.clone(),
        start_line: 1,
        end_line: line_count,
        start_byte: 0,
        end_byte: tree.source.len(),
        doc,
        language: tree.language.as_str().to_string(),
        content_hash: content_hash(&source),
        source,
    }
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

fn extract_python(tree: &ParseTree, root: Node, units: &mut Vec<CodeUnit>) {
    let mut cursor = root.walk();
    let children: Vec<Node> = root.children(&mut cursor).collect();

    for child in children {
        let node = unwrap_decorated(child);
        match node.kind() {
            "function_definition" => {
                let name = identifier_name(tree, node);
                let qualified = name.unwrap_or_else(|| synthesized_name(tree, child));
                units.push(make_unit(
                    tree,
                    child,
                    UnitKind::Function,
                    qualified,
                    python_body_docstring(tree, node),
                ));
            }
            "class_definition" => {
                let class_name = identifier_name(tree, node)
                    .unwrap_or_else(|| synthesized_name(tree, child));
                units.push(make_unit(
                    tree,
                    child,
                    UnitKind::Class,
                    class_name.clone(),
                    python_body_docstring(tree, node),
                ));
                extract_python_methods(tree, node, &class_name, units);
            }
            "expression_statement" => {
                // Lambdas bound to names are still addressable units.
                if let Some((name, assign)) = python_lambda_assignment(tree, node) {
                    let qualified = name.unwrap_or_else(|| synthesized_name(tree, assign));
                    units.push(make_unit(tree, child, UnitKind::Function, qualified, None));
                }
            }
            _ => {}
        }
    }
}

fn extract_python_methods(
    tree: &ParseTree,
    class_node: Node,
    class_name: &str,
    units: &mut Vec<CodeUnit>,
) {
    let Some(body) = class_node.child_by_field_name("body") else {
        return;
    };

    let mut cursor = body.walk();
    let children: Vec<Node> = body.children(&mut cursor).collect();
    for child in children {
        let node = unwrap_decorated(child);
        if node.kind() != "function_definition" {
            continue;
        }

        let method_name = identifier_name(tree, node)
            .unwrap_or_else(|| synthesized_name(tree, child));
        let qualified = format!("{class_name}.{method_name}");
        units.push(make_unit(
            tree,
            child,
            UnitKind::Method,
            qualified,
            python_body_docstring(tree, node),
        ));
    }
}

/// Skip over a `decorated_definition` wrapper to the definition itself,
/// keeping the wrapper as the unit's span elsewhere.
fn unwrap_decorated(node: Node) -> Node {
    if node.kind() != "decorated_definition" {
        return node;
    }
    node.child_by_field_name("definition").unwrap_or(node)
}

/// `name = lambda ...:` at module level
fn python_lambda_assignment<'a>(
    tree: &ParseTree,
    stmt: Node<'a>,
) -> Option<(Option<String>, Node<'a>)> {
    let assign = stmt.child(0).filter(|n| n.kind() == "assignment")?;
    let right = assign.child_by_field_name("right")?;
    if right.kind() != "lambda" {
        return None;
    }

    let name = assign
        .child_by_field_name("left")
        .filter(|n| n.kind() == "identifier")
        .map(|n| node_text(tree, n).to_string());
    Some((name, assign))
}

/// First string expression of a definition body, unquoted
fn python_body_docstring(tree: &ParseTree, def_node: Node) -> Option<String> {
    let body = def_node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.child(0).filter(|n| n.kind() == "string")?;
    Some(strip_python_quotes(node_text(tree, string)))
}

fn python_module_docstring(tree: &ParseTree, root: Node) -> Option<String> {
    let first = root.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.child(0).filter(|n| n.kind() == "string")?;
    Some(strip_python_quotes(node_text(tree, string)))
}

fn strip_python_quotes(raw: &str) -> String {
    let trimmed = raw.trim();
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if trimmed.len() >= quote.len() * 2
            && trimmed.starts_with(quote)
            && trimmed.ends_with(quote)
        {
            return trimmed[quote.len()..trimmed.len() - quote.len()]
                .trim()
                .to_string();
        }
    }
    trimmed.to_string()
}

// ---------------------------------------------------------------------------
// JavaScript / TypeScript
// ---------------------------------------------------------------------------

fn extract_js(tree: &ParseTree, root: Node, units: &mut Vec<CodeUnit>) {
    let mut cursor = root.walk();
    let children: Vec<Node> = root.children(&mut cursor).collect();

    for child in children {
        extract_js_statement(tree, child, child, units);
    }
}

/// `span` is the node whose text the unit covers (the export statement when
/// the declaration is exported), `node` the declaration being inspected.
fn extract_js_statement(tree: &ParseTree, span: Node, node: Node, units: &mut Vec<CodeUnit>) {
    match node.kind() {
        "export_statement" => {
            if let Some(decl) = node.child_by_field_name("declaration") {
                extract_js_statement(tree, span, decl, units);
            }
        }
        "function_declaration" | "generator_function_declaration" => {
            let name = identifier_name(tree, node);
            let qualified = name.unwrap_or_else(|| synthesized_name(tree, span));
            let doc = leading_comment(tree, span.start_position().row);
            units.push(make_unit(tree, span, UnitKind::Function, qualified, doc));
        }
        "class_declaration" | "abstract_class_declaration" => {
            let class_name = class_name_js(tree, node)
                .unwrap_or_else(|| synthesized_name(tree, span));
            let doc = leading_comment(tree, span.start_position().row);
            units.push(make_unit(
                tree,
                span,
                UnitKind::Class,
                class_name.clone(),
                doc,
            ));
            extract_js_methods(tree, node, &class_name, units);
        }
        "lexical_declaration" | "variable_declaration" => {
            extract_js_declarators(tree, span, node, units);
        }
        _ => {}
    }
}

fn class_name_js(tree: &ParseTree, class_node: Node) -> Option<String> {
    class_node
        .child_by_field_name("name")
        .map(|n| node_text(tree, n).to_string())
}

fn extract_js_methods(
    tree: &ParseTree,
    class_node: Node,
    class_name: &str,
    units: &mut Vec<CodeUnit>,
) {
    let Some(body) = class_node.child_by_field_name("body") else {
        return;
    };

    let mut cursor = body.walk();
    let children: Vec<Node> = body.children(&mut cursor).collect();
    for child in children {
        if child.kind() != "method_definition" {
            continue;
        }

        let method_name = child
            .child_by_field_name("name")
            .map(|n| node_text(tree, n).to_string())
            .unwrap_or_else(|| synthesized_name(tree, child));
        let qualified = format!("{class_name}.{method_name}");
        let doc = leading_comment(tree, child.start_position().row);
        units.push(make_unit(tree, child, UnitKind::Method, qualified, doc));
    }
}

/// `const f = () => ...` and `var g = function() {...}` bindings
fn extract_js_declarators(tree: &ParseTree, span: Node, decl: Node, units: &mut Vec<CodeUnit>) {
    let mut cursor = decl.walk();
    let declarators: Vec<Node> = decl
        .children(&mut cursor)
        .filter(|n| n.kind() == "variable_declarator")
        .collect();

    for declarator in declarators {
        let Some(value) = declarator.child_by_field_name("value") else {
            continue;
        };

        if is_function_node(value) {
            // Bindings without a plain identifier fall back to a
            // position-derived name; stable as long as the text is unchanged.
            let qualified = declarator
                .child_by_field_name("name")
                .filter(|n| n.kind() == "identifier")
                .map(|n| node_text(tree, n).to_string())
                .unwrap_or_else(|| synthesized_name(tree, value));

            let doc = leading_comment(tree, span.start_position().row);
            units.push(make_unit(tree, span, UnitKind::Function, qualified, doc));
            continue;
        }

        // Destructuring initializers (`const [a, b] = [() => .., () => ..]`,
        // `const { run } = { run: () => .. }`) carry the functions inside an
        // array or object literal; each gets a positional name.
        let mut functions = Vec::new();
        collect_literal_functions(value, &mut functions);
        for func in functions {
            let qualified = synthesized_name(tree, func);
            units.push(make_unit(tree, func, UnitKind::Function, qualified, None));
        }
    }
}

fn is_function_node(node: Node) -> bool {
    matches!(
        node.kind(),
        "arrow_function" | "function_expression" | "generator_function"
    )
}

/// Function nodes directly inside array/object literal initializers,
/// in document order. Does not descend into call expressions, so inline
/// callbacks are not promoted to units.
fn collect_literal_functions<'a>(node: Node<'a>, out: &mut Vec<Node<'a>>) {
    if is_function_node(node) {
        out.push(node);
        return;
    }
    if !matches!(
        node.kind(),
        "array" | "object" | "pair" | "parenthesized_expression"
    ) {
        return;
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        collect_literal_functions(child, out);
    }
}

/// Comment block at the very top of a JS/TS file, used as the module doc
fn js_module_doc(tree: &ParseTree) -> Option<String> {
    let mut doc_lines = Vec::new();
    for line in tree.source.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        let is_doc = trimmed.starts_with("//")
            || trimmed.starts_with("/*")
            || trimmed.starts_with('*')
            || trimmed.ends_with("*/");
        if !is_doc {
            break;
        }
        doc_lines.push(trimmed);
    }

    if doc_lines.is_empty() {
        return None;
    }
    Some(doc_lines.join("\n"))
}

/// Leading `//` / `/* ... */` comment block immediately above a node.
/// Text-based like the chunker's doc recovery: Tree-sitter keeps comments
/// out of the named tree.
fn leading_comment(tree: &ParseTree, start_row: usize) -> Option<String> {
    let lines: Vec<&str> = tree.source.lines().collect();
    if start_row == 0 || start_row > lines.len() {
        return None;
    }

    let mut doc_lines = Vec::new();
    let mut idx = start_row;
    while idx > 0 {
        idx -= 1;
        let line = lines[idx].trim();
        let is_doc = line.starts_with("//")
            || line.starts_with("/*")
            || line.starts_with('*')
            || line.ends_with("*/");
        if is_doc {
            doc_lines.push(line);
        } else {
            break;
        }
    }

    if doc_lines.is_empty() {
        return None;
    }
    doc_lines.reverse();
    Some(doc_lines.join("\n"))
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn make_unit(
    tree: &ParseTree,
    node: Node,
    kind: UnitKind,
    qualified_name: String,
    doc: Option<String>,
) -> CodeUnit {
    let start_byte = node.start_byte();
    let end_byte = node.end_byte();
    let source = tree.source[start_byte..end_byte].to_string();

    CodeUnit {
        id: unit_id(&tree.file_path, &qualified_name),
        kind,
        qualified_name,
        file_path: tree.file_path.clone(),
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        start_byte,
        end_byte,
        doc,
        language: tree.language.as_str().to_string(),
        content_hash: content_hash(&source),
        source,
    }
}

fn identifier_name(tree: &ParseTree, node: Node) -> Option<String> {
    node.child_by_field_name("name")
        .map(|name| node_text(tree, name).to_string())
}

/// Positional name for declarations without one: `<file>:<line>:<col>`
fn synthesized_name(tree: &ParseTree, node: Node) -> String {
    let pos = node.start_position();
    format!("{}:{}:{}", tree.file_path, pos.row + 1, pos.column + 1)
}

fn node_text<'a>(tree: &'a ParseTree, node: Node) -> &'a str {
    &tree.source[node.start_byte()..node.end_byte()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SourceParser;
    use pretty_assertions::assert_eq;

    fn python_units(path: &str, code: &str) -> Vec<CodeUnit> {
        let mut parser = SourceParser::for_language(Language::Python).unwrap();
        UnitExtractor::extract(parser.parse(path, code).unwrap())
    }

    fn js_units(path: &str, code: &str) -> Vec<CodeUnit> {
        let mut parser = SourceParser::for_language(Language::from_path(path)).unwrap();
        UnitExtractor::extract(parser.parse(path, code).unwrap())
    }

    const PY_SAMPLE: &str = r#""""Metrics helpers."""

def f(x):
    """Compute metrics."""
    return x * 2

class Collector:
    """Collects samples."""

    def add(self, value):
        """Add one sample."""
        self.values.append(value)

    def total(self):
        return sum(self.values)

g = lambda x: x + 1
"#;

    #[test]
    fn python_extraction_is_complete_and_ordered() {
        let units = python_units("metrics.py", PY_SAMPLE);
        let names: Vec<&str> = units.iter().map(|u| u.qualified_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "<module>",
                "f",
                "Collector",
                "Collector.add",
                "Collector.total",
                "g"
            ]
        );
    }

    #[test]
    fn python_kinds_and_docs() {
        let units = python_units("metrics.py", PY_SAMPLE);

        let module = &units[0];
        assert_eq!(module.kind, UnitKind::Module);
        assert_eq!(module.doc.as_deref(), Some("Metrics helpers."));

        let f = units.iter().find(|u| u.qualified_name == "f").unwrap();
        assert_eq!(f.kind, UnitKind::Function);
        assert_eq!(f.doc.as_deref(), Some("Compute metrics."));
        assert!(f.source.starts_with("def f"));

        let add = units
            .iter()
            .find(|u| u.qualified_name == "Collector.add")
            .unwrap();
        assert_eq!(add.kind, UnitKind::Method);
        assert_eq!(add.enclosing_scope(), Some("Collector"));
        assert_eq!(add.doc.as_deref(), Some("Add one sample."));

        let total = units
            .iter()
            .find(|u| u.qualified_name == "Collector.total")
            .unwrap();
        assert_eq!(total.doc, None);
    }

    #[test]
    fn python_decorated_definitions_are_units() {
        let code = "@wraps(f)\ndef wrapped():\n    pass\n";
        let units = python_units("deco.py", code);
        let wrapped = units
            .iter()
            .find(|u| u.qualified_name == "wrapped")
            .unwrap();
        // Span covers the decorator too
        assert!(wrapped.source.starts_with("@wraps"));
    }

    #[test]
    fn identifiers_stable_across_reparses() {
        let first = python_units("metrics.py", PY_SAMPLE);
        let second = python_units("metrics.py", PY_SAMPLE);
        let first_ids: Vec<&str> = first.iter().map(|u| u.id.as_str()).collect();
        let second_ids: Vec<&str> = second.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn content_hash_changes_only_for_edited_unit() {
        let edited = PY_SAMPLE.replace("return x * 2", "return x * 3");
        let before = python_units("metrics.py", PY_SAMPLE);
        let after = python_units("metrics.py", &edited);

        for (a, b) in before.iter().zip(after.iter()) {
            assert_eq!(a.id, b.id);
            // Module unit covers the whole file, so its hash moves with any
            // edit; below module level only `f` changed.
            if a.qualified_name == "f" || a.kind == UnitKind::Module {
                assert_ne!(a.content_hash, b.content_hash);
            } else {
                assert_eq!(a.content_hash, b.content_hash);
            }
        }
    }

    const JS_SAMPLE: &str = r#"// Session utilities.

/** Create a session token. */
function makeToken(user) {
  return `${user.id}:${Date.now()}`;
}

class Session {
  /** Refresh the expiry window. */
  refresh() {
    this.expiry = Date.now() + TTL;
  }
}

const validate = (token) => token.includes(":");

export function revoke(token) {
  store.delete(token);
}
"#;

    #[test]
    fn javascript_extraction_covers_declaration_forms() {
        let units = js_units("session.js", JS_SAMPLE);
        let names: Vec<&str> = units.iter().map(|u| u.qualified_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "<module>",
                "makeToken",
                "Session",
                "Session.refresh",
                "validate",
                "revoke"
            ]
        );

        assert_eq!(units[0].doc.as_deref(), Some("// Session utilities."));

        let make_token = units
            .iter()
            .find(|u| u.qualified_name == "makeToken")
            .unwrap();
        assert_eq!(
            make_token.doc.as_deref(),
            Some("/** Create a session token. */")
        );

        let refresh = units
            .iter()
            .find(|u| u.qualified_name == "Session.refresh")
            .unwrap();
        assert_eq!(refresh.kind, UnitKind::Method);

        let validate = units
            .iter()
            .find(|u| u.qualified_name == "validate")
            .unwrap();
        assert_eq!(validate.kind, UnitKind::Function);
    }

    #[test]
    fn anonymous_bindings_get_positional_names() {
        let code = "const [a, b] = [() => 1, () => 2];\nconst { run } = { run: () => 3 };\n";
        let mut parser = SourceParser::for_language(Language::JavaScript).unwrap();
        let units = UnitExtractor::extract(parser.parse("anon.js", code).unwrap());

        let synthesized: Vec<&CodeUnit> = units
            .iter()
            .filter(|u| u.qualified_name.starts_with("anon.js:"))
            .collect();
        // Two from the array pattern, one from the object pattern
        assert_eq!(synthesized.len(), 3);
        for unit in &synthesized {
            assert_eq!(unit.kind, UnitKind::Function);
            assert!(unit.source.contains("=>"));
        }

        // Re-parse of unchanged text keeps the synthesized names
        let mut parser = SourceParser::for_language(Language::JavaScript).unwrap();
        let again = UnitExtractor::extract(parser.parse("anon.js", code).unwrap());
        let again_names: Vec<&str> = again.iter().map(|u| u.qualified_name.as_str()).collect();
        let names: Vec<&str> = units.iter().map(|u| u.qualified_name.as_str()).collect();
        assert_eq!(names, again_names);
    }

    #[test]
    fn typescript_classes_and_functions() {
        let code = r#"
export class Store<T> {
  get(key: string): T | undefined {
    return this.map.get(key);
  }
}

export function openStore(): Store<number> {
  return new Store();
}
"#;
        let units = js_units("store.ts", code);
        assert!(units
            .iter()
            .any(|u| u.qualified_name == "Store" && u.kind == UnitKind::Class));
        assert!(units
            .iter()
            .any(|u| u.qualified_name == "Store.get" && u.kind == UnitKind::Method));
        assert!(units
            .iter()
            .any(|u| u.qualified_name == "openStore" && u.kind == UnitKind::Function));
        assert!(units.iter().all(|u| u.language == "typescript"));
    }

    #[test]
    fn tsx_components_with_jsx_markup_parse() {
        let code = r#"export function App() {
  return <div className="app">hi</div>;
}

const Banner = () => <span>!</span>;
"#;
        let units = js_units("App.tsx", code);
        assert!(units
            .iter()
            .any(|u| u.qualified_name == "App" && u.kind == UnitKind::Function));
        assert!(units.iter().any(|u| u.qualified_name == "Banner"));
        assert!(units.iter().all(|u| u.language == "typescript"));
    }

    #[test]
    fn byte_ranges_slice_the_original_source() {
        let units = python_units("metrics.py", PY_SAMPLE);
        for unit in &units {
            assert_eq!(&PY_SAMPLE[unit.start_byte..unit.end_byte], unit.source);
        }
    }
}
