//! Tree-sitter backed [`StructureParser`] implementations.
//!
//! Emits one segment per function declaration, class declaration, and
//! variable declaration bound to a function or closure, at any nesting
//! depth. Nested declarations therefore overlap their enclosing one.

use tree_sitter::{Language, Node, Parser};

use super::{ParseFailure, ParseOutcome, StructureParser};
use crate::models::Segment;

/// Node kinds that count as a function or closure value.
const FUNCTION_VALUE_KINDS: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

/// Languages with a tree-sitter grammar bundled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    TypeScript,
    Tsx,
    JavaScript,
    Python,
}

impl SourceLanguage {
    pub const ALL: [SourceLanguage; 4] = [
        SourceLanguage::TypeScript,
        SourceLanguage::Tsx,
        SourceLanguage::JavaScript,
        SourceLanguage::Python,
    ];

    pub fn grammar(&self) -> Language {
        match self {
            SourceLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SourceLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            SourceLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            SourceLanguage::Python => tree_sitter_python::LANGUAGE.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SourceLanguage::TypeScript => "typescript",
            SourceLanguage::Tsx => "tsx",
            SourceLanguage::JavaScript => "javascript",
            SourceLanguage::Python => "python",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            SourceLanguage::TypeScript => &["ts", "mts", "cts"],
            SourceLanguage::Tsx => &["tsx"],
            SourceLanguage::JavaScript => &["js", "jsx", "mjs", "cjs"],
            SourceLanguage::Python => &["py", "pyw"],
        }
    }

    /// `Some(name)` when `node` is a declaration worth its own segment.
    fn declaration_name(&self, node: Node, source: &str) -> Option<Option<String>> {
        match self {
            SourceLanguage::Python => python_declaration(node, source),
            _ => ecmascript_declaration(node, source),
        }
    }
}

/// Structure-aware parser for one [`SourceLanguage`].
pub struct TreeSitterParser {
    language: SourceLanguage,
}

impl TreeSitterParser {
    pub fn new(language: SourceLanguage) -> Self {
        Self { language }
    }
}

impl StructureParser for TreeSitterParser {
    fn language(&self) -> &str {
        self.language.name()
    }

    fn extensions(&self) -> &[&'static str] {
        self.language.extensions()
    }

    fn parse(&self, text: &str) -> ParseOutcome {
        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(&self.language.grammar()) {
            return ParseOutcome::Failed(ParseFailure::Grammar(e.to_string()));
        }
        let Some(tree) = parser.parse(text, None) else {
            return ParseOutcome::Failed(ParseFailure::NoTree);
        };

        let root = tree.root_node();
        if root.has_error() {
            return ParseOutcome::Failed(ParseFailure::Syntax {
                line: first_error_line(root),
            });
        }

        let mut segments = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if let Some(name) = self.language.declaration_name(node, text) {
                if let Some(content) = text.get(node.byte_range()) {
                    segments.push(Segment {
                        content: content.to_string(),
                        function_name: name,
                        line_start: Some(node.start_position().row + 1),
                        line_end: Some(node.end_position().row + 1),
                    });
                }
            }
            let mut cursor = node.walk();
            let children: Vec<Node> = node.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }

        ParseOutcome::Structured(segments)
    }
}

fn ecmascript_declaration(node: Node, source: &str) -> Option<Option<String>> {
    match node.kind() {
        "function_declaration"
        | "generator_function_declaration"
        | "class_declaration"
        | "abstract_class_declaration" => Some(field_text(node, "name", source)),
        // `export default class {}` / `export default function () {}`
        "class" | "function_expression" | "function"
            if node.parent().is_some_and(|p| p.kind() == "export_statement") =>
        {
            Some(field_text(node, "name", source))
        }
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            let declarators: Vec<Node> = node.named_children(&mut cursor).collect();
            declarators
                .into_iter()
                .filter(|d| d.kind() == "variable_declarator")
                .find(|d| {
                    d.child_by_field_name("value")
                        .is_some_and(|v| FUNCTION_VALUE_KINDS.contains(&v.kind()))
                })
                .map(|d| identifier_field(d, "name", source))
        }
        _ => None,
    }
}

fn python_declaration(node: Node, source: &str) -> Option<Option<String>> {
    match node.kind() {
        "function_definition" | "class_definition" => Some(field_text(node, "name", source)),
        "expression_statement" => {
            let assignment = node.named_child(0).filter(|c| c.kind() == "assignment")?;
            let right = assignment.child_by_field_name("right")?;
            if right.kind() != "lambda" {
                return None;
            }
            Some(identifier_field(assignment, "left", source))
        }
        _ => None,
    }
}

fn field_text(node: Node, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
        .map(str::to_string)
}

/// Field text, only when the field is a plain identifier (not a pattern).
fn identifier_field(node: Node, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .filter(|n| n.kind() == "identifier")
        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
        .map(str::to_string)
}

/// 1-based line of the first error or missing node under `node`.
fn first_error_line(node: Node) -> usize {
    let mut current = node;
    loop {
        let mut cursor = current.walk();
        let next = current
            .children(&mut cursor)
            .find(|c| c.is_error() || c.is_missing() || c.has_error());
        match next {
            Some(child) if child.is_error() || child.is_missing() => {
                return child.start_position().row + 1
            }
            Some(child) => current = child,
            None => return current.start_position().row + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(language: SourceLanguage, text: &str) -> Vec<Segment> {
        match TreeSitterParser::new(language).parse(text) {
            ParseOutcome::Structured(segments) => segments,
            other => panic!("expected structured outcome, got {:?}", other),
        }
    }

    fn names(segments: &[Segment]) -> Vec<Option<&str>> {
        segments.iter().map(|s| s.function_name.as_deref()).collect()
    }

    #[test]
    fn test_typescript_declarations() {
        let text = "\
import { db } from './db';

export function loadUser(id: string) {
  return db.find(id);
}

class UserCache {
  get(id: string) { return null; }
}

const normalize = (name: string) => name.trim();
let counter = 0;
";
        let segments = parse(SourceLanguage::TypeScript, text);
        assert_eq!(
            names(&segments),
            vec![Some("loadUser"), Some("UserCache"), Some("normalize")]
        );

        assert_eq!(segments[0].line_start, Some(3));
        assert_eq!(segments[0].line_end, Some(5));
        assert!(segments[0].content.starts_with("function loadUser"));
        assert!(text.contains(&segments[0].content));

        assert_eq!(segments[2].content, "const normalize = (name: string) => name.trim();");
        assert_eq!(segments[2].line_start, Some(11));
    }

    #[test]
    fn test_nested_declarations_overlap() {
        let text = "function outer() {\n  function inner() {}\n  return inner;\n}\n";
        let segments = parse(SourceLanguage::JavaScript, text);
        assert_eq!(names(&segments), vec![Some("outer"), Some("inner")]);
        assert_eq!(segments[1].line_start, Some(2));
        assert!(segments[0].content.contains(&segments[1].content));
    }

    #[test]
    fn test_anonymous_default_exports_have_no_name() {
        let text = "export default function () {\n  return 1;\n}\n";
        let segments = parse(SourceLanguage::JavaScript, text);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].function_name.is_none());
    }

    #[test]
    fn test_function_expression_binding() {
        let text = "var handler = function (req, res) { res.end(); };\n";
        let segments = parse(SourceLanguage::JavaScript, text);
        assert_eq!(names(&segments), vec![Some("handler")]);
    }

    #[test]
    fn test_destructured_closure_binding_is_unnamed() {
        let text = "const { run } = { run: () => 1 };\nconst [first] = [() => 2];\n";
        let segments = parse(SourceLanguage::JavaScript, text);
        assert!(segments.is_empty());
    }

    #[test]
    fn test_tsx_component() {
        let text = "export const Button = () => <button>ok</button>;\n";
        let segments = parse(SourceLanguage::Tsx, text);
        assert_eq!(names(&segments), vec![Some("Button")]);
    }

    #[test]
    fn test_python_definitions() {
        let text = "\
import os

class Loader:
    def load(self, path):
        return open(path).read()

square = lambda x: x * x
";
        let segments = parse(SourceLanguage::Python, text);
        assert_eq!(names(&segments), vec![Some("Loader"), Some("load"), Some("square")]);
        assert_eq!(segments[0].line_start, Some(3));
        assert_eq!(segments[0].line_end, Some(5));
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let outcome = TreeSitterParser::new(SourceLanguage::TypeScript)
            .parse("const ok = 1;\nfunction ( {\n");
        match outcome {
            ParseOutcome::Failed(ParseFailure::Syntax { line }) => assert!(line >= 1),
            other => panic!("expected syntax failure, got {:?}", other),
        }
    }
}
