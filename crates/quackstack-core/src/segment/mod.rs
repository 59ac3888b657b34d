//! Source segmentation: splits a file's text into retrievable [`Segment`]s.
//!
//! Structured languages go through a [`StructureParser`] looked up by file
//! extension in a [`ParserRegistry`]. The parser reports a [`ParseOutcome`],
//! and [`Segmenter::segment`] is the single place that decides whether to
//! keep the structured segments or fall back to fixed line windows.
//!
//! # Algorithm
//!
//! 1. Look up a parser for the file extension.
//! 2. `Structured(segments)` with at least one segment: return them. These
//!    may overlap (a function declared inside another function).
//! 3. `Structured([])`, `Unsupported`, or `Failed(_)`: split the text into
//!    consecutive, non-overlapping windows of `window_lines` lines.
//! 4. Empty text yields no segments.
//!
//! # Example
//!
//! ```rust
//! use quackstack_core::segment::Segmenter;
//!
//! let segmenter = Segmenter::new(50);
//! let segments = segmenter.segment("function foo() {\n  return 1;\n}\n", "src/a.ts");
//! assert_eq!(segments.len(), 1);
//! assert_eq!(segments[0].function_name.as_deref(), Some("foo"));
//! ```

pub mod syntax;

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Segment;

pub use self::syntax::{SourceLanguage, TreeSitterParser};

/// Default fixed-window size in lines.
pub const DEFAULT_WINDOW_LINES: usize = 50;

/// Why a structure-aware parse was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("grammar could not be loaded: {0}")]
    Grammar(String),
    #[error("parser produced no syntax tree")]
    NoTree,
    #[error("syntax error near line {line}")]
    Syntax { line: usize },
}

/// Result of a structure-aware parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Declarations found in the source, in document order.
    Structured(Vec<Segment>),
    /// The parser does not handle this input.
    Unsupported,
    /// The input could not be parsed.
    Failed(ParseFailure),
}

/// A structure-aware parser for one language.
///
/// New languages are added by implementing this trait and registering the
/// implementation, not by extending [`Segmenter`].
pub trait StructureParser: Send + Sync {
    /// Language identifier, e.g. `"typescript"`.
    fn language(&self) -> &str;
    /// File extensions (without the dot) this parser claims.
    fn extensions(&self) -> &[&'static str];
    /// Parse `text` into declaration segments.
    fn parse(&self, text: &str) -> ParseOutcome;
}

/// Parsers keyed by file extension.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn StructureParser>>,
    by_extension: HashMap<String, usize>,
}

impl ParserRegistry {
    /// A registry with no parsers: every file is windowed.
    pub fn empty() -> Self {
        Self {
            parsers: Vec::new(),
            by_extension: HashMap::new(),
        }
    }

    /// TypeScript, TSX, JavaScript, and Python via tree-sitter.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for language in SourceLanguage::ALL {
            registry.register(Box::new(TreeSitterParser::new(language)));
        }
        registry
    }

    /// Register a parser. Later registrations win for shared extensions.
    pub fn register(&mut self, parser: Box<dyn StructureParser>) {
        let slot = self.parsers.len();
        for ext in parser.extensions() {
            self.by_extension.insert(ext.to_ascii_lowercase(), slot);
        }
        self.parsers.push(parser);
    }

    /// Parser for `extension` (without the dot), case-insensitive.
    pub fn for_extension(&self, extension: &str) -> Option<&dyn StructureParser> {
        self.by_extension
            .get(&extension.to_ascii_lowercase())
            .map(|&i| self.parsers[i].as_ref())
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Splits files into segments, choosing between structured parsing and
/// fixed windows.
pub struct Segmenter {
    registry: ParserRegistry,
    window_lines: usize,
}

impl Segmenter {
    /// Segmenter with the default parser registry.
    ///
    /// A `window_lines` of zero is treated as one.
    pub fn new(window_lines: usize) -> Self {
        Self::with_registry(ParserRegistry::with_defaults(), window_lines)
    }

    pub fn with_registry(registry: ParserRegistry, window_lines: usize) -> Self {
        Self {
            registry,
            window_lines: window_lines.max(1),
        }
    }

    /// Segment `text`, using `file_path` only to pick a parser.
    ///
    /// Never fails: parse problems are logged and the file is windowed.
    pub fn segment(&self, text: &str, file_path: &str) -> Vec<Segment> {
        if text.is_empty() {
            return Vec::new();
        }

        let parser = Path::new(file_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.registry.for_extension(ext));

        let language = parser.map_or("none", |p| p.language());
        let outcome = match parser {
            Some(parser) => parser.parse(text),
            None => ParseOutcome::Unsupported,
        };

        match outcome {
            ParseOutcome::Structured(segments) if !segments.is_empty() => segments,
            ParseOutcome::Structured(_) => {
                debug!(file = file_path, language, "no declarations found, using line windows");
                window_segments(text, self.window_lines)
            }
            ParseOutcome::Unsupported => window_segments(text, self.window_lines),
            ParseOutcome::Failed(reason) => {
                warn!(file = file_path, language, %reason, "structured parse failed, using line windows");
                window_segments(text, self.window_lines)
            }
        }
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_LINES)
    }
}

/// Split `text` into consecutive windows of `window_lines` lines.
///
/// Lines are `\n`-terminated; a final newline does not start a new line.
/// Each window's content is the exact byte range of its lines, including
/// their newlines, so concatenating the windows reproduces `text`. Line
/// numbers are 1-based and inclusive.
pub fn window_segments(text: &str, window_lines: usize) -> Vec<Segment> {
    if text.is_empty() {
        return Vec::new();
    }
    let window_lines = window_lines.max(1);

    let mut line_starts = vec![0usize];
    for (i, byte) in text.bytes().enumerate() {
        if byte == b'\n' && i + 1 < text.len() {
            line_starts.push(i + 1);
        }
    }
    let total_lines = line_starts.len();

    let mut segments = Vec::with_capacity(total_lines.div_ceil(window_lines));
    let mut first = 0;
    while first < total_lines {
        let last = (first + window_lines).min(total_lines);
        let begin = line_starts[first];
        let end = if last < total_lines {
            line_starts[last]
        } else {
            text.len()
        };
        segments.push(Segment {
            content: text[begin..end].to_string(),
            function_name: None,
            line_start: Some(first + 1),
            line_end: Some(last),
        });
        first = last;
    }
    segments
}
