//! Shared types used by every pass.
//!
//! `FileId` and `Span` identify where things live; `Page` is the unit the
//! external tokenizer hands over and the postprocessor hands back.

use crate::ast::Node;
use crate::diagnostics::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Source suffixes stripped when deriving a slug from a [`FileId`].
pub const KNOWN_SUFFIXES: &[&str] = &[".txt", ".rst"];

/// Column used when the tokenizer did not record one.
pub const END_OF_LINE: usize = 1000;

/// Project-root-relative path identifying a page.
///
/// Always uses forward slashes and never starts with `/` or `./`, so two
/// spellings of the same file compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FileId(String);

impl FileId {
    pub fn new(path: impl AsRef<str>) -> Self {
        let mut path = path.as_ref().replace('\\', "/");
        while let Some(rest) = path.strip_prefix("./") {
            path = rest.to_string();
        }
        Self(path.trim_start_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The slug: this path with one known source suffix removed.
    ///
    /// - `tutorial/install.txt` → `tutorial/install`
    /// - `images/logo.png` → `images/logo.png`
    pub fn without_known_suffix(&self) -> &str {
        KNOWN_SUFFIXES
            .iter()
            .find_map(|suffix| self.0.strip_suffix(suffix))
            .unwrap_or(&self.0)
    }

    /// Directory part of the path, empty for top-level files.
    pub fn parent_dir(&self) -> &str {
        self.0.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }
}

impl From<String> for FileId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<FileId> for String {
    fn from(id: FileId) -> Self {
        id.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A source position. Columns default to [`END_OF_LINE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub line: usize,
    #[serde(default = "end_of_line")]
    pub column: usize,
}

fn end_of_line() -> usize {
    END_OF_LINE
}

impl Span {
    pub fn line(line: usize) -> Self {
        Self {
            line,
            column: END_OF_LINE,
        }
    }

    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::line(0)
    }
}

/// Work deferred until every pass has finished with the page set.
///
/// The tokenizer attaches these (e.g. checksum an image once its final
/// path is known); the postprocessor drains them last.
pub trait PendingTask: fmt::Debug + Send {
    fn run(&mut self, ast: &mut Node, diagnostics: &mut Vec<Diagnostic>);
}

/// One source file after tokenizing.
#[derive(Debug, Serialize, Deserialize)]
pub struct Page {
    /// The page's `Root` node.
    pub ast: Node,
    /// Static assets referenced by the page, e.g. figures.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub static_assets: BTreeSet<String>,
    #[serde(skip)]
    pub pending_tasks: Vec<Box<dyn PendingTask>>,
    /// Set for pages synthesized from structured data files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_fields: Option<serde_json::Value>,
}

impl Page {
    pub fn new(ast: Node) -> Self {
        Self {
            ast,
            static_assets: BTreeSet::new(),
            pending_tasks: Vec::new(),
            category: None,
            query_fields: None,
        }
    }

    /// The file this page was tokenized from, taken from its root node.
    pub fn fileid(&self) -> Option<&FileId> {
        match &self.ast {
            Node::Root(root) => Some(&root.fileid),
            _ => None,
        }
    }
}
