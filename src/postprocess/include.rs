//! Include expansion.
//!
//! An `include` (or `sharedinclude`) directive gets a deep copy of the
//! included file's `Root` as its only child. The copy comes from a snapshot
//! taken before the pass, so every splice starts from the file as tokenized;
//! includes nested inside the copy are expanded when the walker reaches
//! them in the same pass.
//!
//! `start-after` and `end-before` narrow the copy to the top-level nodes
//! between two markers, inclusive. A marker is either a comment whose only
//! content is the marker text, or a `std:label` target carrying it as an id.

use crate::ast::{Node, text_of};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::types::FileId;
use crate::walker::{Context, Handler};
use std::collections::BTreeMap;

const INCLUDE_DIRECTIVES: &[&str] = &["include", "sharedinclude"];

pub(super) struct IncludeExpander<'s> {
    sources: &'s BTreeMap<FileId, Node>,
}

impl<'s> IncludeExpander<'s> {
    pub(super) fn new(sources: &'s BTreeMap<FileId, Node>) -> Self {
        Self { sources }
    }

    /// The page an include argument names: absolute first, then verbatim.
    fn resolve(&self, argument: &str) -> Option<(&FileId, &Node)> {
        let absolute = FileId::new(argument.trim_start_matches('/'));
        self.sources
            .get_key_value(&absolute)
            .or_else(|| self.sources.get_key_value(&FileId::new(argument)))
    }
}

impl Handler for IncludeExpander<'_> {
    fn enter_node(&mut self, cx: &mut Context<'_>, node: &mut Node) {
        let Node::Directive(directive) = node else {
            return;
        };
        if !INCLUDE_DIRECTIVES.contains(&directive.name.as_str()) {
            return;
        }

        let argument = text_of(&directive.argument).trim().to_string();
        let Some((fileid, source)) = self.resolve(&argument) else {
            cx.diagnose(Diagnostic::new(
                DiagnosticKind::CannotOpenFile { path: argument },
                directive.span,
            ));
            return;
        };
        if cx.fileids.contains(fileid) {
            cx.diagnose(Diagnostic::new(
                DiagnosticKind::CircularInclude {
                    path: fileid.to_string(),
                },
                directive.span,
            ));
            return;
        }

        let mut copy = source.clone();
        let start_after = directive.options.get("start-after");
        let end_before = directive.options.get("end-before");
        if (start_after.is_some() || end_before.is_some())
            && let Some(children) = copy.children_mut()
        {
            let bounds = Bounds {
                start_after: start_after.map(String::as_str),
                end_before: end_before.map(String::as_str),
                path: fileid.as_str(),
            };
            match bounds.apply(children) {
                Ok(()) => {}
                Err(kind) => cx.diagnose(Diagnostic::new(kind, directive.span)),
            }
        }
        directive.children = vec![copy];
    }
}

struct Bounds<'a> {
    start_after: Option<&'a str>,
    end_before: Option<&'a str>,
    path: &'a str,
}

impl Bounds<'_> {
    /// Narrow `children` in place. On error the children are left as they
    /// were, except for reversed bounds which keep nothing.
    fn apply(&self, children: &mut Vec<Node>) -> Result<(), DiagnosticKind> {
        let start = self.find("start-after", self.start_after, children)?;
        let end = self.find("end-before", self.end_before, children)?;

        let from = start.unwrap_or(0);
        let to = end.unwrap_or(children.len().saturating_sub(1));
        if let (Some(start_after), Some(end_before)) = (self.start_after, self.end_before)
            && from > to
        {
            children.clear();
            return Err(DiagnosticKind::IncludeBoundsReversed {
                start_after: start_after.to_string(),
                end_before: end_before.to_string(),
                path: self.path.to_string(),
            });
        }

        children.truncate(to + 1);
        children.drain(..from);
        Ok(())
    }

    fn find(
        &self,
        option: &str,
        marker: Option<&str>,
        children: &[Node],
    ) -> Result<Option<usize>, DiagnosticKind> {
        let Some(marker) = marker else {
            return Ok(None);
        };
        children
            .iter()
            .position(|child| contains_marker(child, marker))
            .map(Some)
            .ok_or_else(|| DiagnosticKind::IncludeMarkerNotFound {
                option: option.to_string(),
                marker: marker.to_string(),
                path: self.path.to_string(),
            })
    }
}

fn contains_marker(node: &Node, marker: &str) -> bool {
    let here = match node {
        Node::Comment(comment) => {
            matches!(comment.children.as_slice(), [Node::Text(t)] if t.value.trim() == marker)
        }
        Node::Target(target) if target.name == "label" => node
            .target_identifiers()
            .any(|ti| ti.ids.iter().any(|id| id == marker)),
        _ => false,
    };
    here || node
        .children()
        .into_iter()
        .flatten()
        .any(|child| contains_marker(child, marker))
}
