//! Shared test utilities for the docforest test suite.
//!
//! Node builders keep test ASTs readable; lookup helpers panic with the
//! available alternatives when something is missing, so a failing assertion
//! says what *was* there.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let pages = pages_of(vec![
//!     ("index.txt", vec![heading("Home", vec![text("Home")])]),
//!     ("a.txt", vec![paragraph(vec![ref_role("std", "doc", "/index")])]),
//! ]);
//! let result = postprocess(pages);
//! assert!(diagnostic_kinds(&result.diagnostics, "a.txt").is_empty());
//! ```

use std::collections::BTreeMap;

use crate::ast::{
    DefinitionListItem, Directive, Heading, Leaf, Node, Parent, RefRole, Root, Substitution,
    Target, TargetIdentifier, Text, TocTreeDirective, TocTreeEntry, TocTarget,
};
use crate::config::ProjectConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::postprocess::{PostprocessResult, Postprocessor};
use crate::targets::TargetDatabase;
use crate::types::{FileId, Page, Span};

// =========================================================================
// Node builders
// =========================================================================

pub fn text(value: &str) -> Node {
    Node::Text(Text {
        span: Span::line(1),
        value: value.to_string(),
    })
}

fn parent(children: Vec<Node>) -> Parent {
    Parent {
        span: Span::line(1),
        children,
    }
}

pub fn paragraph(children: Vec<Node>) -> Node {
    Node::Paragraph(parent(children))
}

pub fn section(children: Vec<Node>) -> Node {
    Node::Section(parent(children))
}

pub fn emphasis(children: Vec<Node>) -> Node {
    Node::Emphasis(parent(children))
}

pub fn literal(children: Vec<Node>) -> Node {
    Node::Literal(parent(children))
}

pub fn comment(value: &str) -> Node {
    Node::Comment(parent(vec![text(value)]))
}

pub fn transition() -> Node {
    Node::Transition(Leaf {
        span: Span::line(1),
    })
}

pub fn definition_item(term: Vec<Node>, children: Vec<Node>) -> Node {
    Node::DefinitionListItem(DefinitionListItem {
        span: Span::line(1),
        term,
        children,
    })
}

/// A heading with an explicit id. Pass `""` to let the indexer derive one.
pub fn heading(id: &str, children: Vec<Node>) -> Node {
    Node::Heading(Heading {
        span: Span::line(1),
        id: id.to_string(),
        children,
    })
}

pub fn root(fileid: &str, children: Vec<Node>) -> Node {
    Node::Root(Root {
        span: Span::line(0),
        fileid: FileId::new(fileid),
        options: BTreeMap::new(),
        children,
    })
}

pub fn directive(name: &str, children: Vec<Node>) -> Node {
    directive_with(name, vec![], &[], children)
}

pub fn directive_with(
    name: &str,
    argument: Vec<Node>,
    options: &[(&str, &str)],
    children: Vec<Node>,
) -> Node {
    Node::Directive(Directive {
        span: Span::line(1),
        domain: String::new(),
        name: name.to_string(),
        argument,
        options: options
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        children,
    })
}

pub fn include(path: &str, options: &[(&str, &str)]) -> Node {
    directive_with("include", vec![text(path)], options, vec![])
}

/// A `tabs` directive in `tabset` whose children are `tab` directives.
pub fn tabs(tabset: &str, tabids: &[&str]) -> Node {
    let children = tabids
        .iter()
        .map(|id| {
            directive_with(
                "tab",
                vec![text(&id.to_uppercase())],
                &[("tabid", id)],
                vec![paragraph(vec![text("body")])],
            )
        })
        .collect();
    directive_with("tabs", vec![], &[("tabset", tabset)], children)
}

pub fn toctree(slugs: &[&str]) -> Node {
    Node::TocTreeDirective(TocTreeDirective {
        span: Span::line(1),
        domain: String::new(),
        name: "toctree".to_string(),
        argument: vec![],
        options: BTreeMap::new(),
        entries: slugs
            .iter()
            .map(|slug| TocTreeEntry {
                title: None,
                target: TocTarget::Slug(slug.to_string()),
            })
            .collect(),
        children: vec![],
    })
}

pub fn target_identifier(ids: &[&str], children: Vec<Node>) -> Node {
    Node::TargetIdentifier(TargetIdentifier {
        span: Span::line(1),
        ids: ids.iter().map(|s| s.to_string()).collect(),
        children,
    })
}

/// A target with one identifier carrying `ids` and the given title.
pub fn target(domain: &str, name: &str, ids: &[&str], title: Vec<Node>) -> Node {
    Node::Target(Target {
        span: Span::line(1),
        domain: domain.to_string(),
        name: name.to_string(),
        refuri: None,
        html_id: None,
        children: vec![target_identifier(ids, title)],
    })
}

pub fn label(id: &str, title: &str) -> Node {
    target("std", "label", &[id], vec![text(title)])
}

pub fn substitution_def(name: &str, children: Vec<Node>) -> Node {
    Node::SubstitutionDefinition(Substitution {
        span: Span::line(1),
        name: name.to_string(),
        children,
    })
}

pub fn substitution_ref(name: &str) -> Node {
    Node::SubstitutionReference(Substitution {
        span: Span::line(1),
        name: name.to_string(),
        children: vec![],
    })
}

pub fn ref_role(domain: &str, name: &str, target: &str) -> Node {
    ref_role_with_children(domain, name, target, vec![])
}

pub fn ref_role_with_children(
    domain: &str,
    name: &str,
    target: &str,
    children: Vec<Node>,
) -> Node {
    Node::RefRole(RefRole {
        span: Span::line(5),
        domain: domain.to_string(),
        name: name.to_string(),
        target: target.to_string(),
        flag: String::new(),
        resolution: None,
        children,
    })
}

// =========================================================================
// Page sets
// =========================================================================

pub fn page(fileid: &str, children: Vec<Node>) -> Page {
    Page::new(root(fileid, children))
}

pub fn pages_of(pages: Vec<(&str, Vec<Node>)>) -> BTreeMap<FileId, Page> {
    pages
        .into_iter()
        .map(|(fileid, children)| (FileId::new(fileid), page(fileid, children)))
        .collect()
}

/// Run the full postprocessor with stock config and no inventories.
pub fn postprocess(pages: BTreeMap<FileId, Page>) -> PostprocessResult {
    postprocess_with(&ProjectConfig::default(), pages)
}

pub fn postprocess_with(
    config: &ProjectConfig,
    pages: BTreeMap<FileId, Page>,
) -> PostprocessResult {
    Postprocessor::new(config, TargetDatabase::new(config.role_prefixes.clone())).run(pages)
}

// =========================================================================
// Lookups: panic with a clear message on miss
// =========================================================================

/// The AST of a page. Panics if the page is not present.
pub fn ast_of<'a>(pages: &'a BTreeMap<FileId, Page>, fileid: &str) -> &'a Node {
    pages
        .get(&FileId::new(fileid))
        .map(|p| &p.ast)
        .unwrap_or_else(|| {
            let ids: Vec<&str> = pages.keys().map(FileId::as_str).collect();
            panic!("page '{fileid}' not found. Available: {ids:?}")
        })
}

/// Diagnostics recorded for a file; empty if none.
pub fn diagnostics_for<'a>(
    diagnostics: &'a BTreeMap<FileId, Vec<Diagnostic>>,
    fileid: &str,
) -> &'a [Diagnostic] {
    diagnostics
        .get(&FileId::new(fileid))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn diagnostic_kinds(
    diagnostics: &BTreeMap<FileId, Vec<Diagnostic>>,
    fileid: &str,
) -> Vec<DiagnosticKind> {
    diagnostics_for(diagnostics, fileid)
        .iter()
        .map(|d| d.kind.clone())
        .collect()
}

/// Every node in the tree, pre-order, including directive arguments.
pub fn all_nodes(node: &Node) -> Vec<&Node> {
    fn collect<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
        out.push(node);
        match node {
            Node::Directive(d) => d.argument.iter().for_each(|a| collect(a, out)),
            Node::TocTreeDirective(d) => d.argument.iter().for_each(|a| collect(a, out)),
            Node::DefinitionListItem(item) => item.term.iter().for_each(|t| collect(t, out)),
            _ => {}
        }
        for child in node.children().into_iter().flatten() {
            collect(child, out);
        }
    }
    let mut out = Vec::new();
    collect(node, &mut out);
    out
}

pub fn ref_roles(node: &Node) -> Vec<&RefRole> {
    all_nodes(node)
        .into_iter()
        .filter_map(|n| match n {
            Node::RefRole(r) => Some(r),
            _ => None,
        })
        .collect()
}

/// The first ref-role in a page. Panics if the page has none.
pub fn first_ref_role(node: &Node) -> &RefRole {
    ref_roles(node)
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no ref_role in tree: {node:?}"))
}

pub fn heading_ids(node: &Node) -> Vec<&str> {
    all_nodes(node)
        .into_iter()
        .filter_map(|n| match n {
            Node::Heading(h) => Some(h.id.as_str()),
            _ => None,
        })
        .collect()
}

pub fn substitution_refs(node: &Node) -> Vec<&Substitution> {
    all_nodes(node)
        .into_iter()
        .filter_map(|n| match n {
            Node::SubstitutionReference(s) => Some(s),
            _ => None,
        })
        .collect()
}
