//! Global navigation: the toctree, its pre-order traversal and breadcrumbs.
//!
//! The tree starts at the root page and follows every `toctree` directive:
//!
//! ```text
//! index.txt    toctree: install, reference
//! install.txt  toctree: install/linux
//!
//! /
//! ├── install
//! │   └── install/linux
//! └── reference
//! ```
//!
//! A page listed under several parents is expanded under each of them. A
//! page already on the path from the root becomes a childless node, which
//! is what stops toctree cycles.

use crate::ast::{Node, Text, TocTarget, TocTreeEntry};
use crate::config::ProjectConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::naming::{clean_slug, reroot_path};
use crate::types::{FileId, Page, Span};
use crate::walker::{Event, Visit, Walker};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Checked in order; the first one present is the root of the tree.
const ROOT_CANDIDATES: &[&str] = &["index.txt", "index.rst"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TocNode {
    pub title: Vec<Node>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub children: Vec<TocNode>,
    #[serde(skip_serializing_if = "TocOptions::is_empty")]
    pub options: TocOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TocOptions {
    /// Whether the node opens as a drawer; landing pages do not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drawer: Option<bool>,
}

impl TocOptions {
    fn is_empty(&self) -> bool {
        self.drawer.is_none()
    }
}

#[derive(Debug, Default)]
pub(super) struct Structure {
    pub toctree: Option<TocNode>,
    pub order: Vec<String>,
    pub parent_paths: BTreeMap<String, Vec<String>>,
}

/// A toctree entry and where it was written.
struct Located {
    fileid: FileId,
    span: Span,
    entry: TocTreeEntry,
}

pub(super) fn assemble(
    pages: &mut BTreeMap<FileId, Page>,
    diagnostics: &mut BTreeMap<FileId, Vec<Diagnostic>>,
    slug_titles: &BTreeMap<String, Vec<Node>>,
    config: &ProjectConfig,
) -> Structure {
    let Some(root) = ROOT_CANDIDATES
        .iter()
        .map(|name| FileId::new(*name))
        .find(|fileid| pages.contains_key(fileid))
    else {
        debug!("no root page, skipping toctree");
        return Structure::default();
    };

    let entries = collect_entries(pages, diagnostics);
    let mut builder = TreeBuilder {
        entries: &entries,
        slugs: pages
            .keys()
            .map(|fileid| (fileid.without_known_suffix().to_string(), fileid.clone()))
            .collect(),
        slug_titles,
        landing_pages: config.toc_landing_pages.iter().map(|s| clean_slug(s)).collect(),
        path: BTreeSet::from([root.without_known_suffix().to_string()]),
        reported: BTreeSet::new(),
        diagnostics,
    };

    let title = if config.title.is_empty() {
        slug_titles
            .get(root.without_known_suffix())
            .cloned()
            .unwrap_or_default()
    } else {
        vec![Node::Text(Text {
            span: Span::default(),
            value: config.title.clone(),
        })]
    };
    let tree = TocNode {
        title,
        slug: Some("/".to_string()),
        url: None,
        children: builder.children_of(&root),
        options: TocOptions::default(),
    };

    let mut order = vec!["/".to_string()];
    let mut parent_paths = BTreeMap::new();
    let mut ancestors = Vec::new();
    for child in &tree.children {
        walk_order(child, &mut ancestors, &mut order, &mut parent_paths);
    }

    Structure {
        toctree: Some(tree),
        order,
        parent_paths,
    }
}

/// Every toctree entry on every page, keyed by the page that owns it.
fn collect_entries(
    pages: &mut BTreeMap<FileId, Page>,
    diagnostics: &mut BTreeMap<FileId, Vec<Diagnostic>>,
) -> BTreeMap<FileId, Vec<Located>> {
    let mut entries: BTreeMap<FileId, Vec<Located>> = BTreeMap::new();
    {
        let mut walker = Walker::new();
        walker.add_event_listener(Event::ObjectStart, |cx, visit| {
            if let Visit::Node(Node::TocTreeDirective(toctree)) = visit {
                let located = toctree.entries.iter().map(|entry| Located {
                    fileid: cx.fileids.current().clone(),
                    span: toctree.span,
                    entry: entry.clone(),
                });
                entries
                    .entry(cx.fileids.root().clone())
                    .or_default()
                    .extend(located);
            }
        });
        walker.consume(pages, diagnostics);
    }
    entries
}

struct TreeBuilder<'a> {
    entries: &'a BTreeMap<FileId, Vec<Located>>,
    slugs: BTreeMap<String, FileId>,
    slug_titles: &'a BTreeMap<String, Vec<Node>>,
    landing_pages: BTreeSet<String>,
    /// Slugs being expanded, from the root down to the current page.
    path: BTreeSet<String>,
    /// Missing entries already diagnosed; a page expanded under two parents
    /// must not report its bad entries twice.
    reported: BTreeSet<(FileId, String, Span)>,
    diagnostics: &'a mut BTreeMap<FileId, Vec<Diagnostic>>,
}

impl TreeBuilder<'_> {
    fn children_of(&mut self, page: &FileId) -> Vec<TocNode> {
        let entries = self.entries;
        let Some(located) = entries.get(page) else {
            return Vec::new();
        };
        let mut children = Vec::new();
        for item in located {
            match &item.entry.target {
                TocTarget::Url(url) => children.push(TocNode {
                    title: vec![text(item.entry.title.as_deref().unwrap_or(url))],
                    slug: None,
                    url: Some(url.clone()),
                    children: Vec::new(),
                    options: TocOptions::default(),
                }),
                TocTarget::Slug(raw) => {
                    let slug = clean_slug(&reroot_path(raw, &item.fileid));
                    let Some(fileid) = self.slugs.get(&slug).cloned() else {
                        if self
                            .reported
                            .insert((item.fileid.clone(), raw.clone(), item.span))
                        {
                            self.diagnostics
                                .entry(item.fileid.clone())
                                .or_default()
                                .push(Diagnostic::new(
                                    DiagnosticKind::MissingTocTreeEntry { entry: raw.clone() },
                                    item.span,
                                ));
                        }
                        continue;
                    };
                    let title = match &item.entry.title {
                        Some(explicit) => vec![text(explicit)],
                        None => self.slug_titles.get(&slug).cloned().unwrap_or_default(),
                    };
                    let grandchildren = if self.path.insert(slug.clone()) {
                        let grandchildren = self.children_of(&fileid);
                        self.path.remove(&slug);
                        grandchildren
                    } else {
                        Vec::new()
                    };
                    children.push(TocNode {
                        title,
                        options: TocOptions {
                            drawer: Some(!self.landing_pages.contains(&slug)),
                        },
                        slug: Some(slug),
                        url: None,
                        children: grandchildren,
                    });
                }
            }
        }
        children
    }
}

fn text(value: &str) -> Node {
    Node::Text(Text {
        span: Span::default(),
        value: value.to_string(),
    })
}

/// Pre-order slugs and, for each slug's first appearance, its ancestors.
fn walk_order(
    node: &TocNode,
    ancestors: &mut Vec<String>,
    order: &mut Vec<String>,
    parent_paths: &mut BTreeMap<String, Vec<String>>,
) {
    let Some(slug) = &node.slug else {
        return;
    };
    order.push(slug.clone());
    parent_paths
        .entry(slug.clone())
        .or_insert_with(|| ancestors.clone());
    ancestors.push(slug.clone());
    for child in &node.children {
        walk_order(child, ancestors, order, parent_paths);
    }
    ancestors.pop();
}
