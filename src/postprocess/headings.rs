//! Heading ids, page titles and explicit targets.
//!
//! - Heading ids are unique per page: the second `install` heading becomes
//!   `install-1`, the third `install-2`. Headings without an id get one
//!   derived from their text.
//! - The first heading of each file is that file's title and is registered
//!   as a `std:doc` target under both its slug and its file name.
//! - Every `Target` with at least one id gets an html id
//!   (`{domain}-{name}-{canonical}`, de-duplicated per page) and is
//!   registered under each alias.

use crate::ast::{Node, Target, TargetIdentifier, text_of};
use crate::naming::{heading_id_from_text, make_html_id};
use crate::targets::TargetDatabase;
use crate::types::{FileId, Page};
use crate::walker::{Context, Handler};
use std::collections::{BTreeMap, HashMap, HashSet};

pub(super) struct HeadingIndexer<'t> {
    targets: &'t mut TargetDatabase,
    slug_titles: &'t mut BTreeMap<String, Vec<Node>>,
    heading_counts: HashMap<String, usize>,
    html_ids: HashSet<String>,
}

impl<'t> HeadingIndexer<'t> {
    pub(super) fn new(
        targets: &'t mut TargetDatabase,
        slug_titles: &'t mut BTreeMap<String, Vec<Node>>,
    ) -> Self {
        Self {
            targets,
            slug_titles,
            heading_counts: HashMap::new(),
            html_ids: HashSet::new(),
        }
    }

    /// `base`, `base-1`, `base-2`, ... in order of appearance.
    fn unique_heading_id(&mut self, base: String) -> String {
        let count = self.heading_counts.entry(base.clone()).or_insert(0);
        let id = if *count == 0 {
            base
        } else {
            format!("{base}-{count}")
        };
        *count += 1;
        id
    }

    fn unique_html_id(&mut self, base: String) -> String {
        let mut candidate = base.clone();
        let mut n = 1;
        while !self.html_ids.insert(candidate.clone()) {
            candidate = format!("{base}-{n}");
            n += 1;
        }
        candidate
    }

    fn index_target(&mut self, root: &FileId, target: &mut Target) {
        let identifiers: Vec<&TargetIdentifier> = target
            .children
            .iter()
            .filter_map(|c| match c {
                Node::TargetIdentifier(ti) => Some(ti),
                _ => None,
            })
            .collect();
        let aliases: Vec<String> = identifiers
            .iter()
            .flat_map(|ti| ti.ids.iter().cloned())
            .collect();
        let title: Vec<Node> = identifiers
            .iter()
            .find(|ti| !ti.children.is_empty())
            .map(|ti| ti.children.clone())
            .unwrap_or_default();
        let Some(canonical) = aliases
            .iter()
            .reduce(|best, a| if a.split('.').count() > best.split('.').count() { a } else { best })
        else {
            return;
        };

        let html_id = self.unique_html_id(format!(
            "{}-{}-{}",
            target.domain,
            target.name,
            make_html_id(canonical)
        ));
        self.targets.define_local_target(
            &target.domain,
            &target.name,
            &aliases,
            root,
            &title,
            &html_id,
        );
        target.html_id = Some(html_id);
    }
}

impl Handler for HeadingIndexer<'_> {
    fn enter_page(&mut self, _cx: &mut Context<'_>, _page: &mut Page) {
        self.heading_counts.clear();
        self.html_ids.clear();
    }

    fn enter_node(&mut self, cx: &mut Context<'_>, node: &mut Node) {
        match node {
            Node::Heading(heading) => {
                let base = if heading.id.is_empty() {
                    heading_id_from_text(&text_of(&heading.children))
                } else {
                    heading.id.clone()
                };
                heading.id = self.unique_heading_id(base);
                self.html_ids.insert(heading.id.clone());

                let current = cx.fileids.current().clone();
                let slug = current.without_known_suffix().to_string();
                if !self.slug_titles.contains_key(&slug) {
                    self.slug_titles.insert(slug.clone(), heading.children.clone());
                    let mut aliases = vec![slug];
                    if current.as_str() != aliases[0] {
                        aliases.push(current.to_string());
                    }
                    self.targets.define_local_target(
                        "std",
                        "doc",
                        &aliases,
                        &current,
                        &heading.children,
                        "",
                    );
                }
            }
            Node::Target(target) => {
                let root = cx.fileids.root().clone();
                self.index_target(&root, target);
            }
            _ => {}
        }
    }
}
