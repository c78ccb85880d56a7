//! Cross-file semantic resolution over a whole page set.
//!
//! The tokenizer hands over one AST per file; [`Postprocessor::run`] turns
//! that forest into a linked documentation site in a fixed sequence of
//! passes. Each pass is a full [`Walker`] traversal over every page, so a
//! pass can rely on everything the previous passes recorded.
//!
//! ```text
//! 1. include        splice included files, bounded by start-after/end-before
//! 2. substitution   expand |name| references, detect cycles
//! 3. options        scope std:option targets under their std:program
//!    headings       unique heading ids, page titles, explicit targets
//! 4. tabs           tab-selector consistency per page
//! 5. references     resolve ref_role nodes against the target database
//! 6. toctree        global navigation tree, traversal order, breadcrumbs
//! 7. pending tasks  deferred per-page work attached by the tokenizer
//! ```
//!
//! Option scoping and target indexing share one walk, scoping first, so an
//! option is registered once under both its bare and program-qualified ids.
//!
//! Problems never abort a run. They become [`Diagnostic`]s attached to the
//! file being visited, and every input page gets an entry in
//! [`PostprocessResult::diagnostics`], empty when clean.

mod headings;
mod include;
mod options;
mod references;
mod substitution;
mod tabs;
mod toctree;

pub use toctree::{TocNode, TocOptions};

use crate::ast::Node;
use crate::config::ProjectConfig;
use crate::diagnostics::Diagnostic;
use crate::naming::clean_slug;
use crate::targets::TargetDatabase;
use crate::types::{FileId, Page};
use crate::walker::{Handler, Walker};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Site-wide metadata derived from the page set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub title: String,
    #[serde(rename = "deprecated_versions", skip_serializing_if = "Option::is_none")]
    pub deprecated_versions: Option<BTreeMap<String, Vec<String>>>,
    pub slug_to_title: BTreeMap<String, Vec<Node>>,
    #[serde(serialize_with = "empty_object_when_none")]
    pub toctree: Option<TocNode>,
    pub toctree_order: Vec<String>,
    pub parent_paths: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_groups: Option<BTreeMap<String, Vec<String>>>,
}

fn empty_object_when_none<S: Serializer>(
    toctree: &Option<TocNode>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match toctree {
        Some(node) => node.serialize(serializer),
        None => serde_json::Map::new().serialize(serializer),
    }
}

/// Everything a run produces.
#[derive(Debug, Default)]
pub struct PostprocessResult {
    pub pages: BTreeMap<FileId, Page>,
    pub metadata: Metadata,
    pub diagnostics: BTreeMap<FileId, Vec<Diagnostic>>,
}

impl PostprocessResult {
    /// Every diagnostic, paired with the file it belongs to.
    pub fn all_diagnostics(&self) -> impl Iterator<Item = (&FileId, &Diagnostic)> {
        self.diagnostics
            .iter()
            .flat_map(|(fileid, list)| list.iter().map(move |d| (fileid, d)))
    }
}

/// Runs the passes. Holds the target database between runs so inventories
/// loaded by [`TargetDatabase::reset`] are reused.
pub struct Postprocessor<'c> {
    config: &'c ProjectConfig,
    targets: TargetDatabase,
    slug_titles: BTreeMap<String, Vec<Node>>,
}

impl<'c> Postprocessor<'c> {
    pub fn new(config: &'c ProjectConfig, targets: TargetDatabase) -> Self {
        Self {
            config,
            targets,
            slug_titles: BTreeMap::new(),
        }
    }

    /// The database as left by the last run, e.g. for inventory generation.
    pub fn targets(&self) -> &TargetDatabase {
        &self.targets
    }

    pub fn run(&mut self, mut pages: BTreeMap<FileId, Page>) -> PostprocessResult {
        if pages.is_empty() {
            return PostprocessResult {
                metadata: Metadata {
                    title: self.config.title.clone(),
                    ..Metadata::default()
                },
                ..PostprocessResult::default()
            };
        }

        self.targets.clear_local();
        self.slug_titles.clear();
        let mut diagnostics: BTreeMap<FileId, Vec<Diagnostic>> =
            pages.keys().map(|k| (k.clone(), Vec::new())).collect();

        debug!(pages = pages.len(), "expanding includes");
        let sources: BTreeMap<FileId, Node> = pages
            .iter()
            .map(|(fileid, page)| (fileid.clone(), page.ast.clone()))
            .collect();
        run_pass(
            &mut pages,
            &mut diagnostics,
            &mut include::IncludeExpander::new(&sources),
        );

        debug!("resolving substitutions");
        run_pass(
            &mut pages,
            &mut diagnostics,
            &mut substitution::SubstitutionResolver::new(self.config),
        );

        debug!("scoping program options, indexing headings and targets");
        {
            let mut scoper = options::ProgramScoper::default();
            let mut indexer =
                headings::HeadingIndexer::new(&mut self.targets, &mut self.slug_titles);
            let mut walker = Walker::new();
            walker.add_handler(&mut scoper);
            walker.add_handler(&mut indexer);
            walker.consume(&mut pages, &mut diagnostics);
        }

        debug!("checking tab selectors");
        run_pass(&mut pages, &mut diagnostics, &mut tabs::TabChecker::default());

        debug!("resolving references");
        run_pass(
            &mut pages,
            &mut diagnostics,
            &mut references::ReferenceResolver::new(&self.targets, &self.slug_titles),
        );

        debug!("assembling toctree");
        let structure =
            toctree::assemble(&mut pages, &mut diagnostics, &self.slug_titles, self.config);

        for (fileid, page) in pages.iter_mut() {
            let list = diagnostics.entry(fileid.clone()).or_default();
            for mut task in std::mem::take(&mut page.pending_tasks) {
                task.run(&mut page.ast, list);
            }
        }

        let metadata = Metadata {
            title: self.config.title.clone(),
            deprecated_versions: self.config.deprecated_versions.clone(),
            slug_to_title: self.slug_titles.clone(),
            toctree: structure.toctree,
            toctree_order: structure.order,
            parent_paths: structure.parent_paths,
            page_groups: self.page_groups(),
        };

        PostprocessResult {
            pages,
            metadata,
            diagnostics,
        }
    }

    /// Configured page groups, keeping only slugs that name a titled page.
    fn page_groups(&self) -> Option<BTreeMap<String, Vec<String>>> {
        if self.config.page_groups.is_empty() {
            return None;
        }
        let groups = self
            .config
            .page_groups
            .iter()
            .map(|(group, slugs)| {
                let kept = slugs
                    .iter()
                    .filter(|slug| {
                        let known = self.slug_titles.contains_key(&clean_slug(slug));
                        if !known {
                            warn!(
                                group = group.as_str(),
                                slug = slug.as_str(),
                                "dropping unknown slug from page group"
                            );
                        }
                        known
                    })
                    .cloned()
                    .collect();
                (group.clone(), kept)
            })
            .collect();
        Some(groups)
    }
}

fn run_pass(
    pages: &mut BTreeMap<FileId, Page>,
    diagnostics: &mut BTreeMap<FileId, Vec<Diagnostic>>,
    handler: &mut dyn Handler,
) {
    let mut walker = Walker::new();
    walker.add_handler(handler);
    walker.consume(pages, diagnostics);
}
