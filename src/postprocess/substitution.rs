//! Substitution expansion.
//!
//! `|name|` references take a deep copy of the matching definition's
//! content: page-local definitions first, then project-wide substitutions.
//! A reference that appears before its page-local definition is retried when
//! the page ends.
//!
//! Cycles are caught with an "open" stack holding every definition being
//! visited and every reference being expanded. Meeting a reference whose
//! name is already open means the expansion would recurse forever, so the
//! definition is dropped, the reference emptied and a diagnostic raised.

use crate::ast::{Node, Substitution};
use crate::config::ProjectConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::types::Page;
use crate::walker::{Context, Handler};
use std::collections::{BTreeMap, BTreeSet};

pub(super) struct SubstitutionResolver<'c> {
    config: &'c ProjectConfig,
    definitions: BTreeMap<String, Vec<Node>>,
    /// Names participating in a cycle on this page; never expanded again.
    poisoned: BTreeSet<String>,
    open: Vec<String>,
    /// One entry per reference being visited: whether it pushed onto `open`.
    reference_frames: Vec<bool>,
    deferred: BTreeSet<String>,
}

impl<'c> SubstitutionResolver<'c> {
    pub(super) fn new(config: &'c ProjectConfig) -> Self {
        Self {
            config,
            definitions: BTreeMap::new(),
            poisoned: BTreeSet::new(),
            open: Vec::new(),
            reference_frames: Vec::new(),
            deferred: BTreeSet::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<Vec<Node>> {
        if self.poisoned.contains(name) {
            return None;
        }
        self.definitions
            .get(name)
            .cloned()
            .or_else(|| self.config.substitution(name))
    }

    /// Fill references deferred during the walk, now that every page-local
    /// definition is known.
    fn fill_deferred(&self, cx: &mut Context<'_>, node: &mut Node) {
        if let Node::SubstitutionReference(reference) = node
            && self.deferred.contains(&reference.name)
            && reference.children.is_empty()
        {
            self.fill_at_page_end(cx, reference);
            return;
        }
        let inline: &mut [Node] = match node {
            Node::Directive(directive) => directive.argument.as_mut_slice(),
            Node::TocTreeDirective(directive) => directive.argument.as_mut_slice(),
            Node::DefinitionListItem(item) => item.term.as_mut_slice(),
            _ => &mut [],
        };
        for inline_node in inline {
            self.fill_deferred(cx, inline_node);
        }
        for child in node.children_mut().into_iter().flatten() {
            self.fill_deferred(cx, child);
        }
    }

    fn fill_at_page_end(&self, cx: &mut Context<'_>, reference: &mut Substitution) {
        if self.poisoned.contains(&reference.name) {
            reference.children.clear();
            return;
        }
        match self.lookup(&reference.name) {
            Some(content) => reference.children = content,
            None => {
                reference.children.clear();
                cx.diagnose(Diagnostic::new(
                    DiagnosticKind::SubstitutionRefError {
                        name: reference.name.clone(),
                        circular: false,
                    },
                    reference.span,
                ));
            }
        }
    }
}

impl Handler for SubstitutionResolver<'_> {
    fn enter_page(&mut self, _cx: &mut Context<'_>, _page: &mut Page) {
        self.definitions.clear();
        self.poisoned.clear();
        self.open.clear();
        self.reference_frames.clear();
        self.deferred.clear();
    }

    fn enter_node(&mut self, cx: &mut Context<'_>, node: &mut Node) {
        match node {
            Node::SubstitutionDefinition(definition) => {
                self.open.push(definition.name.clone());
            }
            Node::SubstitutionReference(reference) => {
                let name = reference.name.clone();
                if self.open.contains(&name) {
                    self.definitions.remove(&name);
                    self.poisoned.insert(name.clone());
                    reference.children.clear();
                    cx.diagnose(Diagnostic::new(
                        DiagnosticKind::SubstitutionRefError {
                            name,
                            circular: true,
                        },
                        reference.span,
                    ));
                    self.reference_frames.push(false);
                    return;
                }
                match self.lookup(&name) {
                    Some(content) => {
                        reference.children = content;
                        self.open.push(name);
                        self.reference_frames.push(true);
                    }
                    None => {
                        reference.children.clear();
                        self.deferred.insert(name);
                        self.reference_frames.push(false);
                    }
                }
            }
            _ => {}
        }
    }

    fn exit_node(&mut self, _cx: &mut Context<'_>, node: &mut Node) {
        match node {
            Node::SubstitutionDefinition(definition) => {
                self.open.pop();
                if !self.poisoned.contains(&definition.name) {
                    self.definitions
                        .insert(definition.name.clone(), definition.children.clone());
                }
            }
            Node::SubstitutionReference(_) => {
                if self.reference_frames.pop() == Some(true) {
                    self.open.pop();
                }
            }
            _ => {}
        }
    }

    fn exit_page(&mut self, cx: &mut Context<'_>, page: &mut Page) {
        if !self.deferred.is_empty() {
            self.fill_deferred(cx, &mut page.ast);
        }
    }
}
