//! Cross-reference resolution.
//!
//! `:doc:` roles resolve by path against the recorded page titles; every
//! other role is looked up in the [`TargetDatabase`]. A role written without
//! an explicit title gets a copy of the target's title, re-spanned to the
//! role's own position.

use crate::ast::{Node, RefRole, Resolution, Text, text_of, title_injection_candidate};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::naming::{clean_slug, reroot_path};
use crate::targets::{TargetDatabase, TargetResult, target_key};
use crate::types::{FileId, Span};
use crate::walker::{Context, Handler};
use std::collections::BTreeMap;

pub(super) struct ReferenceResolver<'a> {
    targets: &'a TargetDatabase,
    slug_titles: &'a BTreeMap<String, Vec<Node>>,
}

impl<'a> ReferenceResolver<'a> {
    pub(super) fn new(
        targets: &'a TargetDatabase,
        slug_titles: &'a BTreeMap<String, Vec<Node>>,
    ) -> Self {
        Self {
            targets,
            slug_titles,
        }
    }

    fn resolve_doc(&self, cx: &mut Context<'_>, role: &mut RefRole) {
        let root = cx.fileids.root().clone();
        let slug = clean_slug(&reroot_path(&role.target, &root));
        if slug.is_empty() && role.target.trim() != "/" {
            cx.diagnose(Diagnostic::new(
                DiagnosticKind::ExpectedPathArg {
                    name: role.name.clone(),
                },
                role.span,
            ));
            return;
        }
        let slug = if slug.is_empty() { "index".to_string() } else { slug };

        role.resolution = Some(Resolution::Local {
            slug: slug.clone(),
            html_id: String::new(),
        });
        let span = role.span;
        let target = role.target.clone();
        let Some(slot) = injection_slot(role) else {
            return;
        };
        match self.slug_titles.get(&slug) {
            Some(title) => inject(slot, title, span),
            None => cx.diagnose(Diagnostic::new(DiagnosticKind::UnnamedPage { target }, span)),
        }
    }

    fn resolve_target(&self, cx: &mut Context<'_>, role: &mut RefRole) {
        let key = target_key(&role.domain, &role.name, &role.target);
        let candidates = self.targets.lookup(&key);
        let root = cx.fileids.root().clone();

        let chosen = match candidates.len() {
            0 => {
                cx.diagnose(Diagnostic::new(
                    DiagnosticKind::TargetNotFound {
                        name: format!("{}:{}", role.domain, role.name),
                        target: role.target.clone(),
                        suggestions: self.targets.suggestions(&key),
                    },
                    role.span,
                ));
                let fallback = self.fallback_title(role);
                let span = role.span;
                if let Some(slot) = injection_slot(role) {
                    inject(slot, &[text_node(fallback, span)], span);
                }
                return;
            }
            1 => &candidates[0],
            _ => match disambiguate(&candidates, &root) {
                Some(one) => one,
                None => {
                    cx.diagnose(Diagnostic::new(
                        DiagnosticKind::AmbiguousTarget {
                            name: format!("{}:{}", role.domain, role.name),
                            target: role.target.clone(),
                            candidates: candidates.iter().map(TargetResult::location).collect(),
                        },
                        role.span,
                    ));
                    &candidates[candidates.len() - 1]
                }
            },
        };

        role.target = chosen.canonical_name().to_string();
        role.resolution = Some(match chosen {
            TargetResult::Local { slug, html_id, .. } => Resolution::Local {
                slug: slug.clone(),
                html_id: html_id.clone(),
            },
            TargetResult::External { url, .. } => Resolution::External { url: url.clone() },
        });

        let span = role.span;
        let title: Vec<Node> = if chosen.title().is_empty() {
            vec![text_node(role.target.clone(), span)]
        } else {
            chosen.title().to_vec()
        };
        let shorten = role.flag == "~";
        if let Some(slot) = injection_slot(role) {
            if shorten {
                let full = text_of(&title);
                let short = full.rsplit('.').next().unwrap_or(&full).to_string();
                inject(slot, &[text_node(short, span)], span);
            } else {
                inject(slot, &title, span);
            }
        }
    }

    /// The raw target text minus any configured role prefix.
    fn fallback_title(&self, role: &RefRole) -> String {
        let target = role.target.trim();
        self.targets
            .role_prefix(&role.domain, &role.name)
            .and_then(|prefix| target.strip_prefix(&format!("{prefix}.")))
            .unwrap_or(target)
            .to_string()
    }
}

impl Handler for ReferenceResolver<'_> {
    fn enter_node(&mut self, cx: &mut Context<'_>, node: &mut Node) {
        let Node::RefRole(role) = node else {
            return;
        };
        if role.domain == "std" && role.name == "doc" {
            self.resolve_doc(cx, role);
        } else {
            self.resolve_target(cx, role);
        }
    }
}

/// Narrow several candidates to one: the only local candidate, else the only
/// local candidate defined on the referencing page.
fn disambiguate<'r>(candidates: &'r [TargetResult], page: &FileId) -> Option<&'r TargetResult> {
    let local: Vec<&TargetResult> = candidates.iter().filter(|c| c.is_local()).collect();
    if let [only] = local[..] {
        return Some(only);
    }
    let page_slug = page.without_known_suffix();
    let on_page: Vec<&TargetResult> = local
        .into_iter()
        .filter(|c| matches!(c, TargetResult::Local { slug, .. } if slug == page_slug))
        .collect();
    match on_page[..] {
        [only] => Some(only),
        _ => None,
    }
}

/// Where an implicit title goes, or `None` when the role already has one.
fn injection_slot(role: &mut RefRole) -> Option<&mut Vec<Node>> {
    match role.children.len() {
        0 => Some(&mut role.children),
        1 => title_injection_candidate(&mut role.children[0])?.children_mut(),
        _ => None,
    }
}

fn inject(slot: &mut Vec<Node>, title: &[Node], span: Span) {
    *slot = title
        .iter()
        .cloned()
        .map(|mut node| {
            node.set_span_recursive(span);
            node
        })
        .collect();
}

fn text_node(value: String, span: Span) -> Node {
    Node::Text(Text { span, value })
}
