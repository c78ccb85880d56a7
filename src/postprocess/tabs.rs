//! Tab-selector consistency.
//!
//! A `tabs-selector` (or `tabs-pillstrip`) directive lets the reader pick one
//! tab for every `tabs` block in the same tabset, so each of those blocks
//! must offer the same tab ids. The first block's `{tabid: title}` map is
//! stored on the page root under `options.selectors.<name>` for the
//! front end to render the selector.

use crate::ast::{Directive, Node, text_of};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::naming::normalize_target;
use crate::types::{Page, Span};
use crate::walker::{Context, Handler};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

const SELECTOR_DIRECTIVES: &[&str] = &["tabs-selector", "tabs-pillstrip"];
const DEFAULT_SELECTOR: &str = "drivers";

type Contribution = BTreeMap<String, Vec<Node>>;

#[derive(Default)]
pub(super) struct TabChecker {
    /// Selector name and where it was opened, in opening order.
    selectors: Vec<(String, Span)>,
    contributions: BTreeMap<String, Vec<Contribution>>,
}

impl TabChecker {
    fn is_open(&self, name: &str) -> bool {
        self.selectors.iter().any(|(open, _)| open == name)
    }

    fn open_selector(&mut self, cx: &mut Context<'_>, directive: &Directive) {
        let name = match normalize_target(&text_of(&directive.argument)) {
            n if n.is_empty() => DEFAULT_SELECTOR.to_string(),
            n => n,
        };
        if self.is_open(&name) {
            cx.diagnose(Diagnostic::new(
                DiagnosticKind::DuplicateDirective {
                    name: directive.name.clone(),
                },
                directive.span,
            ));
            return;
        }
        self.selectors.push((name, directive.span));
    }

    fn contribute(&mut self, cx: &mut Context<'_>, tabset: &str, directive: &Directive) {
        let mut contribution = Contribution::new();
        for child in &directive.children {
            match child {
                Node::Directive(tab) if tab.name == "tab" => {
                    let tabid = tab
                        .options
                        .get("tabid")
                        .cloned()
                        .unwrap_or_else(|| normalize_target(&text_of(&tab.argument)));
                    contribution.insert(tabid, tab.argument.clone());
                }
                Node::Directive(other) => cx.diagnose(Diagnostic::new(
                    DiagnosticKind::TabMustBeDirective {
                        found: format!("directive {}", other.name),
                    },
                    other.span,
                )),
                other => cx.diagnose(Diagnostic::new(
                    DiagnosticKind::TabMustBeDirective {
                        found: other.kind_name().to_string(),
                    },
                    other.span(),
                )),
            }
        }
        self.contributions
            .entry(tabset.to_string())
            .or_default()
            .push(contribution);
    }
}

impl Handler for TabChecker {
    fn enter_page(&mut self, _cx: &mut Context<'_>, _page: &mut Page) {
        self.selectors.clear();
        self.contributions.clear();
    }

    fn enter_node(&mut self, cx: &mut Context<'_>, node: &mut Node) {
        let Node::Directive(directive) = node else {
            return;
        };
        if SELECTOR_DIRECTIVES.contains(&directive.name.as_str()) {
            self.open_selector(cx, directive);
        } else if directive.name == "tabs"
            && let Some(tabset) = directive.options.get("tabset")
            && self.is_open(tabset)
        {
            let tabset = tabset.clone();
            self.contribute(cx, &tabset, directive);
        }
    }

    fn exit_page(&mut self, cx: &mut Context<'_>, page: &mut Page) {
        let mut persisted = serde_json::Map::new();

        for (name, span) in &self.selectors {
            let Some(contributions) = self.contributions.get(name).filter(|c| !c.is_empty())
            else {
                cx.diagnose(Diagnostic::new(DiagnosticKind::ExpectedTabs, *span));
                continue;
            };

            let sets: Vec<BTreeSet<&String>> =
                contributions.iter().map(|c| c.keys().collect()).collect();
            let union: BTreeSet<&String> = sets.iter().flatten().copied().collect();
            let missing: BTreeSet<String> = union
                .into_iter()
                .filter(|tabid| !sets.iter().all(|set| set.contains(tabid)))
                .cloned()
                .collect();
            if !missing.is_empty() {
                cx.diagnose(Diagnostic::new(DiagnosticKind::MissingTab { tabs: missing }, *span));
            }

            match serde_json::to_value(&contributions[0]) {
                Ok(value) => {
                    persisted.insert(name.clone(), value);
                }
                Err(e) => warn!(selector = name.as_str(), error = %e, "cannot store selector"),
            }
        }

        if persisted.is_empty() {
            return;
        }
        if let Node::Root(root) = &mut page.ast {
            root.options
                .insert("selectors".to_string(), serde_json::Value::Object(persisted));
        }
    }
}
