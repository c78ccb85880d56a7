//! Scope `std:option` targets under the preceding `std:program`.
//!
//! ```text
//! .. program:: mongod
//! .. option:: --port     → aliases --port, mongod.--port
//!                          label "mongod --port"
//! ```
//!
//! Shares a walk with target indexing and is registered ahead of it, so
//! the indexer sees the scoped ids and label. `mongod.--port` then becomes
//! the option's canonical name and html id.

use crate::ast::{Node, Target, Text, text_of};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::types::Page;
use crate::walker::{Context, Handler};

#[derive(Default)]
pub(super) struct ProgramScoper {
    program: Option<String>,
}

/// Add `{program}.{id}` to every identifier and prefix its label with the
/// program name. Already scoped ids and labels are left alone.
fn scope_option(program: &str, option: &mut Target) {
    let prefix = format!("{program}.");
    let label_prefix = format!("{program} ");

    for child in &mut option.children {
        let Node::TargetIdentifier(identifier) = child else {
            continue;
        };
        let scoped: Vec<String> = identifier
            .ids
            .iter()
            .filter(|id| !id.starts_with(&prefix))
            .map(|id| format!("{prefix}{id}"))
            .filter(|id| !identifier.ids.contains(id))
            .collect();
        identifier.ids.extend(scoped);

        let label = text_of(&identifier.children);
        if !label.is_empty() && !label.starts_with(&label_prefix) {
            identifier.children = vec![Node::Text(Text {
                span: identifier.span,
                value: format!("{label_prefix}{label}"),
            })];
        }
    }
}

impl Handler for ProgramScoper {
    fn enter_page(&mut self, _cx: &mut Context<'_>, _page: &mut Page) {
        self.program = None;
    }

    fn enter_node(&mut self, cx: &mut Context<'_>, node: &mut Node) {
        let Node::Target(target) = node else {
            return;
        };
        if target.domain != "std" {
            return;
        }
        match target.name.as_str() {
            "program" => {
                self.program = target
                    .children
                    .iter()
                    .find_map(|c| match c {
                        Node::TargetIdentifier(ti) => ti.ids.first().cloned(),
                        _ => None,
                    })
                    .or(self.program.take());
            }
            "option" => match &self.program {
                Some(program) => scope_option(program, target),
                None => cx.diagnose(Diagnostic::new(DiagnosticKind::MissingOption, target.span)),
            },
            _ => {}
        }
    }
}
