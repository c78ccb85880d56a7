//! Event-driven traversal over a whole page set.
//!
//! One [`Walker::consume`] call is one pass: every page, in [`FileId`]
//! order, pre-order within each page. Listeners mutate nodes in place; they
//! cannot steer the traversal.
//!
//! ## Traversal contract
//!
//! - `Root` pushes its fileid on the file stack before its visit and pops
//!   after, so diagnostics raised inside an expanded include land on the
//!   included file.
//! - `Directive` / `TocTreeDirective` visit `argument` before `children`.
//! - `DefinitionListItem` visits `term` before `children`.
//! - `ObjectStart` fires before a node's children are walked, so children a
//!   listener attaches there are walked in the same pass.
//!
//! Event-specific listeners fire in registration order, then universal
//! listeners. A [`Handler`] counts as one listener for each of the four
//! events, at the position it was registered.

use crate::ast::Node;
use crate::diagnostics::Diagnostic;
use crate::types::{FileId, Page};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    PageStart,
    PageEnd,
    ObjectStart,
    ObjectEnd,
}

/// What a closure listener is looking at.
pub enum Visit<'n> {
    Page(&'n mut Page),
    Node(&'n mut Node),
}

/// Stack of files being visited: the page itself, then any included roots.
#[derive(Debug, Clone)]
pub struct FileIdStack {
    root: FileId,
    nested: Vec<FileId>,
}

impl FileIdStack {
    pub fn new(root: FileId) -> Self {
        Self {
            root,
            nested: Vec::new(),
        }
    }

    /// The page whose walk is in progress.
    pub fn root(&self) -> &FileId {
        &self.root
    }

    /// The innermost file, i.e. an included file while inside its subtree.
    pub fn current(&self) -> &FileId {
        self.nested.last().unwrap_or(&self.root)
    }

    pub fn contains(&self, fileid: &FileId) -> bool {
        self.root == *fileid || self.nested.contains(fileid)
    }

    fn push(&mut self, fileid: FileId) {
        self.nested.push(fileid);
    }

    fn pop(&mut self) {
        self.nested.pop();
    }
}

/// Per-visit context handed to every listener.
pub struct Context<'d> {
    pub fileids: FileIdStack,
    diagnostics: &'d mut BTreeMap<FileId, Vec<Diagnostic>>,
}

impl Context<'_> {
    /// Attach a diagnostic to the file currently being visited.
    pub fn diagnose(&mut self, diagnostic: Diagnostic) {
        let current = self.fileids.current().clone();
        self.diagnostics.entry(current).or_default().push(diagnostic);
    }
}

/// A stateful listener bundle. Every method defaults to a no-op.
pub trait Handler {
    fn enter_page(&mut self, _cx: &mut Context<'_>, _page: &mut Page) {}
    fn exit_page(&mut self, _cx: &mut Context<'_>, _page: &mut Page) {}
    fn enter_node(&mut self, _cx: &mut Context<'_>, _node: &mut Node) {}
    fn exit_node(&mut self, _cx: &mut Context<'_>, _node: &mut Node) {}
}

type EventListener<'a> = Box<dyn FnMut(&mut Context<'_>, Visit<'_>) + 'a>;
type UniversalListener<'a> = Box<dyn FnMut(Event, &mut Context<'_>, Visit<'_>) + 'a>;

enum Listener<'a> {
    Event(Event, EventListener<'a>),
    Handler(&'a mut dyn Handler),
}

#[derive(Default)]
pub struct Walker<'a> {
    listeners: Vec<Listener<'a>>,
    universal: Vec<UniversalListener<'a>>,
}

impl<'a> Walker<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event_listener<F>(&mut self, event: Event, listener: F)
    where
        F: FnMut(&mut Context<'_>, Visit<'_>) + 'a,
    {
        self.listeners.push(Listener::Event(event, Box::new(listener)));
    }

    pub fn add_universal_listener<F>(&mut self, listener: F)
    where
        F: FnMut(Event, &mut Context<'_>, Visit<'_>) + 'a,
    {
        self.universal.push(Box::new(listener));
    }

    pub fn add_handler(&mut self, handler: &'a mut dyn Handler) {
        self.listeners.push(Listener::Handler(handler));
    }

    /// Walk every page once, firing the registered listeners.
    pub fn consume(
        &mut self,
        pages: &mut BTreeMap<FileId, Page>,
        diagnostics: &mut BTreeMap<FileId, Vec<Diagnostic>>,
    ) {
        for (fileid, page) in pages.iter_mut() {
            let mut cx = Context {
                fileids: FileIdStack::new(fileid.clone()),
                diagnostics: &mut *diagnostics,
            };

            self.page_event(Event::PageStart, &mut cx, page);
            self.visit(&mut cx, &mut page.ast);
            self.page_event(Event::PageEnd, &mut cx, page);
        }
    }

    fn visit(&mut self, cx: &mut Context<'_>, node: &mut Node) {
        let root_fileid = match node {
            Node::Root(root) => Some(root.fileid.clone()),
            _ => None,
        };
        if let Some(fileid) = root_fileid.clone() {
            cx.fileids.push(fileid);
        }

        self.node_event(Event::ObjectStart, cx, node);
        match &mut *node {
            Node::Directive(d) => {
                for arg in &mut d.argument {
                    self.visit(cx, arg);
                }
                for child in &mut d.children {
                    self.visit(cx, child);
                }
            }
            Node::TocTreeDirective(d) => {
                for arg in &mut d.argument {
                    self.visit(cx, arg);
                }
                for child in &mut d.children {
                    self.visit(cx, child);
                }
            }
            Node::DefinitionListItem(item) => {
                for term in &mut item.term {
                    self.visit(cx, term);
                }
                for child in &mut item.children {
                    self.visit(cx, child);
                }
            }
            other => {
                for child in other.children_mut().into_iter().flatten() {
                    self.visit(cx, child);
                }
            }
        }
        self.node_event(Event::ObjectEnd, cx, node);

        if root_fileid.is_some() {
            cx.fileids.pop();
        }
    }

    fn page_event(&mut self, event: Event, cx: &mut Context<'_>, page: &mut Page) {
        for listener in &mut self.listeners {
            match listener {
                Listener::Event(e, f) if *e == event => f(cx, Visit::Page(page)),
                Listener::Event(..) => {}
                Listener::Handler(h) => match event {
                    Event::PageStart => h.enter_page(cx, page),
                    Event::PageEnd => h.exit_page(cx, page),
                    Event::ObjectStart | Event::ObjectEnd => {}
                },
            }
        }
        for f in &mut self.universal {
            f(event, cx, Visit::Page(page));
        }
    }

    fn node_event(&mut self, event: Event, cx: &mut Context<'_>, node: &mut Node) {
        for listener in &mut self.listeners {
            match listener {
                Listener::Event(e, f) if *e == event => f(cx, Visit::Node(node)),
                Listener::Event(..) => {}
                Listener::Handler(h) => match event {
                    Event::ObjectStart => h.enter_node(cx, node),
                    Event::ObjectEnd => h.exit_node(cx, node),
                    Event::PageStart | Event::PageEnd => {}
                },
            }
        }
        for f in &mut self.universal {
            f(event, cx, Visit::Node(node));
        }
    }
}
