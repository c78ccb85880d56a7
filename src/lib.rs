//! # docforest
//!
//! Cross-file semantic resolution for tokenized documentation trees. A
//! tokenizer turns each reStructuredText-like source file into an AST; this
//! crate takes the whole forest of ASTs and links it into a site.
//!
//! # Architecture: Ordered Passes Over a Page Set
//!
//! ```text
//! tokenizer      source files  →  FileId → Page     (out of scope)
//! postprocess    FileId → Page →  resolved pages + metadata + diagnostics
//! inventory      local targets →  objects.inv       (optional)
//! ```
//!
//! [`postprocess::Postprocessor::run`] walks every page once per pass. A
//! pass never starts before the previous one has seen every page, so
//! reference resolution can rely on every target in the project being
//! registered.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | `FileId`, `Span`, `Page`, `PendingTask` |
//! | [`ast`] | `Node` sum type and its JSON wire form |
//! | [`walker`] | Event-driven traversal with a file stack for includes |
//! | [`postprocess`] | The orchestrator and one module per pass |
//! | [`targets`] | `TargetDatabase`: local definitions plus external inventories |
//! | [`inventory`] | Intersphinx `objects.inv` parsing and writing |
//! | [`cache`] | On-disk inventory cache with conditional HTTP revalidation |
//! | [`diagnostics`] | `Diagnostic`, `DiagnosticKind`, `Severity` |
//! | [`config`] | `docforest.toml` loading, merging and validation |
//! | [`naming`] | Slugs, HTML ids, cache filenames, did-you-mean matching |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Diagnostics, Not Errors
//!
//! Bad input never stops a run. A broken reference or a circular include
//! becomes a [`diagnostics::Diagnostic`] attached to the file being visited
//! (the included file, when inside an include) and the pass moves on. The
//! only hard failure is an intersphinx inventory that cannot be fetched, since
//! resolving against a partial set of inventories would report bogus missing
//! targets.
//!
//! ## A Closed Node Type
//!
//! [`ast::Node`] is an enum with one variant per node kind. Passes match on
//! it, so adding a kind is a compile error in every pass that must handle it.
//!
//! ## Explicit State
//!
//! The target database, heading counters and page titles live in the
//! `Postprocessor` and its pass structs. Two postprocessors never share
//! state, so tests run independent projects side by side.

pub mod ast;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod inventory;
pub mod naming;
pub mod output;
pub mod postprocess;
pub mod targets;
pub mod types;
pub mod walker;

#[cfg(test)]
pub(crate) mod test_helpers;
