//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Diagnostics
//!
//! Grouped by file, in file order, each line prefixed with severity and line:
//!
//! ```text
//! tutorial/install.txt
//!     ERROR(12): Target not found: "std:label:instal". Did you mean: install?
//!     WARNING(30): Directive "tabs-pillstrip" should only appear once per page
//! ```
//!
//! ## Navigation
//!
//! The toctree, one node per line, indented by depth:
//!
//! ```text
//! MongoDB Manual → /
//! 001 Installation → install
//!     001 Install on Linux → install/linux
//! 002 Reference → reference
//! 003 Drivers → https://example.org/drivers
//! ```
//!
//! ## Summary
//!
//! ```text
//! Resolved 42 pages: 1 error, 1 warning
//! ```
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::ast::text_of;
use crate::diagnostics::Severity;
use crate::postprocess::{Metadata, PostprocessResult, TocNode};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 error`, `2 errors`.
fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Every non-empty diagnostics list, grouped under its file.
pub fn format_diagnostics(result: &PostprocessResult) -> Vec<String> {
    let mut lines = Vec::new();
    for (fileid, diagnostics) in &result.diagnostics {
        if diagnostics.is_empty() {
            continue;
        }
        lines.push(fileid.to_string());
        for diagnostic in diagnostics {
            lines.push(format!("{}{}", indent(1), diagnostic));
        }
    }
    lines
}

pub fn print_diagnostics(result: &PostprocessResult) {
    for line in format_diagnostics(result) {
        println!("{}", line);
    }
}

/// How many diagnostics of a severity the run produced.
pub fn count_severity(result: &PostprocessResult, severity: Severity) -> usize {
    result
        .all_diagnostics()
        .filter(|(_, d)| d.severity == severity)
        .count()
}

// ============================================================================
// Navigation
// ============================================================================

/// The toctree as an indented outline; empty when there is no root page.
pub fn format_navigation(metadata: &Metadata) -> Vec<String> {
    let Some(root) = &metadata.toctree else {
        return Vec::new();
    };
    let title = match text_of(&root.title) {
        t if t.is_empty() => metadata.title.clone(),
        t => t,
    };
    let mut lines = vec![format!("{} → /", title)];
    for (i, child) in root.children.iter().enumerate() {
        format_toc_node(child, i + 1, 0, &mut lines);
    }
    lines
}

fn format_toc_node(node: &TocNode, position: usize, depth: usize, lines: &mut Vec<String>) {
    let destination = node
        .slug
        .as_deref()
        .or(node.url.as_deref())
        .unwrap_or_default();
    let title = match text_of(&node.title) {
        t if t.is_empty() => format!("({destination})"),
        t => t,
    };
    lines.push(format!(
        "{}{} {} → {}",
        indent(depth),
        format_index(position),
        title,
        destination
    ));
    for (i, child) in node.children.iter().enumerate() {
        format_toc_node(child, i + 1, depth + 1, lines);
    }
}

pub fn print_navigation(metadata: &Metadata) {
    for line in format_navigation(metadata) {
        println!("{}", line);
    }
}

// ============================================================================
// Summary
// ============================================================================

pub fn format_summary(result: &PostprocessResult) -> Vec<String> {
    let errors = count_severity(result, Severity::Error);
    let warnings = count_severity(result, Severity::Warning);
    vec![format!(
        "Resolved {}: {}, {}",
        plural(result.pages.len(), "page"),
        plural(errors, "error"),
        plural(warnings, "warning")
    )]
}

pub fn print_summary(result: &PostprocessResult) {
    for line in format_summary(result) {
        println!("{}", line);
    }
}

/// Where build outputs went.
pub fn format_written(output: &Path, pages: usize) -> Vec<String> {
    vec![
        format!("Wrote {} → {}", plural(pages, "page"), output.display()),
        format!("{}metadata.json", indent(1)),
        format!("{}diagnostics.json", indent(1)),
    ]
}

pub fn print_written(output: &Path, pages: usize) {
    for line in format_written(output, pages) {
        println!("{}", line);
    }
}
