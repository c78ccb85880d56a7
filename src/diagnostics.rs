//! Severity-tagged, span-located problems reported by the passes.
//!
//! Nothing in the postprocessor aborts on bad input: every recoverable
//! problem becomes a [`Diagnostic`] attached to the file being visited, and
//! the caller decides whether error-severity diagnostics fail a build.
//!
//! Messages come from the `#[error]` attribute on each [`DiagnosticKind`]
//! variant; kinds that carry structured data (candidate lists, tab sets,
//! suggestions) keep it in their fields so tools can consume it directly.

use crate::types::{END_OF_LINE, Span};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum DiagnosticKind {
    // Includes
    #[error("Cannot open included file: {path}")]
    CannotOpenFile { path: String },
    #[error("Circular include of {path}")]
    CircularInclude { path: String },
    #[error("Could not find the {option} text \"{marker}\" in {path}")]
    IncludeMarkerNotFound {
        option: String,
        marker: String,
        path: String,
    },
    #[error("Include bounds are reversed: \"{start_after}\" appears after \"{end_before}\" in {path}")]
    IncludeBoundsReversed {
        start_after: String,
        end_before: String,
        path: String,
    },

    // Substitutions
    #[error("{}", substitution_message(.name, .circular))]
    SubstitutionRefError { name: String, circular: bool },

    // Structure and tabs
    #[error("Directive \"{name}\" should only appear once per page")]
    DuplicateDirective { name: String },
    #[error("Only \"tab\" directives may appear inside a tabs directive, found {found}")]
    TabMustBeDirective { found: String },
    #[error("Expected tabs directive when using tabs-selector directive")]
    ExpectedTabs,
    #[error("{}", missing_tab_message(.tabs))]
    MissingTab { tabs: BTreeSet<String> },
    #[error("'.. option::' must follow '.. program::'")]
    MissingOption,

    // Linking
    #[error("Target not found: \"{name}:{target}\"{}", did_you_mean(.suggestions))]
    TargetNotFound {
        name: String,
        target: String,
        suggestions: Vec<String>,
    },
    #[error("Ambiguous target: \"{name}:{target}\". Locations: {}", .candidates.join(", "))]
    AmbiguousTarget {
        name: String,
        target: String,
        candidates: Vec<String>,
    },
    #[error("\"{name}\" expected a path argument")]
    ExpectedPathArg { name: String },
    #[error("Page has no title: {target}")]
    UnnamedPage { target: String },
    #[error("Could not locate toctree entry {entry}")]
    MissingTocTreeEntry { entry: String },
}

fn substitution_message(name: &str, circular: &bool) -> String {
    if *circular {
        format!("Circular substitution definition referenced: \"{name}\"")
    } else {
        format!("Substitution reference could not be replaced: \"|{name}|\"")
    }
}

fn missing_tab_message(tabs: &BTreeSet<String>) -> String {
    let tabs: Vec<&str> = tabs.iter().map(String::as_str).collect();
    format!(
        "One or more set of tabs on this page was missing the following tab(s): {}",
        tabs.join(", ")
    )
}

fn did_you_mean(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(". Did you mean: {}?", suggestions.join(", "))
    }
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::AmbiguousTarget { .. } | DiagnosticKind::DuplicateDirective { .. } => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    /// Close matches offered to the user, if this kind supports them.
    pub fn did_you_mean(&self) -> &[String] {
        match self {
            DiagnosticKind::TargetNotFound { suggestions, .. } => suggestions,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    #[serde(flatten)]
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub start: Span,
    pub end: Span,
}

impl Diagnostic {
    /// A diagnostic covering `start` through the end of the same line.
    pub fn new(kind: DiagnosticKind, start: Span) -> Self {
        Self::spanning(kind, start, Span::new(start.line, END_OF_LINE))
    }

    pub fn spanning(kind: DiagnosticKind, start: Span, end: Span) -> Self {
        Self {
            severity: kind.severity(),
            message: kind.to_string(),
            kind,
            start,
            end,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}): {}", self.severity, self.start.line, self.message)
    }
}
