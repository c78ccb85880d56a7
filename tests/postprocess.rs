//! End-to-end tests of the postprocessor against pages in their JSON wire
//! form, the way the CLI receives them from the tokenizer.
//!
//! Run with: cargo test --test postprocess

use docforest::config::ProjectConfig;
use docforest::diagnostics::DiagnosticKind;
use docforest::postprocess::{PostprocessResult, Postprocessor};
use docforest::targets::TargetDatabase;
use docforest::types::{FileId, Page};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};

fn text(value: &str) -> Value {
    json!({"type": "text", "value": value})
}

fn heading(id: &str, title: &str) -> Value {
    json!({"type": "heading", "id": id, "children": [text(title)]})
}

fn label(id: &str, title: &str) -> Value {
    json!({
        "type": "target",
        "domain": "std",
        "name": "label",
        "children": [{"type": "target_identifier", "ids": [id], "children": [text(title)]}]
    })
}

fn ref_role(domain: &str, name: &str, target: &str) -> Value {
    json!({
        "type": "ref_role",
        "position": {"start": {"line": 4}},
        "domain": domain,
        "name": name,
        "target": target,
        "children": []
    })
}

fn page(fileid: &str, children: Vec<Value>) -> Page {
    serde_json::from_value(json!({
        "ast": {"type": "root", "fileid": fileid, "children": children}
    }))
    .unwrap()
}

fn run_with(config: &ProjectConfig, pages: Vec<(&str, Vec<Value>)>) -> PostprocessResult {
    let pages: BTreeMap<FileId, Page> = pages
        .into_iter()
        .map(|(fileid, children)| (FileId::new(fileid), page(fileid, children)))
        .collect();
    Postprocessor::new(config, TargetDatabase::default()).run(pages)
}

fn run(pages: Vec<(&str, Vec<Value>)>) -> PostprocessResult {
    run_with(&ProjectConfig::default(), pages)
}

fn ast_json(result: &PostprocessResult, fileid: &str) -> Value {
    serde_json::to_value(&result.pages[&FileId::new(fileid)].ast).unwrap()
}

fn kinds(result: &PostprocessResult, fileid: &str) -> Vec<DiagnosticKind> {
    result.diagnostics[&FileId::new(fileid)]
        .iter()
        .map(|d| d.kind.clone())
        .collect()
}

// =========================================================================
// Substitutions
// =========================================================================

#[test]
fn substitution_resolution_is_idempotent() {
    let first = run(vec![(
        "a.txt",
        vec![
            json!({"type": "paragraph", "children": [{"type": "substitution_reference", "name": "db"}]}),
            json!({"type": "substitution_definition", "name": "db", "children": [text("MongoDB")]}),
        ],
    )]);
    let before = ast_json(&first, "a.txt");
    assert_eq!(before["children"][0]["children"][0]["children"][0]["value"], "MongoDB");

    let config = ProjectConfig::default();
    let second = Postprocessor::new(&config, TargetDatabase::default()).run(first.pages);
    assert_eq!(ast_json(&second, "a.txt"), before);
    assert!(kinds(&second, "a.txt").is_empty());
}

#[test]
fn two_step_substitution_cycle_terminates() {
    let result = run(vec![(
        "a.txt",
        vec![
            json!({"type": "substitution_definition", "name": "a",
                   "children": [{"type": "substitution_reference", "name": "b"}]}),
            json!({"type": "substitution_definition", "name": "b",
                   "children": [{"type": "substitution_reference", "name": "a"}]}),
        ],
    )]);
    let circular: Vec<DiagnosticKind> = kinds(&result, "a.txt")
        .into_iter()
        .filter(|k| matches!(k, DiagnosticKind::SubstitutionRefError { circular: true, .. }))
        .collect();
    assert_eq!(circular.len(), 1, "{circular:?}");
}

#[test]
fn three_step_substitution_cycle_terminates_with_empty_content() {
    let sub_ref = |name: &str| json!({"type": "substitution_reference", "name": name});
    let result = run(vec![(
        "a.txt",
        vec![
            json!({"type": "substitution_definition", "name": "a", "children": [sub_ref("b")]}),
            json!({"type": "substitution_definition", "name": "b", "children": [sub_ref("c")]}),
            json!({"type": "substitution_definition", "name": "c", "children": [sub_ref("a")]}),
            json!({"type": "paragraph", "children": [sub_ref("a")]}),
        ],
    )]);
    let circular = kinds(&result, "a.txt")
        .into_iter()
        .filter(|k| matches!(k, DiagnosticKind::SubstitutionRefError { circular: true, .. }))
        .count();
    assert_eq!(circular, 1);

    let paragraph = ast_json(&result, "a.txt")["children"][3].clone();
    assert!(!paragraph.to_string().contains("\"value\""), "{paragraph}");
}

// =========================================================================
// Headings and references
// =========================================================================

#[test]
fn duplicate_headings_are_disambiguated_in_order() {
    let result = run(vec![("a.txt", vec![heading("x", "X"), heading("x", "X")])]);
    let ast = ast_json(&result, "a.txt");
    assert_eq!(ast["children"][0]["id"], "x");
    assert_eq!(ast["children"][1]["id"], "x-1");
}

#[test]
fn unambiguous_label_resolves_to_fileid_and_html_id() {
    let result = run(vec![
        ("a.txt", vec![heading("a", "A"), label("foo", "Foo")]),
        ("b.txt", vec![json!({"type": "paragraph", "children": [ref_role("std", "label", "foo")]})]),
    ]);
    assert!(kinds(&result, "b.txt").is_empty());
    let role = &ast_json(&result, "b.txt")["children"][0]["children"][0];
    assert_eq!(role["fileid"], json!(["a", "std-label-foo"]));
    assert_eq!(role["children"][0]["value"], "Foo");
    assert_eq!(role["children"][0]["position"]["start"]["line"], 4);
}

#[test]
fn missing_target_reports_once_and_gets_a_title() {
    let result = run(vec![("a.txt", vec![ref_role("std", "label", "nowhere")])]);
    assert_eq!(
        kinds(&result, "a.txt"),
        vec![DiagnosticKind::TargetNotFound {
            name: "std:label".into(),
            target: "nowhere".into(),
            suggestions: vec![],
        }]
    );
    let role = &ast_json(&result, "a.txt")["children"][0];
    assert_eq!(role["children"][0]["value"], "nowhere");
}

#[test]
fn option_reference_uses_program_scoped_name_and_label() {
    let target = |name: &str, id: &str| {
        json!({
            "type": "target", "domain": "std", "name": name,
            "children": [{"type": "target_identifier", "ids": [id], "children": [text(id)]}]
        })
    };
    let result = run(vec![
        ("ref/mongod.txt", vec![target("program", "mongod"), target("option", "--port")]),
        ("b.txt", vec![ref_role("std", "option", "--port")]),
    ]);
    assert!(kinds(&result, "b.txt").is_empty());
    let role = &ast_json(&result, "b.txt")["children"][0];
    assert_eq!(role["target"], "mongod.--port");
    assert_eq!(role["fileid"], json!(["ref/mongod", "std-option-mongod.--port"]));
    assert_eq!(role["children"][0]["value"], "mongod --port");
}

#[test]
fn diagnostics_inside_includes_land_on_the_included_file() {
    let result = run(vec![
        (
            "a.txt",
            vec![json!({"type": "directive", "name": "include", "argument": [text("/includes/b.rst")]})],
        ),
        ("includes/b.rst", vec![ref_role("std", "label", "nowhere")]),
    ]);
    assert!(kinds(&result, "a.txt").is_empty());
    assert_eq!(kinds(&result, "includes/b.rst").len(), 2);
}

// =========================================================================
// Navigation
// =========================================================================

#[test]
fn two_page_toctree() {
    let result = run(vec![
        (
            "index.txt",
            vec![
                heading("home", "Home"),
                json!({"type": "toctree", "name": "toctree",
                       "entries": [{"slug": "page1"}, {"slug": "/page2", "title": "Second"}]}),
            ],
        ),
        ("page1.txt", vec![heading("one", "One")]),
        ("page2.txt", vec![heading("two", "Two")]),
    ]);
    let metadata = serde_json::to_value(&result.metadata).unwrap();
    assert_eq!(metadata["toctreeOrder"], json!(["/", "page1", "page2"]));
    assert_eq!(metadata["parentPaths"]["page1"], json!([]));
    assert_eq!(metadata["toctree"]["children"][0]["title"][0]["value"], "One");
    assert_eq!(metadata["toctree"]["children"][1]["title"][0]["value"], "Second");
    assert_eq!(metadata["toctree"]["children"][0]["options"]["drawer"], true);
    assert_eq!(metadata["slugToTitle"]["page2"][0]["value"], "Two");
}

// =========================================================================
// Tabs
// =========================================================================

fn tabs(ids: &[&str]) -> Value {
    let children: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({"type": "directive", "name": "tab", "argument": [text(id)],
                   "options": {"tabid": id}, "children": []})
        })
        .collect();
    json!({"type": "directive", "name": "tabs", "options": {"tabset": "drivers"}, "children": children})
}

#[test]
fn tabset_mismatch_reports_symmetric_difference() {
    let result = run(vec![(
        "a.txt",
        vec![
            json!({"type": "directive", "name": "tabs-selector"}),
            tabs(&["a", "b"]),
            tabs(&["a", "c"]),
        ],
    )]);
    let expected: BTreeSet<String> = ["b", "c"].iter().map(|s| s.to_string()).collect();
    assert_eq!(kinds(&result, "a.txt"), vec![DiagnosticKind::MissingTab { tabs: expected }]);
    let ast = ast_json(&result, "a.txt");
    assert_eq!(ast["options"]["selectors"]["drivers"]["a"][0]["value"], "a");
}

// =========================================================================
// Include bounding
// =========================================================================

fn comment(value: &str) -> Value {
    json!({"type": "comment", "children": [text(value)]})
}

fn bounded_include(start: &str, end: &str) -> Value {
    json!({
        "type": "directive",
        "name": "include",
        "argument": [text("/includes/steps.rst")],
        "options": {"start-after": start, "end-before": end}
    })
}

fn steps() -> Vec<Value> {
    vec![
        json!({"type": "paragraph", "children": [text("outside before")]}),
        comment("start"),
        heading("kept", "Kept"),
        comment("end"),
        json!({"type": "paragraph", "children": [text("outside after")]}),
    ]
}

#[test]
fn include_keeps_only_the_bounded_range() {
    let result = run(vec![
        ("a.txt", vec![bounded_include("start", "end")]),
        ("includes/steps.rst", steps()),
    ]);
    assert!(kinds(&result, "a.txt").is_empty());
    let spliced = ast_json(&result, "a.txt")["children"][0]["children"][0].clone();
    assert_eq!(spliced["fileid"], "includes/steps.rst");
    let body = spliced["children"].as_array().unwrap();
    assert_eq!(body.len(), 3);
    assert_eq!(body[1]["type"], "heading");
    assert!(!spliced.to_string().contains("outside"));
}

#[test]
fn reversed_include_bounds_keep_nothing() {
    let result = run(vec![
        ("a.txt", vec![bounded_include("end", "start")]),
        ("includes/steps.rst", steps()),
    ]);
    assert!(matches!(
        &kinds(&result, "a.txt")[..],
        [DiagnosticKind::IncludeBoundsReversed { .. }]
    ));
    let spliced = &ast_json(&result, "a.txt")["children"][0]["children"][0];
    assert_eq!(spliced["children"], json!([]));
}

// =========================================================================
// Metadata
// =========================================================================

#[test]
fn metadata_passes_config_through() {
    let mut config = ProjectConfig {
        title: "Manual".into(),
        deprecated_versions: Some(BTreeMap::from([(
            "manual".to_string(),
            vec!["v2.2".to_string()],
        )])),
        ..ProjectConfig::default()
    };
    config
        .page_groups
        .insert("start".into(), vec!["a".into(), "/missing".into()]);
    let result = run_with(&config, vec![("a.txt", vec![heading("a", "A")])]);
    let metadata = serde_json::to_value(&result.metadata).unwrap();
    assert_eq!(metadata["title"], "Manual");
    assert_eq!(metadata["deprecated_versions"], json!({"manual": ["v2.2"]}));
    assert_eq!(metadata["pageGroups"], json!({"start": ["a"]}));
    assert_eq!(metadata["toctree"], json!({}));
}

#[test]
fn empty_page_set_is_a_noop() {
    let result = run(vec![]);
    assert!(result.pages.is_empty());
    assert!(result.diagnostics.is_empty());
}
