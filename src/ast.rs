//! The AST contract shared with the external tokenizer.
//!
//! [`Node`] is a closed sum type: every pass matches on it exhaustively, so a
//! new node kind is a compile error in each pass rather than a silent no-op.
//!
//! ## Serialization
//!
//! Nodes serialize to JSON with an internal `"type"` tag:
//!
//! ```text
//! {"type": "heading", "position": {"start": {"line": 3}}, "id": "install",
//!  "children": [{"type": "text", "position": {"start": {"line": 3}}, "value": "Install"}]}
//! ```
//!
//! - `None` fields and empty maps are omitted.
//! - Maps are ordered, so output is deterministic.
//! - Every non-empty field round-trips.
//!
//! Ownership is tree-shaped: a child belongs to exactly one parent, and
//! "including" another page means cloning its tree.

use crate::types::{FileId, Span};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Directive/role option map.
pub type Options = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Root(Root),
    Section(Parent),
    Heading(Heading),
    Paragraph(Parent),
    Emphasis(Parent),
    Strong(Parent),
    Literal(Parent),
    Comment(Parent),
    Transition(Leaf),
    Text(Text),
    Code(Code),
    List(List),
    ListItem(Parent),
    DefinitionList(Parent),
    DefinitionListItem(DefinitionListItem),
    Directive(Directive),
    #[serde(rename = "toctree")]
    TocTreeDirective(TocTreeDirective),
    Target(Target),
    TargetIdentifier(TargetIdentifier),
    SubstitutionDefinition(Substitution),
    SubstitutionReference(Substitution),
    RefRole(RefRole),
    Reference(Reference),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Root {
    #[serde(rename = "position", with = "position", default)]
    pub span: Span,
    pub fileid: FileId,
    /// Page-level metadata accumulated by the passes (e.g. `selectors`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub children: Vec<Node>,
}

/// Generic container used by every variant with no fields of its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parent {
    #[serde(rename = "position", with = "position", default)]
    pub span: Span,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    #[serde(rename = "position", with = "position", default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    #[serde(rename = "position", with = "position", default)]
    pub span: Span,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    #[serde(rename = "position", with = "position", default)]
    pub span: Span,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    #[serde(rename = "position", with = "position", default)]
    pub span: Span,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    #[serde(rename = "position", with = "position", default)]
    pub span: Span,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumtype: Option<String>,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionListItem {
    #[serde(rename = "position", with = "position", default)]
    pub span: Span,
    #[serde(default)]
    pub term: Vec<Node>,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    #[serde(rename = "position", with = "position", default)]
    pub span: Span,
    #[serde(default)]
    pub domain: String,
    pub name: String,
    /// Inline nodes after `::`. Walked before `children`.
    #[serde(default)]
    pub argument: Vec<Node>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: Options,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocTreeDirective {
    #[serde(rename = "position", with = "position", default)]
    pub span: Span,
    #[serde(default)]
    pub domain: String,
    pub name: String,
    #[serde(default)]
    pub argument: Vec<Node>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: Options,
    #[serde(default)]
    pub entries: Vec<TocTreeEntry>,
    #[serde(default)]
    pub children: Vec<Node>,
}

/// A toctree line: either an internal page or an external URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TocTreeEntryRepr", into = "TocTreeEntryRepr")]
pub struct TocTreeEntry {
    pub title: Option<String>,
    pub target: TocTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TocTarget {
    Slug(String),
    Url(String),
}

#[derive(Serialize, Deserialize)]
struct TocTreeEntryRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    slug: Option<String>,
}

impl TryFrom<TocTreeEntryRepr> for TocTreeEntry {
    type Error = String;

    fn try_from(repr: TocTreeEntryRepr) -> Result<Self, Self::Error> {
        let target = match (repr.url, repr.slug) {
            (Some(url), None) => TocTarget::Url(url),
            (None, Some(slug)) => TocTarget::Slug(slug),
            (Some(_), Some(_)) => return Err("toctree entry has both url and slug".into()),
            (None, None) => return Err("toctree entry has neither url nor slug".into()),
        };
        Ok(Self {
            title: repr.title,
            target,
        })
    }
}

impl From<TocTreeEntry> for TocTreeEntryRepr {
    fn from(entry: TocTreeEntry) -> Self {
        let (url, slug) = match entry.target {
            TocTarget::Url(url) => (Some(url), None),
            TocTarget::Slug(slug) => (None, Some(slug)),
        };
        Self {
            title: entry.title,
            url,
            slug,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "position", with = "position", default)]
    pub span: Span,
    pub domain: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refuri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_id: Option<String>,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetIdentifier {
    #[serde(rename = "position", with = "position", default)]
    pub span: Span,
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub children: Vec<Node>,
}

/// Shared shape of substitution definitions and references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substitution {
    #[serde(rename = "position", with = "position", default)]
    pub span: Span,
    pub name: String,
    #[serde(default)]
    pub children: Vec<Node>,
}

/// A cross-reference awaiting resolution.
///
/// `resolution` holds at most one of a local `(slug, html_id)` pair or an
/// external URL; the wire form uses separate `fileid` / `url` keys and input
/// carrying both is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RefRoleRepr", into = "RefRoleRepr")]
pub struct RefRole {
    pub span: Span,
    pub domain: String,
    pub name: String,
    pub target: String,
    pub flag: String,
    pub resolution: Option<Resolution>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Local { slug: String, html_id: String },
    External { url: String },
}

#[derive(Serialize, Deserialize)]
struct RefRoleRepr {
    #[serde(rename = "position", with = "position", default)]
    span: Span,
    domain: String,
    name: String,
    #[serde(default)]
    target: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    flag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fileid: Option<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default)]
    children: Vec<Node>,
}

impl TryFrom<RefRoleRepr> for RefRole {
    type Error = String;

    fn try_from(repr: RefRoleRepr) -> Result<Self, Self::Error> {
        let resolution = match (repr.fileid, repr.url) {
            (Some(_), Some(_)) => {
                return Err(format!(
                    "ref_role {}:{}:{} has both fileid and url",
                    repr.domain, repr.name, repr.target
                ));
            }
            (Some((slug, html_id)), None) => Some(Resolution::Local { slug, html_id }),
            (None, Some(url)) => Some(Resolution::External { url }),
            (None, None) => None,
        };
        Ok(Self {
            span: repr.span,
            domain: repr.domain,
            name: repr.name,
            target: repr.target,
            flag: repr.flag,
            resolution,
            children: repr.children,
        })
    }
}

impl From<RefRole> for RefRoleRepr {
    fn from(role: RefRole) -> Self {
        let (fileid, url) = match role.resolution {
            Some(Resolution::Local { slug, html_id }) => (Some((slug, html_id)), None),
            Some(Resolution::External { url }) => (None, Some(url)),
            None => (None, None),
        };
        Self {
            span: role.span,
            domain: role.domain,
            name: role.name,
            target: role.target,
            flag: role.flag,
            fileid,
            url,
            children: role.children,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "position", with = "position", default)]
    pub span: Span,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refuri: Option<String>,
    #[serde(default)]
    pub refname: String,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Root(n) => n.span,
            Node::Section(n)
            | Node::Paragraph(n)
            | Node::Emphasis(n)
            | Node::Strong(n)
            | Node::Literal(n)
            | Node::Comment(n)
            | Node::ListItem(n)
            | Node::DefinitionList(n) => n.span,
            Node::Transition(n) => n.span,
            Node::Heading(n) => n.span,
            Node::Text(n) => n.span,
            Node::Code(n) => n.span,
            Node::List(n) => n.span,
            Node::DefinitionListItem(n) => n.span,
            Node::Directive(n) => n.span,
            Node::TocTreeDirective(n) => n.span,
            Node::Target(n) => n.span,
            Node::TargetIdentifier(n) => n.span,
            Node::SubstitutionDefinition(n) | Node::SubstitutionReference(n) => n.span,
            Node::RefRole(n) => n.span,
            Node::Reference(n) => n.span,
        }
    }

    /// The wire `"type"` tag of this node.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Root(_) => "root",
            Node::Section(_) => "section",
            Node::Heading(_) => "heading",
            Node::Paragraph(_) => "paragraph",
            Node::Emphasis(_) => "emphasis",
            Node::Strong(_) => "strong",
            Node::Literal(_) => "literal",
            Node::Comment(_) => "comment",
            Node::Transition(_) => "transition",
            Node::Text(_) => "text",
            Node::Code(_) => "code",
            Node::List(_) => "list",
            Node::ListItem(_) => "list_item",
            Node::DefinitionList(_) => "definition_list",
            Node::DefinitionListItem(_) => "definition_list_item",
            Node::Directive(_) => "directive",
            Node::TocTreeDirective(_) => "toctree",
            Node::Target(_) => "target",
            Node::TargetIdentifier(_) => "target_identifier",
            Node::SubstitutionDefinition(_) => "substitution_definition",
            Node::SubstitutionReference(_) => "substitution_reference",
            Node::RefRole(_) => "ref_role",
            Node::Reference(_) => "reference",
        }
    }

    fn span_mut(&mut self) -> &mut Span {
        match self {
            Node::Root(n) => &mut n.span,
            Node::Section(n)
            | Node::Paragraph(n)
            | Node::Emphasis(n)
            | Node::Strong(n)
            | Node::Literal(n)
            | Node::Comment(n)
            | Node::ListItem(n)
            | Node::DefinitionList(n) => &mut n.span,
            Node::Transition(n) => &mut n.span,
            Node::Heading(n) => &mut n.span,
            Node::Text(n) => &mut n.span,
            Node::Code(n) => &mut n.span,
            Node::List(n) => &mut n.span,
            Node::DefinitionListItem(n) => &mut n.span,
            Node::Directive(n) => &mut n.span,
            Node::TocTreeDirective(n) => &mut n.span,
            Node::Target(n) => &mut n.span,
            Node::TargetIdentifier(n) => &mut n.span,
            Node::SubstitutionDefinition(n) | Node::SubstitutionReference(n) => &mut n.span,
            Node::RefRole(n) => &mut n.span,
            Node::Reference(n) => &mut n.span,
        }
    }

    /// Ordinary children, or `None` for leaves.
    ///
    /// Directive arguments and definition terms are not included.
    pub fn children(&self) -> Option<&Vec<Node>> {
        match self {
            Node::Root(n) => Some(&n.children),
            Node::Section(n)
            | Node::Paragraph(n)
            | Node::Emphasis(n)
            | Node::Strong(n)
            | Node::Literal(n)
            | Node::Comment(n)
            | Node::ListItem(n)
            | Node::DefinitionList(n) => Some(&n.children),
            Node::Heading(n) => Some(&n.children),
            Node::List(n) => Some(&n.children),
            Node::DefinitionListItem(n) => Some(&n.children),
            Node::Directive(n) => Some(&n.children),
            Node::TocTreeDirective(n) => Some(&n.children),
            Node::Target(n) => Some(&n.children),
            Node::TargetIdentifier(n) => Some(&n.children),
            Node::SubstitutionDefinition(n) | Node::SubstitutionReference(n) => {
                Some(&n.children)
            }
            Node::RefRole(n) => Some(&n.children),
            Node::Reference(n) => Some(&n.children),
            Node::Transition(_) | Node::Text(_) | Node::Code(_) => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Root(n) => Some(&mut n.children),
            Node::Section(n)
            | Node::Paragraph(n)
            | Node::Emphasis(n)
            | Node::Strong(n)
            | Node::Literal(n)
            | Node::Comment(n)
            | Node::ListItem(n)
            | Node::DefinitionList(n) => Some(&mut n.children),
            Node::Heading(n) => Some(&mut n.children),
            Node::List(n) => Some(&mut n.children),
            Node::DefinitionListItem(n) => Some(&mut n.children),
            Node::Directive(n) => Some(&mut n.children),
            Node::TocTreeDirective(n) => Some(&mut n.children),
            Node::Target(n) => Some(&mut n.children),
            Node::TargetIdentifier(n) => Some(&mut n.children),
            Node::SubstitutionDefinition(n) | Node::SubstitutionReference(n) => {
                Some(&mut n.children)
            }
            Node::RefRole(n) => Some(&mut n.children),
            Node::Reference(n) => Some(&mut n.children),
            Node::Transition(_) | Node::Text(_) | Node::Code(_) => None,
        }
    }

    /// Concatenated text of every `Text` descendant.
    pub fn get_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(&text.value),
            other => {
                for child in other.children().into_iter().flatten() {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Overwrite the span of this node and every descendant.
    ///
    /// Titles copied between files get the referencing node's position so
    /// diagnostics never point at lines of another file.
    pub fn set_span_recursive(&mut self, span: Span) {
        *self.span_mut() = span;
        match self {
            Node::Directive(d) => d.argument.iter_mut().for_each(|a| a.set_span_recursive(span)),
            Node::TocTreeDirective(d) => {
                d.argument.iter_mut().for_each(|a| a.set_span_recursive(span))
            }
            Node::DefinitionListItem(item) => {
                item.term.iter_mut().for_each(|t| t.set_span_recursive(span))
            }
            _ => {}
        }
        for child in self.children_mut().into_iter().flatten() {
            child.set_span_recursive(span);
        }
    }

    /// Immediate `TargetIdentifier` children of this node.
    pub fn target_identifiers(&self) -> impl Iterator<Item = &TargetIdentifier> {
        self.children().into_iter().flatten().filter_map(|c| match c {
            Node::TargetIdentifier(ti) => Some(ti),
            _ => None,
        })
    }
}

/// Concatenated text of a node sequence.
pub fn text_of(nodes: &[Node]) -> String {
    nodes.iter().map(Node::get_text).collect()
}

/// The deepest node of a linear (single-child) chain, if it has no children.
///
/// This is where an implicit title goes: `RefRole > Literal > []` yields the
/// `Literal`. Any node with two or more children, or a leaf, yields `None`.
pub fn title_injection_candidate(node: &mut Node) -> Option<&mut Node> {
    match node.children().map(Vec::len) {
        Some(0) => Some(node),
        Some(1) => title_injection_candidate(node.children_mut()?.first_mut()?),
        _ => None,
    }
}

/// `{"start": {"line": N[, "column": C]}}` on the wire.
mod position {
    use crate::types::{END_OF_LINE, Span};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Start {
        line: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        column: Option<usize>,
    }

    #[derive(Serialize, Deserialize)]
    struct Position {
        start: Start,
    }

    pub fn serialize<S: Serializer>(span: &Span, serializer: S) -> Result<S::Ok, S::Error> {
        Position {
            start: Start {
                line: span.line,
                column: (span.column != END_OF_LINE).then_some(span.column),
            },
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Span, D::Error> {
        let position = Position::deserialize(deserializer)?;
        Ok(Span::new(
            position.start.line,
            position.start.column.unwrap_or(END_OF_LINE),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use serde_json::json;

    #[test]
    fn get_text_concatenates_descendants() {
        let node = paragraph(vec![
            text("Install "),
            emphasis(vec![text("MongoDB")]),
            text(" now"),
        ]);
        assert_eq!(node.get_text(), "Install MongoDB now");
    }

    #[test]
    fn serialization_drops_none_and_empty_maps() {
        let node = Node::Target(Target {
            span: Span::line(2),
            domain: "std".into(),
            name: "label".into(),
            refuri: None,
            html_id: None,
            children: vec![],
        });
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "target",
                "position": {"start": {"line": 2}},
                "domain": "std",
                "name": "label",
                "children": []
            })
        );
    }

    #[test]
    fn position_keeps_known_column() {
        let mut node = text("x");
        node.set_span_recursive(Span::new(4, 7));
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["position"], json!({"start": {"line": 4, "column": 7}}));
    }

    #[test]
    fn ref_role_serializes_fileid_pair() {
        let mut node = ref_role("std", "label", "foo");
        if let Node::RefRole(role) = &mut node {
            role.resolution = Some(Resolution::Local {
                slug: "guide".into(),
                html_id: "std-label-foo".into(),
            });
        }
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["fileid"], json!(["guide", "std-label-foo"]));
        assert!(value.get("url").is_none());
        let back: Node = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn ref_role_with_fileid_and_url_is_rejected() {
        let value = json!({
            "type": "ref_role",
            "position": {"start": {"line": 1}},
            "domain": "std",
            "name": "label",
            "target": "foo",
            "fileid": ["a", "b"],
            "url": "https://example.com",
            "children": []
        });
        assert!(serde_json::from_value::<Node>(value).is_err());
    }

    #[test]
    fn toctree_entry_requires_slug_or_url() {
        let ok: TocTreeEntry = serde_json::from_value(json!({"slug": "/a"})).unwrap();
        assert_eq!(ok.target, TocTarget::Slug("/a".into()));
        assert!(serde_json::from_value::<TocTreeEntry>(json!({"title": "x"})).is_err());
    }

    #[test]
    fn directive_roundtrips_through_json() {
        let node = directive_with(
            "include",
            vec![text("/includes/a.rst")],
            &[("start-after", "begin")],
            vec![],
        );
        let json = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn set_span_recursive_rewrites_every_descendant() {
        let mut node = paragraph(vec![emphasis(vec![text("a")]), text("b")]);
        node.set_span_recursive(Span::line(42));
        assert_eq!(node.span(), Span::line(42));
        let children = node.children().unwrap();
        assert_eq!(children[0].children().unwrap()[0].span(), Span::line(42));
        assert_eq!(children[1].span(), Span::line(42));
    }

    #[test]
    fn kind_name_matches_wire_tag() {
        for node in [
            text("x"),
            paragraph(vec![]),
            ref_role("std", "label", "x"),
            directive_with("note", vec![], &[], vec![]),
        ] {
            let value = serde_json::to_value(&node).unwrap();
            assert_eq!(value["type"], node.kind_name());
        }
    }

    #[test]
    fn injection_candidate_dives_single_child_chain() {
        let mut node = ref_role_with_children("std", "label", "foo", vec![literal(vec![])]);
        let candidate = title_injection_candidate(&mut node).unwrap();
        assert!(matches!(candidate, Node::Literal(_)));
    }

    #[test]
    fn injection_candidate_none_when_title_present() {
        let mut node = ref_role_with_children("std", "label", "foo", vec![text("Title")]);
        assert!(title_injection_candidate(&mut node).is_none());
    }
}
