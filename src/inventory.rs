//! Intersphinx inventory files (`objects.inv`, version 2).
//!
//! ```text
//! # Sphinx inventory version 2
//! # Project: MongoDB Manual
//! # Version: 7.0
//! # The remainder of this file is compressed using zlib.
//! <zlib body>
//! ```
//!
//! Each body line is `NAME DOMAIN:ROLE PRIORITY URI DISPNAME`. `NAME` may
//! itself contain spaces, so a line is split at the first `x:y` token that is
//! followed by an integer priority and a URI. A `URI` ending in `$` stands
//! for the name, and a `DISPNAME` of `-` means "same as the name".

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use thiserror::Error;
use tracing::warn;

const HEADER_VERSION: &str = "# Sphinx inventory version 2";
const HEADER_PROJECT: &str = "# Project: ";
const HEADER_VERSION_STRING: &str = "# Version: ";
const HEADER_COMPRESSED: &str = "# The remainder of this file is compressed using zlib.";

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error fetching {url}: {message}")]
    Http { url: String, message: String },
    #[error("Invalid inventory header: {0}")]
    Header(String),
    #[error("Inventory body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("Invalid inventory URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Inventory {field} may not contain a newline: {value:?}")]
    EmbeddedNewline { field: &'static str, value: String },
    #[error("Inventory {field} {value:?} would not read back unchanged: {reason}")]
    Unencodable {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// One entry of an inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDefinition {
    pub name: String,
    pub domain: String,
    pub role: String,
    pub priority: i32,
    /// Base URL the `uri` is relative to.
    pub uri_base: String,
    pub uri: String,
    pub display_name: Option<String>,
}

impl TargetDefinition {
    /// `domain:role:name`, the key used for lookups.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.domain, self.role, self.name)
    }

    /// Whether the entry survives a write and re-read unchanged.
    ///
    /// The line format is space-separated with a free-form name, so some
    /// values cannot be told apart from the fields around them once written.
    pub fn check_encodable(&self) -> Result<(), InventoryError> {
        reject_newline("name", &self.name)?;
        reject_newline("domain", &self.domain)?;
        reject_newline("role", &self.role)?;
        reject_newline("uri", &self.uri)?;

        let unencodable = |field, value: &str, reason| {
            Err(InventoryError::Unencodable {
                field,
                value: value.to_string(),
                reason,
            })
        };
        if self.name.trim().is_empty() {
            return unencodable("name", &self.name, "names must not be blank");
        }
        if self.name != self.name.trim_end() {
            return unencodable("name", &self.name, "trailing whitespace is dropped");
        }
        let name_tokens = tokens(&self.name);
        if (1..name_tokens.len().saturating_sub(1))
            .any(|i| is_role_token(name_tokens[i].1) && name_tokens[i + 1].1.parse::<i32>().is_ok())
        {
            return unencodable(
                "name",
                &self.name,
                "contains a `domain:role priority` sequence",
            );
        }
        for (field, value) in [("domain", &self.domain), ("role", &self.role)] {
            if value.is_empty() || value.contains([' ', ':']) {
                return unencodable(field, value, "must be non-empty without spaces or colons");
            }
        }
        if self.domain == "std" && self.role == "cmdoption" {
            return unencodable("role", &self.role, "std:cmdoption is read as std:option");
        }
        if self.uri.is_empty() || self.uri.contains(' ') {
            return unencodable("uri", &self.uri, "must be non-empty without spaces");
        }
        if let Some(display) = &self.display_name {
            reject_newline("display name", display)?;
            if display == "-" {
                return unencodable("display name", display, "`-` means no display name");
            }
            if display.is_empty() || display.trim() != display {
                return unencodable(
                    "display name",
                    display,
                    "surrounding whitespace is dropped",
                );
            }
        }
        Ok(())
    }

    /// Absolute URL of the entry.
    ///
    /// - base `https://docs.x.org/`, uri `tutorial/#$`, name `intro`
    ///   → `https://docs.x.org/tutorial/#intro`
    pub fn resolve_uri(&self) -> Result<String, InventoryError> {
        let uri = match self.uri.strip_suffix('$') {
            Some(prefix) => format!("{prefix}{}", self.name),
            None => self.uri.clone(),
        };
        let base = url::Url::parse(&self.uri_base).map_err(|source| InventoryError::Url {
            url: self.uri_base.clone(),
            source,
        })?;
        base.join(&uri)
            .map(String::from)
            .map_err(|source| InventoryError::Url { url: uri, source })
    }
}

/// A parsed inventory, keyed by `domain:role:name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub base_url: String,
    pub project: String,
    pub version: String,
    pub targets: BTreeMap<String, TargetDefinition>,
}

impl Inventory {
    pub fn new(base_url: &str, project: &str, version: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            project: project.to_string(),
            version: version.to_string(),
            targets: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, definition: TargetDefinition) {
        self.targets.insert(definition.key(), definition);
    }

    pub fn get(&self, key: &str) -> Option<&TargetDefinition> {
        self.targets.get(key)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Parse the binary `objects.inv` format. `base_url` is the directory
    /// the inventory was fetched from; entry URIs are relative to it.
    pub fn parse(base_url: &str, bytes: &[u8]) -> Result<Self, InventoryError> {
        let mut rest = bytes;
        let mut header = Vec::with_capacity(4);
        for _ in 0..4 {
            let newline = rest
                .iter()
                .position(|&b| b == b'\n')
                .ok_or_else(|| InventoryError::Header("truncated header".into()))?;
            header.push(String::from_utf8(rest[..newline].to_vec())?);
            rest = &rest[newline + 1..];
        }

        if header[0].trim_end() != HEADER_VERSION {
            return Err(InventoryError::Header(format!(
                "unsupported version line: {}",
                header[0]
            )));
        }
        let project = header[1]
            .strip_prefix(HEADER_PROJECT)
            .ok_or_else(|| InventoryError::Header(format!("expected project: {}", header[1])))?;
        let version = header[2]
            .strip_prefix(HEADER_VERSION_STRING)
            .ok_or_else(|| InventoryError::Header(format!("expected version: {}", header[2])))?;
        if !header[3].contains("zlib") {
            return Err(InventoryError::Header(format!(
                "expected zlib marker: {}",
                header[3]
            )));
        }

        let mut body = Vec::new();
        ZlibDecoder::new(rest).read_to_end(&mut body)?;
        let body = String::from_utf8(body)?;

        let mut inventory = Inventory::new(base_url, project.trim_end(), version.trim_end());
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            match parse_line(base_url, line) {
                Some(definition) => inventory.insert(definition),
                None => warn!(line, base_url, "skipping malformed inventory line"),
            }
        }
        Ok(inventory)
    }

    /// Serialize back to the binary format.
    pub fn dumps(&self) -> Result<Vec<u8>, InventoryError> {
        for (field, value) in [("project", &self.project), ("version", &self.version)] {
            reject_newline(field, value)?;
            if value.trim_end() != value.as_str() {
                return Err(InventoryError::Unencodable {
                    field,
                    value: value.clone(),
                    reason: "trailing whitespace is dropped",
                });
            }
        }

        let mut body = String::new();
        for definition in self.targets.values() {
            definition.check_encodable()?;
            body.push_str(&format!(
                "{} {}:{} {} {} {}\n",
                definition.name,
                definition.domain,
                definition.role,
                definition.priority,
                definition.uri,
                definition.display_name.as_deref().unwrap_or("-")
            ));
        }

        let mut out = format!(
            "{HEADER_VERSION}\n{HEADER_PROJECT}{}\n{HEADER_VERSION_STRING}{}\n{HEADER_COMPRESSED}\n",
            self.project, self.version
        )
        .into_bytes();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(6));
        encoder.write_all(body.as_bytes())?;
        out.extend(encoder.finish()?);
        Ok(out)
    }
}

fn reject_newline(field: &'static str, value: &str) -> Result<(), InventoryError> {
    if value.contains('\n') || value.contains('\r') {
        return Err(InventoryError::EmbeddedNewline {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Byte offset and text of each space-separated token.
fn tokens(line: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in line.char_indices() {
        match (c == ' ', start) {
            (true, Some(s)) => {
                out.push((s, &line[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((s, &line[s..]));
    }
    out
}

/// `domain:role`, both non-empty, exactly one colon.
fn is_role_token(token: &str) -> bool {
    token
        .split_once(':')
        .is_some_and(|(d, r)| !d.is_empty() && !r.is_empty() && !r.contains(':'))
}

fn parse_line(base_url: &str, line: &str) -> Option<TargetDefinition> {
    let tokens = tokens(line);
    let role_at = (1..tokens.len().saturating_sub(2))
        .find(|&i| is_role_token(tokens[i].1) && tokens[i + 1].1.parse::<i32>().is_ok())?;

    let name = line[..tokens[role_at].0].trim_end();
    let (domain, role) = tokens[role_at].1.split_once(':')?;
    let priority = tokens[role_at + 1].1.parse().ok()?;
    let uri = tokens[role_at + 2].1;
    let display = tokens
        .get(role_at + 3)
        .map(|(offset, _)| line[*offset..].trim_end())
        .filter(|d| *d != "-");

    let role = match (domain, role) {
        ("std", "cmdoption") => "option",
        (_, role) => role,
    };

    Some(TargetDefinition {
        name: name.to_string(),
        domain: domain.to_string(),
        role: role.to_string(),
        priority,
        uri_base: base_url.to_string(),
        uri: uri.to_string(),
        display_name: display.map(str::to_string),
    })
}
