//! Registry of everything a cross-reference can point at.
//!
//! Two sources feed the database:
//!
//! - **Local definitions**, registered by the postprocessor while it indexes
//!   headings, explicit targets and program options. Keys are
//!   `domain:role:alias`, and one definition is stored per alias.
//! - **External inventories** loaded through the [`InventoryCache`] on
//!   [`TargetDatabase::reset`].
//!
//! Lookups return every candidate: local definitions in registration order,
//! then at most one match per inventory. Choosing between several candidates
//! is the reference pass's job.

use crate::ast::{Node, Text, text_of};
use crate::cache::{Fetch, InventoryCache};
use crate::config::ProjectConfig;
use crate::inventory::{Inventory, InventoryError, TargetDefinition};
use crate::naming::{closest_matches, normalize_target};
use crate::types::{FileId, Span};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

const SUGGESTION_LIMIT: usize = 5;

/// A target defined somewhere in this project.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDefinition {
    pub canonical_name: String,
    pub fileid: FileId,
    pub title: Vec<Node>,
    pub html_id: String,
}

/// One candidate returned by [`TargetDatabase::lookup`].
#[derive(Debug, Clone, PartialEq)]
pub enum TargetResult {
    Local {
        canonical_name: String,
        slug: String,
        html_id: String,
        title: Vec<Node>,
    },
    External {
        canonical_name: String,
        url: String,
        title: Vec<Node>,
    },
}

impl TargetResult {
    pub fn canonical_name(&self) -> &str {
        match self {
            TargetResult::Local { canonical_name, .. }
            | TargetResult::External { canonical_name, .. } => canonical_name,
        }
    }

    pub fn title(&self) -> &[Node] {
        match self {
            TargetResult::Local { title, .. } | TargetResult::External { title, .. } => title,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, TargetResult::Local { .. })
    }

    /// Where the candidate lives, for ambiguity messages.
    pub fn location(&self) -> String {
        match self {
            TargetResult::Local { slug, html_id, .. } => format!("{slug}#{html_id}"),
            TargetResult::External { url, .. } => url.clone(),
        }
    }
}

/// `domain:role:target` with the target whitespace-normalized.
pub fn target_key(domain: &str, role: &str, target: &str) -> String {
    format!("{domain}:{role}:{}", normalize_target(target))
}

#[derive(Debug, Clone, Default)]
pub struct TargetDatabase {
    local: BTreeMap<String, Vec<LocalDefinition>>,
    inventories: Vec<Inventory>,
    /// `domain:role` → prefix stripped from external names when titling.
    role_prefixes: BTreeMap<String, String>,
}

impl TargetDatabase {
    pub fn new(role_prefixes: BTreeMap<String, String>) -> Self {
        Self {
            role_prefixes,
            ..Self::default()
        }
    }

    /// Clear everything, then load every configured inventory.
    ///
    /// A failed fetch is fatal: resolving against a partial set of
    /// inventories would report bogus missing targets.
    pub fn reset(
        &mut self,
        config: &ProjectConfig,
        cache: &mut InventoryCache,
        fetcher: &dyn Fetch,
    ) -> Result<(), InventoryError> {
        *self = Self::new(config.role_prefixes.clone());
        for url in &config.intersphinx {
            let inventory = cache.load(url, fetcher)?;
            debug!(url, entries = inventory.len(), "loaded inventory");
            self.inventories.push(inventory);
        }
        Ok(())
    }

    pub fn add_inventory(&mut self, inventory: Inventory) {
        self.inventories.push(inventory);
    }

    pub fn inventories(&self) -> &[Inventory] {
        &self.inventories
    }

    /// Drop local definitions, keeping loaded inventories.
    pub fn clear_local(&mut self) {
        self.local.clear();
    }

    /// Register a target under every alias.
    ///
    /// The canonical name is the alias with the most `.`-separated segments,
    /// so `mongod.--port` wins over `--port`. The first alias wins a tie.
    pub fn define_local_target(
        &mut self,
        domain: &str,
        role: &str,
        aliases: &[String],
        fileid: &FileId,
        title: &[Node],
        html_id: &str,
    ) {
        let Some(canonical) = aliases
            .iter()
            .reduce(|best, a| if a.split('.').count() > best.split('.').count() { a } else { best })
        else {
            return;
        };

        for alias in aliases {
            self.local
                .entry(target_key(domain, role, alias))
                .or_default()
                .push(LocalDefinition {
                    canonical_name: canonical.clone(),
                    fileid: fileid.clone(),
                    title: title.to_vec(),
                    html_id: html_id.to_string(),
                });
        }
    }

    /// Every candidate for `key`: local definitions, then one per inventory.
    pub fn lookup(&self, key: &str) -> Vec<TargetResult> {
        let key = normalize_target(key);
        let mut results: Vec<TargetResult> = self
            .local
            .get(&key)
            .into_iter()
            .flatten()
            .map(|def| TargetResult::Local {
                canonical_name: def.canonical_name.clone(),
                slug: def.fileid.without_known_suffix().to_string(),
                html_id: def.html_id.clone(),
                title: def.title.clone(),
            })
            .collect();

        let lowered = key.to_lowercase();
        for inventory in &self.inventories {
            let Some(definition) = inventory.get(&key).or_else(|| inventory.get(&lowered)) else {
                continue;
            };
            match definition.resolve_uri() {
                Ok(url) => results.push(TargetResult::External {
                    canonical_name: definition.name.clone(),
                    url,
                    title: vec![self.external_title(definition)],
                }),
                Err(e) => warn!(key = %key, error = %e, "skipping inventory entry with bad URI"),
            }
        }
        results
    }

    fn external_title(&self, definition: &TargetDefinition) -> Node {
        let value = match &definition.display_name {
            Some(display) => display.clone(),
            None => {
                let role_key = format!("{}:{}", definition.domain, definition.role);
                self.role_prefixes
                    .get(&role_key)
                    .and_then(|prefix| definition.name.strip_prefix(&format!("{prefix}.")))
                    .unwrap_or(&definition.name)
                    .to_string()
            }
        };
        Node::Text(Text {
            span: Span::default(),
            value,
        })
    }

    /// The configured prefix for a `domain:role`, if any.
    pub fn role_prefix(&self, domain: &str, role: &str) -> Option<&str> {
        self.role_prefixes
            .get(&format!("{domain}:{role}"))
            .map(String::as_str)
    }

    /// Close matches for a key that was not found, as bare target names.
    pub fn suggestions(&self, key: &str) -> Vec<String> {
        let key = normalize_target(key);
        let Some((prefix, needle)) = split_key(&key) else {
            return Vec::new();
        };
        let candidates: BTreeSet<&str> = self
            .local
            .keys()
            .map(String::as_str)
            .chain(
                self.inventories
                    .iter()
                    .flat_map(|inv| inv.targets.keys().map(String::as_str)),
            )
            .filter_map(|k| split_key(k).filter(|(p, _)| *p == prefix).map(|(_, t)| t))
            .collect();
        closest_matches(needle, candidates, SUGGESTION_LIMIT)
    }

    /// Serialize local definitions as an inventory rooted at `base_url`.
    ///
    /// Only the first definition of each key is written. A title of `-`
    /// is dropped, since the line format reads it as "same as the name".
    /// Entries the line format cannot carry are left out with a warning.
    pub fn generate_inventory(&self, base_url: &str, project: &str, version: &str) -> Inventory {
        let mut inventory = Inventory::new(base_url, project, version);
        for (key, definitions) in &self.local {
            let (Some(definition), Some((prefix, name))) = (definitions.first(), split_key(key))
            else {
                continue;
            };
            let Some((domain, role)) = prefix.split_once(':') else {
                continue;
            };

            let slug = definition.fileid.without_known_suffix();
            let mut uri = if slug == "index" {
                "./".to_string()
            } else {
                format!("{slug}/")
            };
            if !(domain == "std" && role == "doc") {
                uri.push('#');
                uri.push_str(&definition.html_id);
            }

            let display = normalize_target(&text_of(&definition.title));
            let entry = TargetDefinition {
                name: name.to_string(),
                domain: domain.to_string(),
                role: role.to_string(),
                priority: -1,
                uri_base: base_url.to_string(),
                uri,
                display_name: (!display.is_empty() && display != name && display != "-")
                    .then_some(display),
            };
            match entry.check_encodable() {
                Ok(()) => inventory.insert(entry),
                Err(e) => warn!(key = %key, error = %e, "leaving target out of generated inventory"),
            }
        }
        inventory
    }
}

/// Split `domain:role:target` into (`domain:role`, `target`).
fn split_key(key: &str) -> Option<(&str, &str)> {
    let first = key.find(':')?;
    let second = first + 1 + key[first + 1..].find(':')?;
    Some((&key[..second], &key[second + 1..]))
}
