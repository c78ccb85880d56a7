//! Project configuration module.
//!
//! Handles loading, validating, and merging `docforest.toml`. Stock defaults
//! are serialized to a TOML value, the user's file is merged on top, and the
//! result is deserialized with unknown keys rejected.
//!
//! ## Config File Location
//!
//! Place `docforest.toml` in the source root, next to the page JSON files:
//!
//! ```text
//! source/
//! ├── docforest.toml
//! ├── index.json
//! └── tutorial/
//!     └── install.json
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! title = ""                              # Project title, copied into metadata
//! intersphinx = []                        # objects.inv URLs to resolve against
//! toc_landing_pages = []                  # Slugs whose toctree node is not a drawer
//! inventory_cache_dir = ".docforest-cache"
//!
//! [substitutions]
//! version = "7.0"                         # |version| expands to this text
//!
//! [page_groups]
//! drivers = ["drivers/python", "drivers/node"]
//!
//! [deprecated_versions]
//! manual = ["v2.2", "v2.4"]
//!
//! [role_prefixes]
//! "py:class" = "pymongo"                  # Stripped from external titles
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::ast::{Node, Text};
use crate::types::Span;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the source root.
pub const CONFIG_FILENAME: &str = "docforest.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Project configuration loaded from `docforest.toml`.
///
/// All fields have defaults; a user file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub title: String,
    /// Project-wide substitutions, name → replacement text.
    pub substitutions: BTreeMap<String, String>,
    /// Pre-parsed substitution content supplied by the caller. Takes
    /// precedence over the plain-text entry of the same name.
    #[serde(skip)]
    pub substitution_nodes: BTreeMap<String, Vec<Node>>,
    pub intersphinx: Vec<String>,
    pub toc_landing_pages: Vec<String>,
    pub page_groups: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated_versions: Option<BTreeMap<String, Vec<String>>>,
    /// `domain:role` → name prefix stripped when titling external targets.
    pub role_prefixes: BTreeMap<String, String>,
    /// Relative to the source root unless absolute.
    pub inventory_cache_dir: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            substitutions: BTreeMap::new(),
            substitution_nodes: BTreeMap::new(),
            intersphinx: Vec::new(),
            toc_landing_pages: Vec::new(),
            page_groups: BTreeMap::new(),
            deprecated_versions: None,
            role_prefixes: BTreeMap::new(),
            inventory_cache_dir: ".docforest-cache".to_string(),
        }
    }
}

impl ProjectConfig {
    /// Validate values that deserialization alone cannot check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for url in &self.intersphinx {
            url::Url::parse(url).map_err(|e| {
                ConfigError::Validation(format!("intersphinx URL {url:?} is invalid: {e}"))
            })?;
        }
        if let Some(name) = self.substitutions.keys().find(|k| k.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "substitution names must not be blank: {name:?}"
            )));
        }
        for key in self.role_prefixes.keys() {
            match key.split_once(':') {
                Some((domain, role)) if !domain.is_empty() && !role.is_empty() => {}
                _ => {
                    return Err(ConfigError::Validation(format!(
                        "role_prefixes keys must look like \"domain:role\", got {key:?}"
                    )));
                }
            }
        }
        if self.inventory_cache_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "inventory_cache_dir must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Replacement content for a project-wide substitution.
    pub fn substitution(&self, name: &str) -> Option<Vec<Node>> {
        if let Some(nodes) = self.substitution_nodes.get(name) {
            return Some(nodes.clone());
        }
        self.substitutions.get(name).map(|value| {
            vec![Node::Text(Text {
                span: Span::default(),
                value: value.clone(),
            })]
        })
    }

    /// Absolute inventory cache directory for a project rooted at `root`.
    pub fn inventory_cache_path(&self, root: &Path) -> PathBuf {
        root.join(&self.inventory_cache_dir)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// The base layer every user file is merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ProjectConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `docforest.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ProjectConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ProjectConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `docforest.toml` in the given directory.
pub fn load_config(root: &Path) -> Result<ProjectConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(root)?)
}

/// A fully-commented stock `docforest.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# docforest configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Project title, copied into the metadata document.
title = ""

# Intersphinx inventories (objects.inv URLs). References that are not
# defined locally are resolved against these, in order.
intersphinx = []

# Slugs whose toctree entry is a landing page rather than a drawer.
toc_landing_pages = []

# Where downloaded inventories are cached, relative to the source root.
# A cached inventory younger than one hour is used without network access.
inventory_cache_dir = ".docforest-cache"

# ---------------------------------------------------------------------------
# Substitutions
# ---------------------------------------------------------------------------
# Project-wide |name| replacements. Page-local definitions win.
[substitutions]
# version = "7.0"

# ---------------------------------------------------------------------------
# Page groups
# ---------------------------------------------------------------------------
# Named lists of slugs copied into the metadata document. Slugs that do not
# name a titled page are dropped with a warning.
[page_groups]
# drivers = ["drivers/python", "drivers/node"]

# ---------------------------------------------------------------------------
# Role prefixes
# ---------------------------------------------------------------------------
# "domain:role" = "prefix". For external targets without a display name,
# "prefix." is stripped from the target name to build the link title.
[role_prefixes]
# "py:class" = "pymongo"

# ---------------------------------------------------------------------------
# Deprecated versions
# ---------------------------------------------------------------------------
# Copied verbatim into the metadata document when present.
# [deprecated_versions]
# manual = ["v2.2", "v2.4"]
"##
}
