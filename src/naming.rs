//! Centralized name handling shared by the passes.
//!
//! Slugs, HTML ids, target keys and cache filenames are all derived from
//! user-written strings. Every pass goes through these helpers so the same
//! input always produces the same identifier:
//!
//! - `/tutorial/install.txt/` → slug `tutorial/install`
//! - `Install  MongoDB` → target key part `Install MongoDB`
//! - `std:label:My Label!` → html id part `My-Label-`
//! - `https://x.org/objects.inv` → cache file `https___x.org_objects.inv`

use crate::types::{FileId, KNOWN_SUFFIXES};

/// Strip surrounding slashes and one known source suffix.
///
/// - `"/tutorial/install.txt"` → `"tutorial/install"`
/// - `"reference/"` → `"reference"`
/// - `"/"` → `""`
pub fn clean_slug(slug: &str) -> String {
    let trimmed = slug.trim().trim_matches('/');
    KNOWN_SUFFIXES
        .iter()
        .find_map(|suffix| trimmed.strip_suffix(suffix))
        .unwrap_or(trimmed)
        .to_string()
}

/// Resolve a document path against the page that mentions it.
///
/// - `/a/b` from any page → `a/b`
/// - `b` from `guide/x.txt` → `guide/b`
/// - `../b` from `guide/x.txt` → `b`
pub fn reroot_path(target: &str, referencing: &FileId) -> String {
    let target = target.trim();
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => match referencing.parent_dir() {
            "" => target.to_string(),
            dir => format!("{dir}/{target}"),
        },
    };
    let mut parts: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Collapse runs of whitespace into a single space and trim the ends.
pub fn normalize_target(target: &str) -> String {
    target.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turn arbitrary text into a valid HTML5 element id.
///
/// Anything outside `[A-Za-z0-9_.-]` becomes `-`. Empty input yields
/// `"unnamed"` so callers never emit `id=""`.
pub fn make_html_id(orig: &str) -> String {
    let clean: String = orig
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if clean.is_empty() {
        "unnamed".to_string()
    } else {
        clean
    }
}

/// Derive a heading id from its visible text when the tokenizer gave none.
pub fn heading_id_from_text(text: &str) -> String {
    make_html_id(&normalize_target(text).to_lowercase())
}

/// Filesystem-safe cache filename for a URL.
pub fn cache_filename(url: &str) -> String {
    url.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Rank `candidates` by edit distance to `needle`, keeping close matches.
///
/// A candidate qualifies when its distance is at most a third of the
/// needle's length (minimum 2). Returns at most `limit` matches, closest
/// first; ties keep the candidates' input order.
pub fn closest_matches<'a, I>(needle: &str, candidates: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let threshold = (needle.chars().count() / 3).max(2);
    let mut scored: Vec<(usize, &str)> = candidates
        .into_iter()
        .filter(|c| *c != needle)
        .map(|c| (levenshtein(needle, c), c))
        .filter(|(d, _)| *d <= threshold)
        .collect();
    scored.sort_by_key(|(d, _)| *d);
    scored
        .into_iter()
        .take(limit)
        .map(|(_, c)| c.to_string())
        .collect()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut row = Vec::with_capacity(b.len() + 1);
        row.push(i + 1);
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            row.push((prev[j] + cost).min(prev[j + 1] + 1).min(row[j] + 1));
        }
        prev = row;
    }
    prev[b.len()]
}
