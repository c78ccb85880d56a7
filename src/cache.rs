//! On-disk cache for intersphinx inventories.
//!
//! Every build resolves references against the same handful of remote
//! `objects.inv` files. This module keeps a copy of each under the project's
//! `inventory_cache_dir` so most builds never touch the network.
//!
//! # Freshness
//!
//! - A cached file whose mtime is less than [`FRESH_FOR`] old is used as-is.
//! - Otherwise a conditional request is made with `If-Modified-Since` set to
//!   the cached mtime. `304 Not Modified` reuses the cached bytes and touches
//!   the file so the next hour is free again; `200` overwrites it.
//! - With no cached copy, the file is fetched unconditionally.
//!
//! ## Storage
//!
//! One file per URL, named by [`cache_filename`] so any URL maps to a flat,
//! filesystem-safe name:
//!
//! ```text
//! .docforest-cache/
//! └── https___www.mongodb.com_docs_manual_objects.inv
//! ```
//!
//! Network access sits behind the [`Fetch`] trait; [`HttpFetcher`] is the
//! production implementation.

use crate::inventory::{Inventory, InventoryError};
use crate::naming::cache_filename;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

/// How long a cached inventory is trusted without revalidation.
pub const FRESH_FOR: Duration = Duration::from_secs(60 * 60);

/// Outcome of a (possibly conditional) fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    NotModified,
    Body(Vec<u8>),
}

/// Source of inventory bytes.
pub trait Fetch {
    fn fetch(&self, url: &str, if_modified_since: Option<SystemTime>)
    -> Result<Fetched, InventoryError>;
}

/// Fetches over HTTP(S) with `ureq`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(30))
                .build(),
        }
    }
}

impl Fetch for HttpFetcher {
    fn fetch(
        &self,
        url: &str,
        if_modified_since: Option<SystemTime>,
    ) -> Result<Fetched, InventoryError> {
        let mut request = self.agent.get(url);
        if let Some(since) = if_modified_since {
            request = request.set("If-Modified-Since", &httpdate::fmt_http_date(since));
        }
        let response = request.call().map_err(|e| InventoryError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if response.status() == 304 {
            return Ok(Fetched::NotModified);
        }
        let mut body = Vec::new();
        response.into_reader().read_to_end(&mut body)?;
        Ok(Fetched::Body(body))
    }
}

/// Counts of how each inventory was obtained during a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub fresh: u32,
    pub revalidated: u32,
    pub downloaded: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.fresh + self.revalidated + self.downloaded
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fresh > 0 || self.revalidated > 0 {
            write!(
                f,
                "{} cached, {} revalidated, {} downloaded ({} total)",
                self.fresh,
                self.revalidated,
                self.downloaded,
                self.total()
            )
        } else {
            write!(f, "{} downloaded", self.downloaded)
        }
    }
}

/// Directory of cached inventory files.
#[derive(Debug, Clone)]
pub struct InventoryCache {
    dir: PathBuf,
    pub stats: CacheStats,
}

impl InventoryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            stats: CacheStats::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the cached copy of `url` lives.
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(cache_filename(url))
    }

    /// Load and parse the inventory at `url`, going to the network only
    /// when the cached copy is missing or stale.
    pub fn load(&mut self, url: &str, fetcher: &dyn Fetch) -> Result<Inventory, InventoryError> {
        let bytes = self.load_bytes(url, fetcher)?;
        Inventory::parse(base_url_of(url), &bytes)
    }

    fn load_bytes(&mut self, url: &str, fetcher: &dyn Fetch) -> Result<Vec<u8>, InventoryError> {
        let path = self.path_for(url);
        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();

        if let Some(mtime) = modified {
            let age = SystemTime::now()
                .duration_since(mtime)
                .unwrap_or(Duration::ZERO);
            if age < FRESH_FOR {
                debug!(url, ?age, "using fresh cached inventory");
                self.stats.fresh += 1;
                return Ok(fs::read(&path)?);
            }
        }

        match fetcher.fetch(url, modified)? {
            Fetched::NotModified if modified.is_some() => {
                debug!(url, "inventory not modified, refreshing cache mtime");
                let bytes = fs::read(&path)?;
                fs::File::options()
                    .write(true)
                    .open(&path)?
                    .set_modified(SystemTime::now())?;
                self.stats.revalidated += 1;
                Ok(bytes)
            }
            Fetched::NotModified => Err(InventoryError::Http {
                url: url.to_string(),
                message: "server answered 304 to an unconditional request".to_string(),
            }),
            Fetched::Body(bytes) => {
                debug!(url, size = bytes.len(), "downloaded inventory");
                fs::create_dir_all(&self.dir)?;
                fs::write(&path, &bytes)?;
                self.stats.downloaded += 1;
                Ok(bytes)
            }
        }
    }
}

/// The directory an inventory URL lives in; entry URIs are relative to it.
///
/// - `https://x.org/docs/objects.inv` → `https://x.org/docs/`
pub fn base_url_of(url: &str) -> &str {
    match url.rfind('/') {
        Some(i) => &url[..=i],
        None => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::TargetDefinition;
    use std::cell::RefCell;
    use tempfile::TempDir;

    const URL: &str = "https://docs.example.org/manual/objects.inv";

    /// Records every request and answers from a fixed script.
    struct ScriptedFetcher {
        answer: Fetched,
        requests: RefCell<Vec<Option<SystemTime>>>,
    }

    impl ScriptedFetcher {
        fn new(answer: Fetched) -> Self {
            Self {
                answer,
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl Fetch for ScriptedFetcher {
        fn fetch(
            &self,
            _url: &str,
            if_modified_since: Option<SystemTime>,
        ) -> Result<Fetched, InventoryError> {
            self.requests.borrow_mut().push(if_modified_since);
            Ok(self.answer.clone())
        }
    }

    struct FailingFetcher;

    impl Fetch for FailingFetcher {
        fn fetch(&self, url: &str, _: Option<SystemTime>) -> Result<Fetched, InventoryError> {
            Err(InventoryError::Http {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    fn sample_inventory() -> Vec<u8> {
        let mut inv = Inventory::new(base_url_of(URL), "Manual", "7.0");
        inv.insert(TargetDefinition {
            name: "install".to_string(),
            domain: "std".to_string(),
            role: "label".to_string(),
            priority: -1,
            uri_base: base_url_of(URL).to_string(),
            uri: "install/#$".to_string(),
            display_name: Some("Install".to_string()),
        });
        inv.dumps().unwrap()
    }

    fn age_file(path: &Path, by: Duration) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - by)
            .unwrap();
    }

    // =========================================================================
    // Freshness
    // =========================================================================

    #[test]
    fn missing_cache_downloads_unconditionally() {
        let tmp = TempDir::new().unwrap();
        let mut cache = InventoryCache::new(tmp.path().join("cache"));
        let fetcher = ScriptedFetcher::new(Fetched::Body(sample_inventory()));

        let inv = cache.load(URL, &fetcher).unwrap();
        assert_eq!(inv.project, "Manual");
        assert_eq!(fetcher.requests.borrow().as_slice(), &[None]);
        assert!(cache.path_for(URL).exists());
        assert_eq!(cache.stats.downloaded, 1);
    }

    #[test]
    fn fresh_cache_skips_network() {
        let tmp = TempDir::new().unwrap();
        let mut cache = InventoryCache::new(tmp.path());
        fs::write(cache.path_for(URL), sample_inventory()).unwrap();

        let inv = cache.load(URL, &FailingFetcher).unwrap();
        assert_eq!(inv.len(), 1);
        assert_eq!(cache.stats.fresh, 1);
    }

    #[test]
    fn stale_cache_revalidates_and_touches_on_304() {
        let tmp = TempDir::new().unwrap();
        let mut cache = InventoryCache::new(tmp.path());
        let path = cache.path_for(URL);
        fs::write(&path, sample_inventory()).unwrap();
        age_file(&path, Duration::from_secs(2 * 60 * 60));

        let fetcher = ScriptedFetcher::new(Fetched::NotModified);
        let inv = cache.load(URL, &fetcher).unwrap();
        assert_eq!(inv.len(), 1);
        assert!(fetcher.requests.borrow()[0].is_some());

        let age = SystemTime::now()
            .duration_since(fs::metadata(&path).unwrap().modified().unwrap())
            .unwrap_or(Duration::ZERO);
        assert!(age < FRESH_FOR);
        assert_eq!(cache.stats.revalidated, 1);
    }

    #[test]
    fn stale_cache_is_overwritten_on_200() {
        let tmp = TempDir::new().unwrap();
        let mut cache = InventoryCache::new(tmp.path());
        let path = cache.path_for(URL);
        fs::write(&path, b"old").unwrap();
        age_file(&path, Duration::from_secs(2 * 60 * 60));

        let fetcher = ScriptedFetcher::new(Fetched::Body(sample_inventory()));
        cache.load(URL, &fetcher).unwrap();
        assert_eq!(fs::read(&path).unwrap(), sample_inventory());
    }

    #[test]
    fn fetch_failure_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let mut cache = InventoryCache::new(tmp.path());
        assert!(matches!(
            cache.load(URL, &FailingFetcher),
            Err(InventoryError::Http { .. })
        ));
    }

    // =========================================================================
    // Naming
    // =========================================================================

    #[test]
    fn base_url_is_the_containing_directory() {
        assert_eq!(base_url_of(URL), "https://docs.example.org/manual/");
    }

    #[test]
    fn stats_display() {
        let stats = CacheStats {
            fresh: 2,
            revalidated: 0,
            downloaded: 1,
        };
        assert_eq!(stats.to_string(), "2 cached, 0 revalidated, 1 downloaded (3 total)");
        assert_eq!(CacheStats::default().to_string(), "0 downloaded");
    }
}
