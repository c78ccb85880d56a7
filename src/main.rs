use clap::{Parser, Subcommand};
use docforest::cache::{HttpFetcher, InventoryCache};
use docforest::config::{self, ProjectConfig};
use docforest::diagnostics::Severity;
use docforest::postprocess::{PostprocessResult, Postprocessor};
use docforest::targets::TargetDatabase;
use docforest::output;
use docforest::types::{FileId, Page};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "docforest")]
#[command(about = "Cross-file resolution for tokenized documentation trees")]
#[command(long_about = "\
Cross-file resolution for tokenized documentation trees

Reads one JSON page per source file (as written by the tokenizer), expands
includes and substitutions, resolves cross-references against local targets
and intersphinx inventories, and assembles the navigation tree.

Source structure:

  source/
  ├── docforest.toml               # Project config (optional)
  ├── index.json                   # Root page: its toctree starts navigation
  └── tutorial/
      └── install.json             # One serialized page per source file

Set RUST_LOG=debug to trace each pass.

Run 'docforest gen-config' to generate a documented docforest.toml.")]
#[command(version)]
struct Cli {
    /// Directory of page JSON files
    #[arg(long, default_value = "source", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "build", global = true)]
    output: PathBuf,

    /// Exit non-zero if any error-severity diagnostic is produced
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the page set and write pages, metadata and diagnostics
    Build,
    /// Resolve the page set and report diagnostics without writing
    Check,
    /// Resolve the page set and write an objects.inv for it
    Inventory {
        /// URL the generated inventory's URIs are relative to
        #[arg(long)]
        base_url: String,
        /// Project version recorded in the inventory header
        #[arg(long, default_value = "")]
        version: String,
    },
    /// Print a stock docforest.toml with all options documented
    GenConfig,
}

#[derive(Error, Debug)]
enum PageLoadError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid page JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to walk {}: {}", .0.display(), .1)]
    Walk(PathBuf, walkdir::Error),
    #[error("{} does not hold a root node", .0.display())]
    NotARoot(PathBuf),
    #[error("Page {0} appears in more than one file")]
    Duplicate(FileId),
}

#[derive(Error, Debug)]
#[error("{0} error(s) reported")]
struct StrictFailure(usize);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let project = config::load_config(&cli.source)?;
    println!("==> Loading pages from {}", cli.source.display());
    let pages = load_pages(&cli.source)?;

    let targets = load_targets(&cli.source, &project)?;
    let mut postprocessor = Postprocessor::new(&project, targets);
    let result = postprocessor.run(pages);

    output::print_navigation(&result.metadata);
    output::print_diagnostics(&result);
    output::print_summary(&result);

    match cli.command {
        Command::Build => {
            write_build(&cli.output, &result)?;
            output::print_written(&cli.output, result.pages.len());
        }
        Command::Check | Command::GenConfig => {}
        Command::Inventory { base_url, version } => {
            let inventory =
                postprocessor
                    .targets()
                    .generate_inventory(&base_url, &project.title, &version);
            std::fs::create_dir_all(&cli.output)?;
            let path = cli.output.join("objects.inv");
            std::fs::write(&path, inventory.dumps()?)?;
            println!("Wrote {} targets → {}", inventory.len(), path.display());
        }
    }

    let errors = output::count_severity(&result, Severity::Error);
    if cli.strict && errors > 0 {
        return Err(StrictFailure(errors).into());
    }
    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configured inventories through the on-disk cache.
fn load_targets(
    source: &Path,
    project: &ProjectConfig,
) -> Result<TargetDatabase, Box<dyn std::error::Error>> {
    let mut targets = TargetDatabase::new(project.role_prefixes.clone());
    if project.intersphinx.is_empty() {
        return Ok(targets);
    }
    let mut cache = InventoryCache::new(project.inventory_cache_path(source));
    targets.reset(project, &mut cache, &HttpFetcher::default())?;
    println!("Inventories: {}", cache.stats);
    Ok(targets)
}

/// Every `*.json` file under `root`, decoded in parallel.
///
/// The tokenizer writes one file per page; a page's identity is the
/// `fileid` recorded in its root node, not the JSON file's path.
fn load_pages(root: &Path) -> Result<BTreeMap<FileId, Page>, PageLoadError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| PageLoadError::Walk(root.to_path_buf(), e))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|e| e == "json") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    debug!(files = files.len(), "decoding pages");

    let decoded: Vec<(FileId, Page)> = files
        .par_iter()
        .map(|path| read_page(path))
        .collect::<Result<_, _>>()?;

    let mut pages = BTreeMap::new();
    for (fileid, page) in decoded {
        if pages.insert(fileid.clone(), page).is_some() {
            return Err(PageLoadError::Duplicate(fileid));
        }
    }
    info!(pages = pages.len(), "loaded pages");
    Ok(pages)
}

fn read_page(path: &Path) -> Result<(FileId, Page), PageLoadError> {
    let bytes = std::fs::read(path).map_err(|source| PageLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let page: Page = serde_json::from_slice(&bytes).map_err(|source| PageLoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let fileid = page
        .fileid()
        .cloned()
        .ok_or_else(|| PageLoadError::NotARoot(path.to_path_buf()))?;
    Ok((fileid, page))
}

/// Resolved pages mirror their source paths; metadata and diagnostics sit
/// at the output root.
fn write_build(
    output: &Path,
    result: &PostprocessResult,
) -> Result<(), Box<dyn std::error::Error>> {
    for (fileid, page) in &result.pages {
        let path = output.join(format!("{}.json", fileid.without_known_suffix()));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(page)?)?;
    }
    std::fs::create_dir_all(output)?;
    std::fs::write(
        output.join("metadata.json"),
        serde_json::to_string_pretty(&result.metadata)?,
    )?;
    std::fs::write(
        output.join("diagnostics.json"),
        serde_json::to_string_pretty(&result.diagnostics)?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_page(dir: &Path, file: &str, fileid: &str) {
        let json = serde_json::json!({
            "ast": {
                "type": "root",
                "fileid": fileid,
                "children": [{"type": "paragraph", "children": [{"type": "text", "value": "hi"}]}]
            },
            "static_assets": []
        });
        let path = dir.join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, json.to_string()).unwrap();
    }

    #[test]
    fn loads_pages_keyed_by_root_fileid() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "index.json", "index.txt");
        write_page(tmp.path(), "guide/a.json", "guide/a.txt");
        std::fs::write(tmp.path().join("docforest.toml"), "title = \"x\"").unwrap();

        let pages = load_pages(tmp.path()).unwrap();
        let ids: Vec<&str> = pages.keys().map(FileId::as_str).collect();
        assert_eq!(ids, vec!["guide/a.txt", "index.txt"]);
    }

    #[test]
    fn duplicate_fileid_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "a.json", "a.txt");
        write_page(tmp.path(), "b.json", "a.txt");
        assert!(matches!(
            load_pages(tmp.path()),
            Err(PageLoadError::Duplicate(_))
        ));
    }

    #[test]
    fn non_root_page_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let json = serde_json::json!({"ast": {"type": "paragraph", "children": []}});
        std::fs::write(tmp.path().join("p.json"), json.to_string()).unwrap();
        assert!(matches!(
            load_pages(tmp.path()),
            Err(PageLoadError::NotARoot(_))
        ));
    }

    #[test]
    fn bad_json_names_the_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("broken.json"), "{").unwrap();
        let err = load_pages(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("broken.json"), "{err}");
    }

    #[test]
    fn missing_source_dir_names_the_dir() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nowhere");
        let err = load_pages(&missing).unwrap_err();
        assert!(matches!(err, PageLoadError::Walk(..)));
        let message = err.to_string();
        assert!(message.starts_with("Failed to walk "), "{message}");
        assert!(message.contains("nowhere"), "{message}");
    }

    #[test]
    fn build_writes_pages_and_metadata() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_page(src.path(), "index.json", "index.txt");
        let config = ProjectConfig::default();
        let result =
            Postprocessor::new(&config, TargetDatabase::default()).run(load_pages(src.path()).unwrap());
        write_build(out.path(), &result).unwrap();
        assert!(out.path().join("index.json").exists());
        assert!(out.path().join("metadata.json").exists());
        let diagnostics = std::fs::read_to_string(out.path().join("diagnostics.json")).unwrap();
        assert_eq!(diagnostics.trim(), "{\n  \"index.txt\": []\n}");
    }
}
