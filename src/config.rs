use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the marker directory identifying a shelf repository root.
pub const SHELF_DIR: &str = ".shelf";
/// Config file inside the marker directory.
pub const CONFIG_FILE: &str = "config.toml";
/// Database file inside the marker directory.
pub const DB_FILE: &str = "shelf.db";

/// Per-repository configuration, stored at `.shelf/config.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    /// File extensions (lowercase, no dot) considered documents.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Glob patterns excluded from discovery, in addition to the built-in
    /// exclusions (`.shelf`, `.git`, `node_modules`, `target`).
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    ["pdf", "docx", "txt", "md", "html"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

const DEFAULT_CONFIG: &str = r#"# shelf repository configuration

[scan]
# File extensions tracked as documents (lowercase, no dot).
extensions = ["pdf", "docx", "txt", "md", "html"]
# Extra glob patterns to exclude from scans.
exclude_globs = []
"#;

/// Walk up from `start` looking for a `.shelf/` directory.
pub fn find_repository_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.canonicalize().ok()?;
    loop {
        if current.join(SHELF_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Find the repository root or fail with a hint to run `shelf init`.
pub fn require_repository_root(start: &Path) -> Result<PathBuf> {
    let root = match find_repository_root(start) {
        Some(root) => root,
        None => bail!("not in a shelf repository (run 'shelf init' to create one)"),
    };
    if !root.join(SHELF_DIR).join(CONFIG_FILE).is_file() {
        bail!(
            "invalid shelf repository at {}: missing {}/{}",
            root.display(),
            SHELF_DIR,
            CONFIG_FILE
        );
    }
    Ok(root)
}

pub fn db_path(repo_root: &Path) -> PathBuf {
    repo_root.join(SHELF_DIR).join(DB_FILE)
}

pub fn load_config(repo_root: &Path) -> Result<Config> {
    let path = repo_root.join(SHELF_DIR).join(CONFIG_FILE);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    if config.scan.extensions.is_empty() {
        bail!("scan.extensions must not be empty");
    }

    Ok(config)
}

/// Create the `.shelf/` marker and a default config in `dir`. Returns the
/// canonical repository root. Idempotent: an existing config is left alone.
pub fn init_repository(dir: &Path) -> Result<PathBuf> {
    let root = dir
        .canonicalize()
        .with_context(|| format!("Cannot resolve directory: {}", dir.display()))?;
    let shelf_dir = root.join(SHELF_DIR);
    std::fs::create_dir_all(&shelf_dir)?;

    let config_path = shelf_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        std::fs::write(&config_path, DEFAULT_CONFIG)?;
    }

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_then_find_from_nested_dir() {
        let tmp = TempDir::new().unwrap();
        let root = init_repository(tmp.path()).unwrap();

        let nested = root.join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_repository_root(&nested).unwrap(), root);
        assert_eq!(require_repository_root(&nested).unwrap(), root);
    }

    #[test]
    fn missing_repository_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(require_repository_root(tmp.path()).is_err());
    }

    #[test]
    fn default_config_parses() {
        let tmp = TempDir::new().unwrap();
        let root = init_repository(tmp.path()).unwrap();
        let config = load_config(&root).unwrap();
        assert!(config.scan.extensions.contains(&"pdf".to_string()));
        assert!(config.scan.exclude_globs.is_empty());
    }
}
