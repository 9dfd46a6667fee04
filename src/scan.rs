//! Document discovery and the scan command.
//!
//! Walks the repository (or a subtree), feeds each discovered file through
//! the processing pipeline sequentially, and prints a summary. Before each
//! scan, copies whose files vanished are garbage-collected and documents
//! left without copies are pruned.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Config;
use crate::extract::DocumentExtractor;
use crate::pipeline::{Pipeline, ProcessingResult};
use crate::store;
use crate::{config, db, migrate};

/// Directories never descended into, regardless of configuration.
const EXCLUDED_DIRS: [&str; 6] = [".shelf", ".git", ".svn", ".hg", "node_modules", "target"];

/// Recursively discover tracked document files under `root_path`, returned
/// as sorted paths relative to `repo_root`.
pub fn discover_files(
    repo_root: &Path,
    root_path: &Path,
    config: &Config,
) -> Result<Vec<PathBuf>> {
    let exclude_set = build_globset(&config.scan.exclude_globs)?;
    let mut files = Vec::new();

    let walker = WalkDir::new(root_path).into_iter().filter_entry(|entry| {
        !(entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| EXCLUDED_DIRS.contains(&name))
                .unwrap_or(false))
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // Permission errors are skipped, matching directory walks
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !has_tracked_extension(path, config) {
            continue;
        }
        let relative = path.strip_prefix(repo_root).unwrap_or(path);
        if exclude_set.is_match(relative) {
            continue;
        }
        files.push(relative.to_path_buf());
    }

    files.sort();
    Ok(files)
}

/// Discover tracked files directly in `directory` (non-recursive).
pub fn discover_files_shallow(
    repo_root: &Path,
    directory: &Path,
    config: &Config,
) -> Result<Vec<PathBuf>> {
    let exclude_set = build_globset(&config.scan.exclude_globs)?;
    let mut files = Vec::new();

    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => return Ok(files),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || !has_tracked_extension(&path, config) {
            continue;
        }
        let relative = path.strip_prefix(repo_root).unwrap_or(&path);
        if exclude_set.is_match(relative) {
            continue;
        }
        files.push(relative.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn has_tracked_extension(path: &Path, config: &Config) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            config.scan.extensions.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Delete copies whose files no longer exist, then prune documents left
/// with zero copies. Returns the number of copies removed.
pub async fn cleanup_orphaned_copies(pool: &SqlitePool, repo_root: &Path) -> Result<u64> {
    let repository_path = repo_root.to_string_lossy().into_owned();
    let copies = store::copies_for_repository(pool, &repository_path).await?;

    let mut deleted = 0u64;
    for copy in copies {
        if !repo_root.join(&copy.file_path).exists() {
            store::delete_copy(pool, copy.id).await?;
            deleted += 1;
        }
    }
    if deleted > 0 {
        let pruned = store::prune_orphan_documents(pool).await?;
        debug!(deleted, pruned, "cleaned up orphaned copies");
    }
    Ok(deleted)
}

/// CLI entry point for `shelf scan`.
pub async fn run_scan(
    repo_root: &Path,
    path: Option<&Path>,
    recursive: bool,
    rescan: bool,
) -> Result<()> {
    let config = config::load_config(repo_root)?;
    let pool = db::connect(&config::db_path(repo_root)).await?;
    migrate::run_migrations(&pool).await?;

    println!("Scanning documents in repository: {}", repo_root.display());

    // Resolve the scan target: a file, a directory, or the whole tree
    let files = match path {
        Some(path) => {
            let target = path.canonicalize()?;
            if !target.starts_with(repo_root) {
                bail!(
                    "path '{}' is outside the repository at {}",
                    path.display(),
                    repo_root.display()
                );
            }
            if target.is_file() {
                if !has_tracked_extension(&target, &config) {
                    bail!(
                        "unsupported file type '{}' (tracked extensions: {})",
                        target.display(),
                        config.scan.extensions.join(", ")
                    );
                }
                vec![target.strip_prefix(repo_root)?.to_path_buf()]
            } else if recursive {
                discover_files(repo_root, &target, &config)?
            } else {
                discover_files_shallow(repo_root, &target, &config)?
            }
        }
        None => {
            if recursive {
                discover_files(repo_root, repo_root, &config)?
            } else {
                discover_files_shallow(repo_root, repo_root, &config)?
            }
        }
    };

    if files.is_empty() {
        println!("No document files found.");
        pool.close().await;
        return Ok(());
    }
    println!("Found {} document file(s)", files.len());

    let deleted = cleanup_orphaned_copies(&pool, repo_root).await?;
    if deleted > 0 {
        println!("Cleaned up {} orphaned file record(s)", deleted);
    }

    let extractor = DocumentExtractor;
    let pipeline = Pipeline::new(&extractor);

    let mut new_count = 0u64;
    let mut updated_count = 0u64;
    let mut duplicate_count = 0u64;
    let mut reused_count = 0u64;
    let mut failed_count = 0u64;

    // One file's pipeline run completes record-wise before the next starts
    for (idx, file) in files.iter().enumerate() {
        println!("[{}/{}] {}", idx + 1, files.len(), file.display());
        let (_copy, result) = pipeline.process_file(&pool, repo_root, file, rescan).await?;
        match result {
            ProcessingResult::NewDocument => {
                println!("  new document");
                new_count += 1;
            }
            ProcessingResult::UpdatedDocument => {
                println!("  content updated");
                updated_count += 1;
            }
            ProcessingResult::DuplicateDocument => {
                println!("  duplicate of existing document");
                duplicate_count += 1;
            }
            ProcessingResult::ReusedCopy => {
                println!("  unchanged (skipped)");
                reused_count += 1;
            }
            ProcessingResult::ExtractionFailed => {
                println!("  warning: content extraction failed");
                failed_count += 1;
            }
            ProcessingResult::HashFailed => {
                println!("  error: failed to read file for hashing");
                failed_count += 1;
            }
        }
    }

    println!();
    println!("scan summary");
    println!("  new documents:      {}", new_count);
    println!("  updated documents:  {}", updated_count);
    println!("  duplicates:         {}", duplicate_count);
    println!("  unchanged:          {}", reused_count);
    println!("  failed:             {}", failed_count);
    println!("  total files:        {}", files.len());
    println!("ok");

    pool.close().await;
    Ok(())
}
