//! Manual organization marking: ignore and unmark.
//!
//! Ignored copies are excluded from suggestion workflows but stay tracked
//! for deduplication; ignoring a file also deletes any pending suggestion
//! for it. Unmark returns a copy to the unorganized pool.

use anyhow::{bail, Context, Result};
use sqlx::SqlitePool;
use std::path::Path;

use crate::models::{DocumentCopy, OrganizationStatus};
use crate::store;
use crate::{config, db, migrate};

/// Copies addressed by a path argument: the copy at that exact file path,
/// or every copy under it when the path is a directory.
async fn copies_at(
    pool: &SqlitePool,
    repo_root: &Path,
    path: &Path,
) -> Result<Vec<DocumentCopy>> {
    let repository_path = repo_root.to_string_lossy().into_owned();
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let abs = abs
        .canonicalize()
        .with_context(|| format!("path not found: {}", path.display()))?;
    let rel = abs
        .strip_prefix(repo_root)
        .map_err(|_| {
            anyhow::anyhow!(
                "path '{}' is outside the repository at {}",
                path.display(),
                repo_root.display()
            )
        })?
        .to_string_lossy()
        .into_owned();

    if abs.is_dir() {
        let all = store::copies_for_repository(pool, &repository_path).await?;
        let prefix = if rel.is_empty() {
            String::new()
        } else {
            format!("{}/", rel)
        };
        Ok(all
            .into_iter()
            .filter(|c| prefix.is_empty() || c.file_path.starts_with(&prefix))
            .collect())
    } else {
        Ok(store::find_copy(pool, &repository_path, &rel)
            .await?
            .into_iter()
            .collect())
    }
}

async fn set_status(
    repo_root: &Path,
    path: &Path,
    status: OrganizationStatus,
    verb: &str,
) -> Result<()> {
    let pool = db::connect(&config::db_path(repo_root)).await?;
    migrate::run_migrations(&pool).await?;

    let copies = copies_at(&pool, repo_root, path).await?;
    if copies.is_empty() {
        pool.close().await;
        bail!("no tracked files at '{}' (scan it first)", path.display());
    }

    for copy in &copies {
        match status {
            // Ignoring also consumes any pending suggestion for the copy
            OrganizationStatus::Ignored => store::ignore_copy(&pool, copy.id).await?,
            _ => store::set_organization_status(&pool, copy.id, status).await?,
        }
        println!("  {}: {}", copy.file_path, verb);
    }
    println!("{} {} file(s)", verb, copies.len());
    pool.close().await;
    Ok(())
}

/// CLI entry point for `shelf ignore`.
pub async fn run_ignore(repo_root: &Path, path: &Path) -> Result<()> {
    set_status(repo_root, path, OrganizationStatus::Ignored, "ignored").await
}

/// CLI entry point for `shelf unmark`.
pub async fn run_unmark(repo_root: &Path, path: &Path) -> Result<()> {
    set_status(repo_root, path, OrganizationStatus::Unorganized, "unmarked").await
}
