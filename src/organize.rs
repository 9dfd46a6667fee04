//! Organization suggestions and their application.
//!
//! A suggestion is a pending operation: a proposed (directory, filename)
//! for one copy. Applying validates the target through the path guard,
//! moves the file, and records the outcome in the operation history.
//! Suggestions whose paths fail validation are dismissed automatically so
//! they stop reappearing in the pending queue.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::warn;

use crate::models::{DocumentCopy, PendingOperation};
use crate::mover::{self, ConflictPolicy, MoveOutcome};
use crate::path_guard;
use crate::store;
use crate::{config, db, migrate};

/// Hex SHA-256 over the suggestion fields, used as the default prompt hash
/// when the caller does not supply one.
fn suggestion_hash(directory: &str, filename: &str, reason: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(directory.as_bytes());
    hasher.update([0u8]);
    hasher.update(filename.as_bytes());
    hasher.update([0u8]);
    hasher.update(reason.as_bytes());
    format!("{:x}", hasher.finalize())
}

async fn open(repo_root: &Path) -> Result<SqlitePool> {
    let pool = db::connect(&config::db_path(repo_root)).await?;
    migrate::run_migrations(&pool).await?;
    Ok(pool)
}

fn relative_file_path(repo_root: &Path, path: &Path) -> Result<String> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let abs = abs
        .canonicalize()
        .with_context(|| format!("file not found: {}", path.display()))?;
    let rel = abs.strip_prefix(repo_root).map_err(|_| {
        anyhow::anyhow!(
            "path '{}' is outside the repository at {}",
            path.display(),
            repo_root.display()
        )
    })?;
    Ok(rel.to_string_lossy().into_owned())
}

/// CLI entry point for `shelf suggest`: record a suggestion for a tracked
/// file. The suggested components are validated syntactically up front so
/// obviously bad suggestions are rejected at intake.
pub async fn run_suggest(
    repo_root: &Path,
    file: &Path,
    directory: &str,
    filename: &str,
    reason: &str,
    confidence: f64,
    prompt_hash: Option<&str>,
) -> Result<()> {
    path_guard::validate_path_component(directory, true)?;
    path_guard::validate_path_component(filename, false)?;
    if !(0.0..=1.0).contains(&confidence) {
        bail!("confidence must be between 0.0 and 1.0 (got {})", confidence);
    }

    let pool = open(repo_root).await?;
    let repository_path = repo_root.to_string_lossy().into_owned();
    let file_path = relative_file_path(repo_root, file)?;

    let copy = store::find_copy(&pool, &repository_path, &file_path)
        .await?
        .with_context(|| format!("file is not tracked (scan it first): {}", file_path))?;

    let hash = match prompt_hash {
        Some(hash) => hash.to_string(),
        None => suggestion_hash(directory, filename, reason),
    };
    let pending = store::upsert_pending_operation(
        &pool, copy.id, directory, filename, reason, confidence, &hash,
    )
    .await?;

    println!(
        "Suggestion recorded for {}: {} (confidence {:.2})",
        file_path,
        display_target(&pending),
        pending.confidence
    );
    pool.close().await;
    Ok(())
}

fn display_target(pending: &PendingOperation) -> String {
    if pending.suggested_directory_path.is_empty() {
        pending.suggested_filename.clone()
    } else {
        format!(
            "{}/{}",
            pending.suggested_directory_path, pending.suggested_filename
        )
    }
}

/// Pending suggestions for the repository, optionally narrowed to one file.
async fn select_pending(
    pool: &SqlitePool,
    repo_root: &Path,
    path: Option<&Path>,
) -> Result<Vec<(PendingOperation, DocumentCopy)>> {
    let repository_path = repo_root.to_string_lossy().into_owned();
    let all = store::pending_operations(pool, &repository_path).await?;
    match path {
        None => Ok(all),
        Some(path) => {
            let file_path = relative_file_path(repo_root, path)?;
            Ok(all
                .into_iter()
                .filter(|(_, copy)| copy.file_path == file_path)
                .collect())
        }
    }
}

/// CLI entry point for `shelf pending`: list suggestions awaiting review.
pub async fn run_pending(repo_root: &Path, path: Option<&Path>) -> Result<()> {
    let pool = open(repo_root).await?;
    let pending = select_pending(&pool, repo_root, path).await?;

    if pending.is_empty() {
        println!("No pending suggestions.");
    } else {
        println!("{} pending suggestion(s):", pending.len());
        for (op, copy) in &pending {
            println!(
                "  {} -> {} (confidence {:.2})",
                copy.file_path,
                display_target(op),
                op.confidence
            );
            println!("    reason: {}", op.reason);
        }
    }
    pool.close().await;
    Ok(())
}

/// CLI entry point for `shelf apply`: execute pending suggestions.
///
/// Each suggestion is validated, the file moved, and the records updated
/// atomically. Failures are per-suggestion: a conflict or missing source
/// never aborts the batch. Suggestions whose paths fail validation are
/// dismissed so the queue converges.
pub async fn run_apply(
    repo_root: &Path,
    path: Option<&Path>,
    policy: ConflictPolicy,
) -> Result<()> {
    let pool = open(repo_root).await?;
    let pending = select_pending(&pool, repo_root, path).await?;

    if pending.is_empty() {
        println!("No pending suggestions to apply.");
        pool.close().await;
        return Ok(());
    }

    let mut applied = 0u64;
    let mut skipped = 0u64;
    let mut dismissed = 0u64;

    for (op, copy) in &pending {
        match apply_operation(&pool, repo_root, op, copy, policy).await? {
            ApplyResult::Applied(final_path) => {
                println!("  {} -> {}", copy.file_path, final_path);
                applied += 1;
            }
            ApplyResult::Conflict(target) => {
                println!(
                    "  {}: target already exists, skipped ({})",
                    copy.file_path, target
                );
                skipped += 1;
            }
            ApplyResult::SourceMissing => {
                println!(
                    "  {}: file no longer exists, skipped (rescan to clean up)",
                    copy.file_path
                );
                skipped += 1;
            }
            ApplyResult::InvalidPath(reason) => {
                println!(
                    "  {}: suggestion dismissed, unsafe target path ({})",
                    copy.file_path, reason
                );
                dismissed += 1;
            }
        }
    }

    println!();
    println!(
        "applied {}, skipped {}, dismissed {}",
        applied, skipped, dismissed
    );
    pool.close().await;
    Ok(())
}

enum ApplyResult {
    Applied(String),
    Conflict(String),
    SourceMissing,
    InvalidPath(String),
}

/// Apply one suggestion: validate the target, check the source is still
/// inside the repository, move the file, then run the apply bookkeeping.
/// The filesystem move happens before the record update; a crash between
/// the two leaves a moved file with a stale record, repaired by rescan.
async fn apply_operation(
    pool: &SqlitePool,
    repo_root: &Path,
    pending: &PendingOperation,
    copy: &DocumentCopy,
    policy: ConflictPolicy,
) -> Result<ApplyResult> {
    let target = match path_guard::validate_target_path(
        repo_root,
        &pending.suggested_directory_path,
        &pending.suggested_filename,
    ) {
        Ok(target) => target,
        Err(e) => {
            warn!(
                file = %copy.file_path,
                error = %e,
                "dismissing suggestion with unsafe target"
            );
            store::record_dismissed(pool, pending, copy).await?;
            return Ok(ApplyResult::InvalidPath(e.to_string()));
        }
    };

    let source = repo_root.join(&copy.file_path);
    if let Err(e) = path_guard::validate_repository_path(&source, repo_root) {
        // A copy record pointing outside its own repository is corrupt
        bail!("refusing to move {}: {}", source.display(), e);
    }

    match mover::move_file(&source, &target, policy, true)? {
        MoveOutcome::Moved(final_target) => {
            // The guard returns a canonicalized target, so the stored
            // relative path must be computed against the resolved root
            let resolved_root = repo_root.canonicalize().with_context(|| {
                format!("cannot resolve repository root: {}", repo_root.display())
            })?;
            let final_path = final_target
                .strip_prefix(&resolved_root)
                .with_context(|| {
                    format!(
                        "moved file {} is not under repository root {}",
                        final_target.display(),
                        resolved_root.display()
                    )
                })?
                .to_string_lossy()
                .into_owned();
            store::record_applied(pool, pending, copy, &final_path).await?;
            Ok(ApplyResult::Applied(final_path))
        }
        MoveOutcome::Conflict { target, .. } => {
            Ok(ApplyResult::Conflict(target.display().to_string()))
        }
        MoveOutcome::SourceMissing(_) => Ok(ApplyResult::SourceMissing),
    }
}

/// CLI entry point for `shelf reject`: dismiss suggestions without moving
/// anything.
pub async fn run_reject(repo_root: &Path, path: Option<&Path>) -> Result<()> {
    let pool = open(repo_root).await?;
    let pending = select_pending(&pool, repo_root, path).await?;

    if pending.is_empty() {
        println!("No pending suggestions to reject.");
        pool.close().await;
        return Ok(());
    }

    for (op, copy) in &pending {
        store::record_dismissed(&pool, op, copy).await?;
        println!("  {}: suggestion dismissed", copy.file_path);
    }
    println!("rejected {} suggestion(s)", pending.len());
    pool.close().await;
    Ok(())
}
