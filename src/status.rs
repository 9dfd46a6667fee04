//! Repository status summary.

use anyhow::Result;
use std::path::Path;

use crate::store;
use crate::{config, db, migrate};

/// CLI entry point for `shelf status`.
pub async fn run_status(repo_root: &Path) -> Result<()> {
    let pool = db::connect(&config::db_path(repo_root)).await?;
    migrate::run_migrations(&pool).await?;

    let repository_path = repo_root.to_string_lossy().into_owned();
    let counts = store::repository_counts(&pool, &repository_path).await?;

    println!("Repository: {}", repo_root.display());
    println!("  documents:           {}", counts.documents);
    println!("  tracked files:       {}", counts.copies);
    println!("    unorganized:       {}", counts.unorganized);
    println!("    organized:         {}", counts.organized);
    println!("    ignored:           {}", counts.ignored);
    println!("  pending suggestions: {}", counts.pending);
    pool.close().await;
    Ok(())
}
