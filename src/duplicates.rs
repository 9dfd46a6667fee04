//! Duplicate listing: documents with more than one copy in the repository.

use anyhow::Result;
use std::path::Path;

use crate::store;
use crate::{config, db, migrate};

/// CLI entry point for `shelf duplicates`.
pub async fn run_duplicates(repo_root: &Path) -> Result<()> {
    let pool = db::connect(&config::db_path(repo_root)).await?;
    migrate::run_migrations(&pool).await?;

    let repository_path = repo_root.to_string_lossy().into_owned();
    let groups = store::duplicate_groups(&pool, &repository_path).await?;

    if groups.is_empty() {
        println!("No duplicate documents found.");
    } else {
        println!("{} document(s) with multiple copies:", groups.len());
        for (_, copies) in &groups {
            let hash = &copies[0].stored_content_hash;
            println!("  {} ({} copies)", &hash[..hash.len().min(12)], copies.len());
            for copy in copies {
                println!("    {}", copy.file_path);
            }
        }
    }
    pool.close().await;
    Ok(())
}
