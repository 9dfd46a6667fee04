use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema. Idempotent — every statement is IF NOT EXISTS.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Canonical documents: one row per distinct content hash
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_hash TEXT NOT NULL,
            content TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_content_hash ON documents(content_hash)",
    )
    .execute(pool)
    .await?;

    // Filesystem copies: one row per physical file location
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_copies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id INTEGER NOT NULL,
            repository_path TEXT NOT NULL,
            file_path TEXT NOT NULL,
            stored_content_hash TEXT NOT NULL,
            stored_size INTEGER NOT NULL,
            stored_mtime INTEGER NOT NULL,
            organization_status TEXT NOT NULL DEFAULT 'unorganized',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(repository_path, file_path),
            FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_copies_document_id ON document_copies(document_id)",
    )
    .execute(pool)
    .await?;

    // Unapplied suggestions from the external engine. The partial unique
    // index enforces at most one pending suggestion per live copy.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pending_operations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_copy_id INTEGER,
            suggested_directory_path TEXT NOT NULL,
            suggested_filename TEXT NOT NULL,
            reason TEXT NOT NULL,
            confidence REAL NOT NULL,
            prompt_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (document_copy_id) REFERENCES document_copies(id) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_pending_one_per_copy
        ON pending_operations(document_copy_id)
        WHERE document_copy_id IS NOT NULL
        "#,
    )
    .execute(pool)
    .await?;

    // Applied/dismissed history. Original paths are denormalized so the
    // audit trail survives copy deletion.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS operations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_copy_id INTEGER,
            original_repository_path TEXT NOT NULL,
            original_file_path TEXT NOT NULL,
            suggested_directory_path TEXT NOT NULL,
            suggested_filename TEXT NOT NULL,
            reason TEXT NOT NULL,
            prompt_hash TEXT NOT NULL,
            outcome TEXT NOT NULL,
            final_file_path TEXT,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (document_copy_id) REFERENCES document_copies(id) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_operations_outcome ON operations(outcome)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_operations_prompt_hash ON operations(prompt_hash)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
