//! Document store: all reads and writes for the four entity tables.
//!
//! Writes that must land together — creating a document with its first
//! copy, repointing a copy and dropping its stale suggestion, or the apply
//! bookkeeping — each run inside one transaction so a crash leaves the
//! store in its pre-operation state.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{
    now_ts, Document, DocumentCopy, OperationOutcome, OrganizationStatus, PendingOperation,
};

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    Ok(Document {
        id: row.get("id"),
        content_hash: row.get("content_hash"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn copy_from_row(row: &SqliteRow) -> Result<DocumentCopy> {
    let status: String = row.get("organization_status");
    Ok(DocumentCopy {
        id: row.get("id"),
        document_id: row.get("document_id"),
        repository_path: row.get("repository_path"),
        file_path: row.get("file_path"),
        stored_content_hash: row.get("stored_content_hash"),
        stored_size: row.get("stored_size"),
        stored_mtime: row.get("stored_mtime"),
        organization_status: OrganizationStatus::parse(&status)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn pending_from_row(row: &SqliteRow) -> Result<PendingOperation> {
    Ok(PendingOperation {
        id: row.get("id"),
        document_copy_id: row.get("document_copy_id"),
        suggested_directory_path: row.get("suggested_directory_path"),
        suggested_filename: row.get("suggested_filename"),
        reason: row.get("reason"),
        confidence: row.get("confidence"),
        prompt_hash: row.get("prompt_hash"),
        created_at: row.get("created_at"),
    })
}

const COPY_COLUMNS: &str = "id, document_id, repository_path, file_path, stored_content_hash, \
     stored_size, stored_mtime, organization_status, created_at, updated_at";

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

pub async fn document(pool: &SqlitePool, id: i64) -> Result<Document> {
    let row = sqlx::query(
        "SELECT id, content_hash, content, created_at, updated_at FROM documents WHERE id = ?",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    document_from_row(&row)
}

pub async fn find_document_by_hash(pool: &SqlitePool, hash: &str) -> Result<Option<Document>> {
    let row = sqlx::query(
        "SELECT id, content_hash, content, created_at, updated_at FROM documents WHERE content_hash = ?",
    )
    .bind(hash)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(document_from_row).transpose()
}

/// Store extracted text on a document whose content was previously missing.
pub async fn backfill_document_content(
    pool: &SqlitePool,
    document_id: i64,
    content: &str,
) -> Result<()> {
    sqlx::query("UPDATE documents SET content = ?, updated_at = ? WHERE id = ?")
        .bind(content)
        .bind(now_ts())
        .bind(document_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete documents that no longer have any copy. Explicit cascade: a
/// document lives exactly as long as its last copy.
pub async fn prune_orphan_documents(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM documents WHERE id NOT IN (SELECT DISTINCT document_id FROM document_copies)",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Copies
// ---------------------------------------------------------------------------

pub async fn find_copy(
    pool: &SqlitePool,
    repository_path: &str,
    file_path: &str,
) -> Result<Option<DocumentCopy>> {
    let sql = format!(
        "SELECT {} FROM document_copies WHERE repository_path = ? AND file_path = ?",
        COPY_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(repository_path)
        .bind(file_path)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(copy_from_row).transpose()
}

pub async fn copy(pool: &SqlitePool, id: i64) -> Result<DocumentCopy> {
    let sql = format!("SELECT {} FROM document_copies WHERE id = ?", COPY_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_one(pool).await?;
    copy_from_row(&row)
}

pub async fn copies_for_repository(
    pool: &SqlitePool,
    repository_path: &str,
) -> Result<Vec<DocumentCopy>> {
    let sql = format!(
        "SELECT {} FROM document_copies WHERE repository_path = ? ORDER BY file_path",
        COPY_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(repository_path)
        .fetch_all(pool)
        .await?;
    rows.iter().map(copy_from_row).collect()
}

/// Create a new document together with its first copy, atomically.
pub async fn create_document_with_copy(
    pool: &SqlitePool,
    content_hash: &str,
    content: Option<&str>,
    repository_path: &str,
    file_path: &str,
    size: i64,
    mtime: i64,
) -> Result<(Document, DocumentCopy)> {
    let now = now_ts();
    let mut tx = pool.begin().await?;

    let doc_result = sqlx::query(
        "INSERT INTO documents (content_hash, content, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(content_hash)
    .bind(content)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    let document_id = doc_result.last_insert_rowid();

    let copy_result = sqlx::query(
        r#"
        INSERT INTO document_copies
            (document_id, repository_path, file_path, stored_content_hash,
             stored_size, stored_mtime, organization_status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 'unorganized', ?, ?)
        "#,
    )
    .bind(document_id)
    .bind(repository_path)
    .bind(file_path)
    .bind(content_hash)
    .bind(size)
    .bind(mtime)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    let copy_id = copy_result.last_insert_rowid();

    tx.commit().await?;

    let document = Document {
        id: document_id,
        content_hash: content_hash.to_string(),
        content: content.map(str::to_string),
        created_at: now,
        updated_at: now,
    };
    let copy = DocumentCopy {
        id: copy_id,
        document_id,
        repository_path: repository_path.to_string(),
        file_path: file_path.to_string(),
        stored_content_hash: content_hash.to_string(),
        stored_size: size,
        stored_mtime: mtime,
        organization_status: OrganizationStatus::Unorganized,
        created_at: now,
        updated_at: now,
    };
    Ok((document, copy))
}

/// Attach a new copy to an existing document (a duplicate file).
pub async fn attach_copy(
    pool: &SqlitePool,
    document_id: i64,
    repository_path: &str,
    file_path: &str,
    content_hash: &str,
    size: i64,
    mtime: i64,
) -> Result<DocumentCopy> {
    let now = now_ts();
    let result = sqlx::query(
        r#"
        INSERT INTO document_copies
            (document_id, repository_path, file_path, stored_content_hash,
             stored_size, stored_mtime, organization_status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 'unorganized', ?, ?)
        "#,
    )
    .bind(document_id)
    .bind(repository_path)
    .bind(file_path)
    .bind(content_hash)
    .bind(size)
    .bind(mtime)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(DocumentCopy {
        id: result.last_insert_rowid(),
        document_id,
        repository_path: repository_path.to_string(),
        file_path: file_path.to_string(),
        stored_content_hash: content_hash.to_string(),
        stored_size: size,
        stored_mtime: mtime,
        organization_status: OrganizationStatus::Unorganized,
        created_at: now,
        updated_at: now,
    })
}

/// Refresh a copy's cached (hash, size, mtime) after a rescan confirmed its
/// content is unchanged.
pub async fn refresh_copy_metadata(
    pool: &SqlitePool,
    copy_id: i64,
    content_hash: &str,
    size: i64,
    mtime: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE document_copies
        SET stored_content_hash = ?, stored_size = ?, stored_mtime = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(content_hash)
    .bind(size)
    .bind(mtime)
    .bind(now_ts())
    .bind(copy_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// The file at this copy's path was overwritten with different content:
/// point the copy at its new document, refresh the cached metadata, and
/// drop any pending suggestion (it was computed against the old content).
/// Runs as one transaction.
pub async fn repoint_copy(
    pool: &SqlitePool,
    copy_id: i64,
    new_document_id: i64,
    content_hash: &str,
    size: i64,
    mtime: i64,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE document_copies
        SET document_id = ?, stored_content_hash = ?, stored_size = ?, stored_mtime = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(new_document_id)
    .bind(content_hash)
    .bind(size)
    .bind(mtime)
    .bind(now_ts())
    .bind(copy_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM pending_operations WHERE document_copy_id = ?")
        .bind(copy_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Mark a copy ignored and drop its pending suggestion, if any, in one
/// transaction. An ignored file must not be moved by a later apply, so the
/// opt-out consumes the suggestion rather than leaving it in the queue.
pub async fn ignore_copy(pool: &SqlitePool, copy_id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE document_copies SET organization_status = 'ignored', updated_at = ? WHERE id = ?",
    )
    .bind(now_ts())
    .bind(copy_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM pending_operations WHERE document_copy_id = ?")
        .bind(copy_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn set_organization_status(
    pool: &SqlitePool,
    copy_id: i64,
    status: OrganizationStatus,
) -> Result<()> {
    sqlx::query("UPDATE document_copies SET organization_status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now_ts())
        .bind(copy_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_copy(pool: &SqlitePool, copy_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM document_copies WHERE id = ?")
        .bind(copy_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// All copies whose document has more than one copy in this repository,
/// grouped by document id.
pub async fn duplicate_groups(
    pool: &SqlitePool,
    repository_path: &str,
) -> Result<Vec<(i64, Vec<DocumentCopy>)>> {
    let sql = format!(
        r#"
        SELECT {} FROM document_copies
        WHERE repository_path = ?
          AND document_id IN (
            SELECT document_id FROM document_copies
            WHERE repository_path = ?
            GROUP BY document_id
            HAVING COUNT(id) > 1
          )
        ORDER BY document_id, id
        "#,
        COPY_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(repository_path)
        .bind(repository_path)
        .fetch_all(pool)
        .await?;

    let mut groups: Vec<(i64, Vec<DocumentCopy>)> = Vec::new();
    for row in &rows {
        let copy = copy_from_row(row)?;
        match groups.last_mut() {
            Some((doc_id, copies)) if *doc_id == copy.document_id => copies.push(copy),
            _ => groups.push((copy.document_id, vec![copy])),
        }
    }
    Ok(groups)
}

// ---------------------------------------------------------------------------
// Pending operations
// ---------------------------------------------------------------------------

/// Record a suggestion for a copy, replacing any previous one (at most one
/// pending suggestion exists per copy).
#[allow(clippy::too_many_arguments)]
pub async fn upsert_pending_operation(
    pool: &SqlitePool,
    copy_id: i64,
    suggested_directory_path: &str,
    suggested_filename: &str,
    reason: &str,
    confidence: f64,
    prompt_hash: &str,
) -> Result<PendingOperation> {
    let now = now_ts();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM pending_operations WHERE document_copy_id = ?")
        .bind(copy_id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query(
        r#"
        INSERT INTO pending_operations
            (document_copy_id, suggested_directory_path, suggested_filename,
             reason, confidence, prompt_hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(copy_id)
    .bind(suggested_directory_path)
    .bind(suggested_filename)
    .bind(reason)
    .bind(confidence)
    .bind(prompt_hash)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(PendingOperation {
        id: result.last_insert_rowid(),
        document_copy_id: Some(copy_id),
        suggested_directory_path: suggested_directory_path.to_string(),
        suggested_filename: suggested_filename.to_string(),
        reason: reason.to_string(),
        confidence,
        prompt_hash: prompt_hash.to_string(),
        created_at: now,
    })
}

/// Pending suggestions for a repository, joined with their copies, ordered
/// by file path. Orphaned rows (copy deleted) are excluded.
pub async fn pending_operations(
    pool: &SqlitePool,
    repository_path: &str,
) -> Result<Vec<(PendingOperation, DocumentCopy)>> {
    let rows = sqlx::query(
        r#"
        SELECT
            p.id AS p_id, p.document_copy_id, p.suggested_directory_path,
            p.suggested_filename, p.reason, p.confidence, p.prompt_hash,
            p.created_at AS p_created_at,
            c.id, c.document_id, c.repository_path, c.file_path,
            c.stored_content_hash, c.stored_size, c.stored_mtime,
            c.organization_status, c.created_at, c.updated_at
        FROM pending_operations p
        JOIN document_copies c ON p.document_copy_id = c.id
        WHERE c.repository_path = ?
        ORDER BY c.file_path
        "#,
    )
    .bind(repository_path)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let pending = PendingOperation {
            id: row.get("p_id"),
            document_copy_id: row.get("document_copy_id"),
            suggested_directory_path: row.get("suggested_directory_path"),
            suggested_filename: row.get("suggested_filename"),
            reason: row.get("reason"),
            confidence: row.get("confidence"),
            prompt_hash: row.get("prompt_hash"),
            created_at: row.get("p_created_at"),
        };
        out.push((pending, copy_from_row(row)?));
    }
    Ok(out)
}

pub async fn pending_operation_for_copy(
    pool: &SqlitePool,
    copy_id: i64,
) -> Result<Option<PendingOperation>> {
    let row = sqlx::query(
        r#"
        SELECT id, document_copy_id, suggested_directory_path, suggested_filename,
               reason, confidence, prompt_hash, created_at
        FROM pending_operations WHERE document_copy_id = ?
        "#,
    )
    .bind(copy_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(pending_from_row).transpose()
}

// ---------------------------------------------------------------------------
// Operation history
// ---------------------------------------------------------------------------

/// Consume a pending suggestion after a confirmed filesystem move: update
/// the copy's location and status, write the `applied` history row with
/// denormalized original paths, and delete the pending row — atomically.
///
/// An overwrite move may have destroyed another tracked file at the target
/// path. That file's copy row is removed first (it describes a file that no
/// longer exists, and it holds the unique path the moved copy is taking
/// over), and a document left without copies goes with it.
pub async fn record_applied(
    pool: &SqlitePool,
    pending: &PendingOperation,
    copy: &DocumentCopy,
    final_file_path: &str,
) -> Result<()> {
    let now = now_ts();
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM document_copies WHERE repository_path = ? AND file_path = ? AND id != ?",
    )
    .bind(&copy.repository_path)
    .bind(final_file_path)
    .bind(copy.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE document_copies
        SET file_path = ?, organization_status = 'organized', updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(final_file_path)
    .bind(now)
    .bind(copy.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO operations
            (document_copy_id, original_repository_path, original_file_path,
             suggested_directory_path, suggested_filename, reason, prompt_hash,
             outcome, final_file_path, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'applied', ?, ?)
        "#,
    )
    .bind(copy.id)
    .bind(&copy.repository_path)
    .bind(&copy.file_path)
    .bind(&pending.suggested_directory_path)
    .bind(&pending.suggested_filename)
    .bind(&pending.reason)
    .bind(&pending.prompt_hash)
    .bind(final_file_path)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM pending_operations WHERE id = ?")
        .bind(pending.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "DELETE FROM documents WHERE id NOT IN (SELECT DISTINCT document_id FROM document_copies)",
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Dismiss a pending suggestion without touching the filesystem.
pub async fn record_dismissed(
    pool: &SqlitePool,
    pending: &PendingOperation,
    copy: &DocumentCopy,
) -> Result<()> {
    let now = now_ts();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO operations
            (document_copy_id, original_repository_path, original_file_path,
             suggested_directory_path, suggested_filename, reason, prompt_hash,
             outcome, final_file_path, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'dismissed', NULL, ?)
        "#,
    )
    .bind(copy.id)
    .bind(&copy.repository_path)
    .bind(&copy.file_path)
    .bind(&pending.suggested_directory_path)
    .bind(&pending.suggested_filename)
    .bind(&pending.reason)
    .bind(&pending.prompt_hash)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM pending_operations WHERE id = ?")
        .bind(pending.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn operations_for_copy(
    pool: &SqlitePool,
    copy_id: i64,
) -> Result<Vec<crate::models::Operation>> {
    let rows = sqlx::query(
        r#"
        SELECT id, document_copy_id, original_repository_path, original_file_path,
               suggested_directory_path, suggested_filename, reason, prompt_hash,
               outcome, final_file_path, created_at
        FROM operations WHERE document_copy_id = ? ORDER BY id
        "#,
    )
    .bind(copy_id)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let outcome: String = row.get("outcome");
        out.push(crate::models::Operation {
            id: row.get("id"),
            document_copy_id: row.get("document_copy_id"),
            original_repository_path: row.get("original_repository_path"),
            original_file_path: row.get("original_file_path"),
            suggested_directory_path: row.get("suggested_directory_path"),
            suggested_filename: row.get("suggested_filename"),
            reason: row.get("reason"),
            prompt_hash: row.get("prompt_hash"),
            outcome: OperationOutcome::parse(&outcome)?,
            final_file_path: row.get("final_file_path"),
            created_at: row.get("created_at"),
        });
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Summary counts
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct RepositoryCounts {
    pub documents: i64,
    pub copies: i64,
    pub unorganized: i64,
    pub organized: i64,
    pub ignored: i64,
    pub pending: i64,
}

pub async fn repository_counts(
    pool: &SqlitePool,
    repository_path: &str,
) -> Result<RepositoryCounts> {
    let copies: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM document_copies WHERE repository_path = ?")
            .bind(repository_path)
            .fetch_one(pool)
            .await?;
    let documents: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT document_id) FROM document_copies WHERE repository_path = ?",
    )
    .bind(repository_path)
    .fetch_one(pool)
    .await?;

    let mut counts = RepositoryCounts {
        documents,
        copies,
        ..Default::default()
    };
    for status in ["unorganized", "organized", "ignored"] {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM document_copies WHERE repository_path = ? AND organization_status = ?",
        )
        .bind(repository_path)
        .bind(status)
        .fetch_one(pool)
        .await?;
        match status {
            "unorganized" => counts.unorganized = n,
            "organized" => counts.organized = n,
            _ => counts.ignored = n,
        }
    }

    counts.pending = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM pending_operations p
        JOIN document_copies c ON p.document_copy_id = c.id
        WHERE c.repository_path = ?
        "#,
    )
    .bind(repository_path)
    .fetch_one(pool)
    .await?;

    Ok(counts)
}
