//! Per-file processing pipeline.
//!
//! Decides what a scanned file *is*: looks up its copy record, skips
//! unchanged files via cached (size, mtime), hashes changed ones, and
//! reconciles document/copy rows. This is the only code that mutates
//! Document/DocumentCopy state from scan activity. Every failure path
//! leaves existing records untouched.

use anyhow::Result;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::extract::Extract;
use crate::models::{Document, DocumentCopy};
use crate::store;

/// Read size for streamed hashing; bounds memory on large files.
const HASH_CHUNK_BYTES: usize = 64 * 1024;

/// Outcome of processing one scanned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingResult {
    /// First time this content was seen anywhere; document created.
    NewDocument,
    /// The file at this path was overwritten with different content; the
    /// copy was repointed to another document.
    UpdatedDocument,
    /// Content already known from another path; a second copy was attached.
    DuplicateDocument,
    /// Nothing changed; cached metadata confirmed or refreshed.
    ReusedCopy,
    /// Identity bookkeeping succeeded but the document still has no
    /// extracted content.
    ExtractionFailed,
    /// The file could not be read for hashing; no records were touched.
    HashFailed,
}

/// Hex SHA-256 of a file's full byte content, streamed in fixed chunks.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_BYTES];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn mtime_nanos(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Processing pipeline with an injected extractor. The extractor is
/// caller-constructed so its lifecycle is owned by the caller, not by
/// process-global state.
pub struct Pipeline<'a> {
    extractor: &'a dyn Extract,
    hashes: AtomicU64,
}

impl<'a> Pipeline<'a> {
    pub fn new(extractor: &'a dyn Extract) -> Self {
        Self {
            extractor,
            hashes: AtomicU64::new(0),
        }
    }

    /// Number of hash computations performed so far. The staleness
    /// short-circuit is observable here.
    pub fn hashes_performed(&self) -> u64 {
        self.hashes.load(Ordering::Relaxed)
    }

    /// Process one file under `repo_root` at the relative path `rel_path`.
    ///
    /// With `rescan`, the (size, mtime) staleness short-circuit is skipped
    /// and the file is re-hashed unconditionally.
    pub async fn process_file(
        &self,
        pool: &SqlitePool,
        repo_root: &Path,
        rel_path: &Path,
        rescan: bool,
    ) -> Result<(Option<DocumentCopy>, ProcessingResult)> {
        let repository_path = repo_root.to_string_lossy().into_owned();
        let file_path = rel_path.to_string_lossy().into_owned();
        let abs_path = repo_root.join(rel_path);

        let existing = store::find_copy(pool, &repository_path, &file_path).await?;

        let meta = match std::fs::metadata(&abs_path) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = %abs_path.display(), error = %e, "failed to stat file");
                return Ok((existing, ProcessingResult::HashFailed));
            }
        };
        let size = meta.len() as i64;
        let mtime = mtime_nanos(&meta);

        // Staleness short-circuit: skip hashing when the cached metadata
        // still matches the filesystem. Only trusted when the cached hash
        // agrees with the document's hash and the document has content;
        // any divergence forces a rehash.
        if let Some(copy) = &existing {
            if !rescan && copy.stored_size == size && copy.stored_mtime == mtime {
                let doc = store::document(pool, copy.document_id).await?;
                if doc.content_hash == copy.stored_content_hash && doc.content.is_some() {
                    debug!(path = %file_path, "copy unchanged, skipping hash");
                    return Ok((existing, ProcessingResult::ReusedCopy));
                }
            }
        }

        self.hashes.fetch_add(1, Ordering::Relaxed);
        let hash = match hash_file(&abs_path) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(path = %abs_path.display(), error = %e, "failed to hash file");
                return Ok((existing, ProcessingResult::HashFailed));
            }
        };

        if let Some(copy) = existing {
            let doc = store::document(pool, copy.document_id).await?;
            if doc.content_hash == hash {
                // Same content; just refresh the cached metadata.
                store::refresh_copy_metadata(pool, copy.id, &hash, size, mtime).await?;
                let doc = self.backfill_content(pool, doc, &abs_path).await?;
                let copy = store::copy(pool, copy.id).await?;
                let result = if doc.content.is_none() {
                    ProcessingResult::ExtractionFailed
                } else {
                    ProcessingResult::ReusedCopy
                };
                return Ok((Some(copy), result));
            }

            // Content changed in place: repoint the copy and drop any
            // suggestion computed against the old content.
            let (doc, _created) = self.resolve_document(pool, &abs_path, &hash).await?;
            store::repoint_copy(pool, copy.id, doc.id, &hash, size, mtime).await?;
            let copy = store::copy(pool, copy.id).await?;
            let result = if doc.content.is_none() {
                ProcessingResult::ExtractionFailed
            } else {
                ProcessingResult::UpdatedDocument
            };
            return Ok((Some(copy), result));
        }

        // No copy at this path yet.
        match store::find_document_by_hash(pool, &hash).await? {
            Some(doc) => {
                let copy =
                    store::attach_copy(pool, doc.id, &repository_path, &file_path, &hash, size, mtime)
                        .await?;
                let doc = self.backfill_content(pool, doc, &abs_path).await?;
                let result = if doc.content.is_none() {
                    ProcessingResult::ExtractionFailed
                } else {
                    ProcessingResult::DuplicateDocument
                };
                Ok((Some(copy), result))
            }
            None => {
                let content = self.extractor.extract(&abs_path);
                let (doc, copy) = store::create_document_with_copy(
                    pool,
                    &hash,
                    content.as_deref(),
                    &repository_path,
                    &file_path,
                    size,
                    mtime,
                )
                .await?;
                let result = if doc.content.is_none() {
                    ProcessingResult::ExtractionFailed
                } else {
                    ProcessingResult::NewDocument
                };
                Ok((Some(copy), result))
            }
        }
    }

    /// Find the document for `hash`, creating it (with extraction) when the
    /// content has never been seen. Returns whether it was created.
    async fn resolve_document(
        &self,
        pool: &SqlitePool,
        abs_path: &Path,
        hash: &str,
    ) -> Result<(Document, bool)> {
        if let Some(doc) = store::find_document_by_hash(pool, hash).await? {
            let doc = self.backfill_content(pool, doc, abs_path).await?;
            return Ok((doc, false));
        }
        let content = self.extractor.extract(abs_path);
        let now = crate::models::now_ts();
        let result = sqlx::query(
            "INSERT INTO documents (content_hash, content, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(hash)
        .bind(content.as_deref())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
        Ok((
            Document {
                id: result.last_insert_rowid(),
                content_hash: hash.to_string(),
                content,
                created_at: now,
                updated_at: now,
            },
            true,
        ))
    }

    /// Re-attempt extraction for a document whose content is still missing,
    /// so degraded files recover on a later scan.
    async fn backfill_content(
        &self,
        pool: &SqlitePool,
        doc: Document,
        abs_path: &Path,
    ) -> Result<Document> {
        if doc.content.is_some() {
            return Ok(doc);
        }
        match self.extractor.extract(abs_path) {
            Some(text) => {
                store::backfill_document_content(pool, doc.id, &text).await?;
                Ok(Document {
                    content: Some(text),
                    ..doc
                })
            }
            None => Ok(doc),
        }
    }
}
