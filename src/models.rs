//! Core data models used throughout shelf.
//!
//! These types mirror the four SQLite tables: canonical documents, their
//! filesystem copies, not-yet-applied relocation suggestions, and the
//! historical record of suggestions that were applied or dismissed.

use anyhow::{bail, Result};

/// Canonical, content-identified document. Exactly one row exists per
/// distinct content hash, no matter how many files hold those bytes.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: i64,
    /// Hex SHA-256 digest of the full file bytes.
    pub content_hash: String,
    /// Extracted text. `None` means extraction has not succeeded yet.
    pub content: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One physical file location holding (or last known to hold) a document's
/// content. Unique per (repository_path, file_path).
#[derive(Debug, Clone)]
pub struct DocumentCopy {
    pub id: i64,
    pub document_id: i64,
    /// Absolute root of the tracked tree.
    pub repository_path: String,
    /// Path relative to `repository_path`.
    pub file_path: String,
    /// Cached filesystem metadata used to skip re-hashing unchanged files.
    pub stored_content_hash: String,
    pub stored_size: i64,
    /// Modification time in unix nanoseconds.
    pub stored_mtime: i64,
    pub organization_status: OrganizationStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Whether a copy still needs an organization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizationStatus {
    Unorganized,
    Organized,
    Ignored,
}

impl OrganizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationStatus::Unorganized => "unorganized",
            OrganizationStatus::Organized => "organized",
            OrganizationStatus::Ignored => "ignored",
        }
    }

    /// Parse the persisted form. Unknown values are rejected rather than
    /// defaulted — a bad row indicates a schema/version problem.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "unorganized" => Ok(OrganizationStatus::Unorganized),
            "organized" => Ok(OrganizationStatus::Organized),
            "ignored" => Ok(OrganizationStatus::Ignored),
            other => bail!("unknown organization status: '{}'", other),
        }
    }
}

/// An unapplied relocation suggestion for one copy, written by the external
/// suggestion engine. At most one exists per live copy.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub id: i64,
    /// Becomes `None` if the copy is deleted out from under it.
    pub document_copy_id: Option<i64>,
    pub suggested_directory_path: String,
    pub suggested_filename: String,
    pub reason: String,
    pub confidence: f64,
    /// Identifies the suggestion request that produced this row.
    pub prompt_hash: String,
    pub created_at: i64,
}

/// Historical record of an applied or dismissed suggestion. The original
/// paths are denormalized at creation time so history survives copy
/// deletion; they are never recomputed from the live copy.
#[derive(Debug, Clone)]
pub struct Operation {
    pub id: i64,
    pub document_copy_id: Option<i64>,
    pub original_repository_path: String,
    pub original_file_path: String,
    pub suggested_directory_path: String,
    pub suggested_filename: String,
    pub reason: String,
    pub prompt_hash: String,
    pub outcome: OperationOutcome,
    /// Where the file actually landed (applied outcomes only).
    pub final_file_path: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    Applied,
    Dismissed,
}

impl OperationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationOutcome::Applied => "applied",
            OperationOutcome::Dismissed => "dismissed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "applied" => Ok(OperationOutcome::Applied),
            "dismissed" => Ok(OperationOutcome::Dismissed),
            other => bail!("unknown operation outcome: '{}'", other),
        }
    }
}

/// Current unix timestamp in seconds, used for all `created_at`/`updated_at`
/// columns.
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}
