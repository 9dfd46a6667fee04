//! # Shelf
//!
//! A content-addressed document tracker for local file repositories.
//!
//! Shelf scans a directory tree for document files (PDF, DOCX, text,
//! Markdown, HTML), identifies each file by the SHA-256 of its bytes, and
//! keeps a SQLite database of documents (unique content) and copies (where
//! that content lives on disk). On top of that identity layer it manages
//! organization suggestions: proposed target locations for files, reviewed
//! and applied through the CLI with path-safety validation and
//! conflict-aware moves.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────────┐
//! │   Scan    │──▶│  Pipeline  │──▶│     SQLite      │
//! │ discovery │   │ hash+text │   │ docs/copies/ops │
//! └──────────┘   └───────────┘   └───────┬────────┘
//!                                        │
//!                    ┌───────────────────┤
//!                    ▼                   ▼
//!              ┌──────────┐       ┌──────────┐
//!              │ Suggest/  │       │  Apply   │
//!              │ Pending   │       │ guard+mv │
//!              └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! shelf init                    # create a repository here
//! shelf scan -r                 # index all documents
//! shelf suggest a.pdf Finance/2024 invoice.pdf --reason "invoice"
//! shelf pending                 # review suggestions
//! shelf apply                   # move files into place
//! shelf status                  # summary counts
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Repository discovery and TOML configuration |
//! | [`models`] | Core data types |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`store`] | Reads and writes for the entity tables |
//! | [`pipeline`] | Per-file hash/dedup/extract processing |
//! | [`extract`] | Text extraction (PDF, DOCX, plain text) |
//! | [`scan`] | File discovery and the scan command |
//! | [`path_guard`] | Path-safety validation for suggestions |
//! | [`mover`] | Conflict-aware file relocation |
//! | [`organize`] | Suggestion intake, review, apply, reject |
//! | [`mark`] | Manual ignore/unmark |
//! | [`duplicates`] | Duplicate listing |
//! | [`status`] | Repository summary |

pub mod config;
pub mod db;
pub mod duplicates;
pub mod extract;
pub mod mark;
pub mod migrate;
pub mod models;
pub mod mover;
pub mod organize;
pub mod path_guard;
pub mod pipeline;
pub mod scan;
pub mod status;
pub mod store;
