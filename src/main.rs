//! # Shelf CLI (`shelf`)
//!
//! The `shelf` binary is the interface to a shelf repository: a directory
//! tree whose document files are tracked by content hash in a SQLite
//! database under `.shelf/`.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `shelf init` | Create a repository in the current directory |
//! | `shelf scan [PATH]` | Index document files (`-r` recursive, `--rescan` forced) |
//! | `shelf suggest <FILE> <DIR> <NAME>` | Record an organization suggestion |
//! | `shelf pending [PATH]` | List suggestions awaiting review |
//! | `shelf apply [PATH]` | Move files per their suggestions |
//! | `shelf reject [PATH]` | Dismiss suggestions without moving |
//! | `shelf ignore <PATH>` | Exclude file(s) from organization |
//! | `shelf unmark <PATH>` | Return file(s) to the unorganized pool |
//! | `shelf duplicates` | List documents with multiple copies |
//! | `shelf status` | Repository summary counts |
//!
//! ## Examples
//!
//! ```bash
//! # Create a repository and index everything under it
//! shelf init
//! shelf scan -r
//!
//! # Record and apply a suggestion
//! shelf suggest inbox/a.pdf Finance/2024 invoice.pdf --reason "2024 invoice"
//! shelf apply --on-conflict rename
//!
//! # Keep scans fast; force a full re-hash when needed
//! shelf scan -r --rescan
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use shelf::mover::ConflictPolicy;
use shelf::{config, duplicates, mark, organize, scan, status};

/// Shelf CLI — content-addressed document tracking and organization for
/// local file repositories.
///
/// All commands except `init` must run inside a shelf repository (a
/// directory tree containing a `.shelf/` marker, found by walking up from
/// the current directory).
#[derive(Parser)]
#[command(
    name = "shelf",
    about = "Shelf — content-addressed document tracking and organization",
    version,
    long_about = "Shelf tracks document files by the SHA-256 of their content, deduplicates \
    identical files across paths, and manages reviewed organization suggestions: proposed \
    target locations applied with path-safety validation and conflict-aware moves."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create a shelf repository in the current directory.
    ///
    /// Writes the `.shelf/` marker directory with a default `config.toml`.
    /// This command is idempotent — running it in an existing repository
    /// is safe.
    Init,

    /// Index document files into the repository database.
    ///
    /// Hashes each discovered file, deduplicates identical content, and
    /// extracts text. Unchanged files (same size and mtime as last scan)
    /// are skipped without re-hashing. Records for deleted files are
    /// cleaned up before scanning.
    Scan {
        /// File or directory to scan. Defaults to the repository root.
        path: Option<PathBuf>,

        /// Recurse into subdirectories.
        #[arg(short, long)]
        recursive: bool,

        /// Re-hash every file even when cached metadata matches.
        #[arg(long)]
        rescan: bool,
    },

    /// Record an organization suggestion for a tracked file.
    ///
    /// The suggestion is validated syntactically (no absolute paths, no
    /// `..`, no reserved characters) and stored as a pending operation.
    /// A file has at most one pending suggestion; a new one replaces it.
    Suggest {
        /// The tracked file the suggestion applies to.
        file: PathBuf,

        /// Suggested directory, relative to the repository root. May be
        /// empty (`""`) to place the file directly under the root.
        directory: String,

        /// Suggested filename.
        filename: String,

        /// Why this location was suggested.
        #[arg(long)]
        reason: String,

        /// Suggestion confidence in [0.0, 1.0].
        #[arg(long, default_value_t = 1.0)]
        confidence: f64,

        /// Identifier of the prompt/engine that produced the suggestion.
        /// Defaults to a hash of the suggestion fields.
        #[arg(long)]
        prompt_hash: Option<String>,
    },

    /// List suggestions awaiting review.
    Pending {
        /// Narrow to the suggestion for one file.
        path: Option<PathBuf>,
    },

    /// Apply pending suggestions: move files to their suggested locations.
    ///
    /// Each target path is re-validated before the move. Unsafe
    /// suggestions are dismissed; conflicts and missing sources are
    /// skipped without aborting the batch.
    Apply {
        /// Narrow to the suggestion for one file.
        path: Option<PathBuf>,

        /// What to do when a different file already exists at the target:
        /// `skip` (default), `overwrite`, or `rename` (move to `name_1.ext`).
        #[arg(long, value_parser = parse_policy, default_value = "skip")]
        on_conflict: ConflictPolicy,
    },

    /// Dismiss pending suggestions without moving anything.
    Reject {
        /// Narrow to the suggestion for one file.
        path: Option<PathBuf>,
    },

    /// Mark file(s) as ignored for organization.
    ///
    /// Ignored files stay tracked (they still participate in
    /// deduplication) but are excluded from suggestion workflows.
    /// A directory argument marks every tracked file under it.
    Ignore {
        /// Tracked file or directory.
        path: PathBuf,
    },

    /// Return file(s) to the unorganized pool.
    Unmark {
        /// Tracked file or directory.
        path: PathBuf,
    },

    /// List documents with more than one copy in this repository.
    Duplicates,

    /// Show repository summary counts.
    Status,
}

fn parse_policy(s: &str) -> Result<ConflictPolicy, String> {
    match s {
        "skip" => Ok(ConflictPolicy::Skip),
        "overwrite" => Ok(ConflictPolicy::Overwrite),
        "rename" => Ok(ConflictPolicy::Rename),
        other => Err(format!(
            "invalid conflict policy '{}' (expected skip, overwrite, or rename)",
            other
        )),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // init is the one command that runs outside a repository
    if let Commands::Init = cli.command {
        let root = config::init_repository(&std::env::current_dir()?)?;
        println!("Initialized shelf repository at {}", root.display());
        return Ok(());
    }

    let repo_root = config::require_repository_root(&std::env::current_dir()?)?;

    match cli.command {
        Commands::Init => unreachable!(),
        Commands::Scan {
            path,
            recursive,
            rescan,
        } => {
            scan::run_scan(&repo_root, path.as_deref(), recursive, rescan).await?;
        }
        Commands::Suggest {
            file,
            directory,
            filename,
            reason,
            confidence,
            prompt_hash,
        } => {
            organize::run_suggest(
                &repo_root,
                &file,
                &directory,
                &filename,
                &reason,
                confidence,
                prompt_hash.as_deref(),
            )
            .await?;
        }
        Commands::Pending { path } => {
            organize::run_pending(&repo_root, path.as_deref()).await?;
        }
        Commands::Apply { path, on_conflict } => {
            organize::run_apply(&repo_root, path.as_deref(), on_conflict).await?;
        }
        Commands::Reject { path } => {
            organize::run_reject(&repo_root, path.as_deref()).await?;
        }
        Commands::Ignore { path } => {
            mark::run_ignore(&repo_root, &path).await?;
        }
        Commands::Unmark { path } => {
            mark::run_unmark(&repo_root, &path).await?;
        }
        Commands::Duplicates => {
            duplicates::run_duplicates(&repo_root).await?;
        }
        Commands::Status => {
            status::run_status(&repo_root).await?;
        }
    }

    Ok(())
}
