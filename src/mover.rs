//! Conflict-aware single-file relocation.
//!
//! Moves one existing file to a validated target path. Expected branches
//! (missing source, target conflict under Skip) are outcome tags rather
//! than errors; hard failures carry source/target context. This module
//! touches the filesystem only — record updates are the caller's job.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// How to resolve a pre-existing file at the target location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Leave both files unchanged and report the conflict.
    Skip,
    /// Delete the existing target, then move.
    Overwrite,
    /// Move to a unique sibling name (`file_1.pdf`, `file_2.pdf`, …).
    Rename,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::Skip => "skip",
            ConflictPolicy::Overwrite => "overwrite",
            ConflictPolicy::Rename => "rename",
        }
    }
}

/// Result of a move attempt. `Conflict` and `SourceMissing` are expected,
/// non-fatal branches callers must handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The file was moved; the path may differ from the requested target
    /// under [`ConflictPolicy::Rename`].
    Moved(PathBuf),
    /// Target existed and policy was Skip; both files untouched.
    Conflict { source: PathBuf, target: PathBuf },
    /// Source file does not exist.
    SourceMissing(PathBuf),
}

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("source is not a regular file: {0}")]
    NotAFile(PathBuf),
    #[error("target directory does not exist: {0}")]
    ParentMissing(PathBuf),
    #[error("permission denied moving {source} to {target}: {cause}")]
    PermissionDenied {
        source: PathBuf,
        target: PathBuf,
        #[source]
        cause: std::io::Error,
    },
    #[error("failed to move {source} to {target}: {cause}")]
    Io {
        source: PathBuf,
        target: PathBuf,
        #[source]
        cause: std::io::Error,
    },
}

/// Move `source` to `target` under the given conflict policy.
///
/// Moving a file onto its own resolved path is a no-op returning
/// `Moved(target)`. With `create_dirs`, missing ancestors of the target are
/// created; otherwise a missing parent is an error. The move is an atomic
/// rename when source and target share a filesystem, falling back to
/// copy-then-delete across filesystems.
pub fn move_file(
    source: &Path,
    target: &Path,
    policy: ConflictPolicy,
    create_dirs: bool,
) -> Result<MoveOutcome, MoveError> {
    if !source.exists() {
        return Ok(MoveOutcome::SourceMissing(source.to_path_buf()));
    }
    if !source.is_file() {
        return Err(MoveError::NotAFile(source.to_path_buf()));
    }

    // No-op when the file is already at the target location
    if let (Ok(resolved_source), Ok(resolved_target)) = (source.canonicalize(), target.canonicalize())
    {
        if resolved_source == resolved_target {
            return Ok(MoveOutcome::Moved(target.to_path_buf()));
        }
    }

    if let Some(parent) = target.parent() {
        if create_dirs {
            std::fs::create_dir_all(parent).map_err(|e| io_error(source, target, e))?;
        } else if !parent.exists() {
            return Err(MoveError::ParentMissing(parent.to_path_buf()));
        }
    }

    let mut final_target = target.to_path_buf();
    if final_target.exists() {
        match policy {
            ConflictPolicy::Skip => {
                return Ok(MoveOutcome::Conflict {
                    source: source.to_path_buf(),
                    target: final_target,
                });
            }
            ConflictPolicy::Overwrite => {
                std::fs::remove_file(&final_target).map_err(|e| io_error(source, target, e))?;
            }
            ConflictPolicy::Rename => {
                final_target = unique_sibling(&final_target);
            }
        }
    }

    rename_or_copy(source, &final_target)?;
    debug!(source = %source.display(), target = %final_target.display(), "moved file");
    Ok(MoveOutcome::Moved(final_target))
}

/// Atomic rename, with a copy-then-delete fallback for cross-filesystem
/// moves (rename fails with EXDEV there).
fn rename_or_copy(source: &Path, target: &Path) -> Result<(), MoveError> {
    match std::fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(MoveError::PermissionDenied {
                source: source.to_path_buf(),
                target: target.to_path_buf(),
                cause: e,
            })
        }
        Err(rename_err) => {
            debug!(
                source = %source.display(),
                error = %rename_err,
                "rename failed, falling back to copy-then-delete"
            );
            std::fs::copy(source, target).map_err(|e| classify(source, target, e))?;
            std::fs::remove_file(source).map_err(|e| classify(source, target, e))?;
            Ok(())
        }
    }
}

fn classify(source: &Path, target: &Path, e: std::io::Error) -> MoveError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        MoveError::PermissionDenied {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            cause: e,
        }
    } else {
        io_error(source, target, e)
    }
}

fn io_error(source: &Path, target: &Path, e: std::io::Error) -> MoveError {
    MoveError::Io {
        source: source.to_path_buf(),
        target: target.to_path_buf(),
        cause: e,
    }
}

/// First non-existing sibling of `path`, appending `_1`, `_2`, … before the
/// extension.
fn unique_sibling(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let mut counter = 1u64;
    loop {
        let name = match &ext {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn moves_file_to_new_location() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.pdf");
        let target = tmp.path().join("sub/dir/b.pdf");
        write(&source, "data");

        let outcome = move_file(&source, &target, ConflictPolicy::Skip, true).unwrap();
        assert_eq!(outcome, MoveOutcome::Moved(target.clone()));
        assert!(!source.exists());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "data");
    }

    #[test]
    fn missing_source_is_an_outcome_not_a_panic() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("missing.pdf");
        let target = tmp.path().join("b.pdf");

        let outcome = move_file(&source, &target, ConflictPolicy::Skip, true).unwrap();
        assert_eq!(outcome, MoveOutcome::SourceMissing(source));
    }

    #[test]
    fn missing_parent_without_create_dirs_fails() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.pdf");
        let target = tmp.path().join("no/such/dir/b.pdf");
        write(&source, "data");

        let err = move_file(&source, &target, ConflictPolicy::Skip, false).unwrap_err();
        assert!(matches!(err, MoveError::ParentMissing(_)));
        assert!(source.exists());
    }

    #[test]
    fn skip_reports_conflict_and_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.pdf");
        let target = tmp.path().join("b.pdf");
        write(&source, "new");
        write(&target, "old");

        let outcome = move_file(&source, &target, ConflictPolicy::Skip, true).unwrap();
        assert!(matches!(outcome, MoveOutcome::Conflict { .. }));
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "new");
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "old");
    }

    #[test]
    fn overwrite_replaces_target() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.pdf");
        let target = tmp.path().join("b.pdf");
        write(&source, "new");
        write(&target, "old");

        let outcome = move_file(&source, &target, ConflictPolicy::Overwrite, true).unwrap();
        assert_eq!(outcome, MoveOutcome::Moved(target.clone()));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn rename_finds_next_free_suffix() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("incoming.pdf");
        let target = tmp.path().join("file.pdf");
        write(&source, "new");
        write(&target, "existing");
        write(&tmp.path().join("file_1.pdf"), "also existing");

        let outcome = move_file(&source, &target, ConflictPolicy::Rename, true).unwrap();
        assert_eq!(
            outcome,
            MoveOutcome::Moved(tmp.path().join("file_2.pdf"))
        );
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("file_2.pdf")).unwrap(),
            "new"
        );
    }

    #[test]
    fn move_to_self_is_a_noop() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.pdf");
        write(&source, "data");
        let before = std::fs::metadata(&source).unwrap().modified().unwrap();

        let outcome = move_file(&source, &source, ConflictPolicy::Skip, true).unwrap();
        assert_eq!(outcome, MoveOutcome::Moved(source.clone()));
        let after = std::fs::metadata(&source).unwrap().modified().unwrap();
        assert_eq!(before, after);
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "data");
    }

    #[test]
    fn directory_source_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("subdir");
        std::fs::create_dir(&dir).unwrap();

        let err = move_file(&dir, &tmp.path().join("x"), ConflictPolicy::Skip, true).unwrap_err();
        assert!(matches!(err, MoveError::NotAFile(_)));
    }
}
