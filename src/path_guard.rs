//! Path-safety validation for suggested file locations.
//!
//! Organization suggestions come from an untrusted external engine, so a
//! suggested directory + filename must never be joined onto the repository
//! root blindly. Validation is two-layered: a syntactic check on the raw
//! string components (which gives a precise rejection reason and cannot be
//! bypassed by symlinks, since it never touches the filesystem), then a
//! resolved-path containment check (which catches symlinked directories
//! that escape the root even though the raw strings looked clean).

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathSecurityError {
    #[error("path component cannot be empty")]
    Empty,
    #[error("path component cannot contain null bytes")]
    NullByte,
    #[error("path component cannot be absolute: {0}")]
    Absolute(String),
    #[error("path component cannot contain parent directory traversal (..): {0}")]
    ParentTraversal(String),
    #[error("path component contains invalid character '{ch}': {component}")]
    InvalidCharacter { ch: char, component: String },
    #[error("base path must be absolute: {0}")]
    BaseNotAbsolute(PathBuf),
    #[error("suggested path escapes repository: repository={root}, suggested={path}")]
    EscapesRepository { root: PathBuf, path: PathBuf },
    #[error("path is outside repository boundaries: repository={root}, path={path}")]
    OutsideRepository { root: PathBuf, path: PathBuf },
    #[error("failed to resolve {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Characters rejected in any suggested component. Conservative superset of
/// what Windows forbids, applied on every platform so suggestions stay
/// portable.
const INVALID_CHARS: [char; 7] = ['<', '>', ':', '"', '|', '?', '*'];

/// Validate a single suggested path component (directory or filename).
///
/// Purely syntactic — runs on the raw string before any filesystem
/// resolution. Rejects empty strings (unless `allow_empty`), NUL bytes,
/// absolute paths, `..` segments anywhere in the component, and the
/// conservative invalid-character set.
pub fn validate_path_component(component: &str, allow_empty: bool) -> Result<(), PathSecurityError> {
    if component.is_empty() {
        if allow_empty {
            return Ok(());
        }
        return Err(PathSecurityError::Empty);
    }

    if component.contains('\0') {
        return Err(PathSecurityError::NullByte);
    }

    let path = Path::new(component);
    if path.is_absolute() {
        return Err(PathSecurityError::Absolute(component.to_string()));
    }

    // "safe/../danger" must fail, not just a leading ".."
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(PathSecurityError::ParentTraversal(component.to_string()));
    }

    for ch in INVALID_CHARS {
        if component.contains(ch) {
            return Err(PathSecurityError::InvalidCharacter {
                ch,
                component: component.to_string(),
            });
        }
    }

    Ok(())
}

/// Validate and compose a safe absolute target path within the repository.
///
/// `base_path` must be absolute. `suggested_dir` may be empty (file lands
/// directly under the root); `suggested_filename` must not be. The composed
/// path is resolved through the filesystem and must be a descendant of the
/// resolved base, even when the raw components passed the syntactic check.
pub fn validate_target_path(
    base_path: &Path,
    suggested_dir: &str,
    suggested_filename: &str,
) -> Result<PathBuf, PathSecurityError> {
    if !base_path.is_absolute() {
        return Err(PathSecurityError::BaseNotAbsolute(base_path.to_path_buf()));
    }

    validate_path_component(suggested_dir, true)?;
    validate_path_component(suggested_filename, false)?;

    let mut full_path = base_path.to_path_buf();
    if !suggested_dir.is_empty() {
        full_path.push(suggested_dir);
    }
    full_path.push(suggested_filename);

    let resolved_base = resolve_existing(base_path)?;
    let resolved_full = resolve_lenient(&full_path)?;

    if !resolved_full.starts_with(&resolved_base) {
        return Err(PathSecurityError::EscapesRepository {
            root: resolved_base,
            path: resolved_full,
        });
    }

    Ok(resolved_full)
}

/// Standalone containment check, usable as a second line of defense before
/// any filesystem mutation.
pub fn validate_repository_path(path: &Path, repo_root: &Path) -> Result<(), PathSecurityError> {
    let resolved_root = resolve_existing(repo_root)?;
    let resolved = resolve_lenient(path)?;

    if !resolved.starts_with(&resolved_root) {
        return Err(PathSecurityError::OutsideRepository {
            root: resolved_root,
            path: resolved,
        });
    }

    Ok(())
}

fn resolve_existing(path: &Path) -> Result<PathBuf, PathSecurityError> {
    path.canonicalize().map_err(|e| PathSecurityError::Resolve {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Resolve a path that may not fully exist yet: canonicalize the deepest
/// existing ancestor (following symlinks), then append the remaining
/// components lexically. The remainder is already component-validated, so
/// it contains no `..` segments; `.` segments are dropped.
fn resolve_lenient(path: &Path) -> Result<PathBuf, PathSecurityError> {
    let mut existing = path.to_path_buf();
    let mut remainder: Vec<std::ffi::OsString> = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(resolved) => {
                let mut out = resolved;
                for part in remainder.iter().rev() {
                    out.push(part);
                }
                return Ok(out);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                match existing.file_name() {
                    Some(name) => {
                        if name != "." {
                            remainder.push(name.to_os_string());
                        }
                        existing.pop();
                    }
                    None => {
                        return Err(PathSecurityError::Resolve {
                            path: path.to_path_buf(),
                            source: e,
                        })
                    }
                }
            }
            Err(e) => {
                return Err(PathSecurityError::Resolve {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn accepts_simple_components() {
        assert!(validate_path_component("invoices", false).is_ok());
        assert!(validate_path_component("Fin/2024", false).is_ok());
        assert!(validate_path_component("report v2.pdf", false).is_ok());
    }

    #[test]
    fn rejects_empty_unless_allowed() {
        assert!(matches!(
            validate_path_component("", false),
            Err(PathSecurityError::Empty)
        ));
        assert!(validate_path_component("", true).is_ok());
    }

    #[test]
    fn rejects_traversal_anywhere() {
        assert!(matches!(
            validate_path_component("..", false),
            Err(PathSecurityError::ParentTraversal(_))
        ));
        assert!(matches!(
            validate_path_component("a/../b", false),
            Err(PathSecurityError::ParentTraversal(_))
        ));
        assert!(matches!(
            validate_path_component("safe/../danger", false),
            Err(PathSecurityError::ParentTraversal(_))
        ));
    }

    #[test]
    fn rejects_absolute_null_and_invalid_chars() {
        assert!(matches!(
            validate_path_component("/etc", false),
            Err(PathSecurityError::Absolute(_))
        ));
        assert!(matches!(
            validate_path_component("a\0b", false),
            Err(PathSecurityError::NullByte)
        ));
        for bad in ["a<b", "a>b", "a:b", "a\"b", "a|b", "a?b", "a*b"] {
            assert!(
                matches!(
                    validate_path_component(bad, false),
                    Err(PathSecurityError::InvalidCharacter { .. })
                ),
                "expected rejection for {:?}",
                bad
            );
        }
    }

    #[test]
    fn composed_target_stays_inside_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();

        let target = validate_target_path(&root, "a/b", "c.pdf").unwrap();
        assert!(target.starts_with(&root));
        assert_eq!(target.strip_prefix(&root).unwrap(), Path::new("a/b/c.pdf"));

        // Empty directory: file lands directly under the root
        let target = validate_target_path(&root, "", "c.pdf").unwrap();
        assert_eq!(target, root.join("c.pdf"));
    }

    #[test]
    fn escape_attempts_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();

        assert!(matches!(
            validate_target_path(&root, "../../etc", "passwd"),
            Err(PathSecurityError::ParentTraversal(_))
        ));
        assert!(matches!(
            validate_target_path(&root, "/etc", "passwd"),
            Err(PathSecurityError::Absolute(_))
        ));
        assert!(matches!(
            validate_target_path(Path::new("relative/base"), "a", "b.pdf"),
            Err(PathSecurityError::BaseNotAbsolute(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_escape_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        let outside = tmp.path().join("outside");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&outside).unwrap();

        // "exports" passes the syntactic check but resolves outside the root
        std::os::unix::fs::symlink(&outside, root.join("exports")).unwrap();

        assert!(matches!(
            validate_target_path(&root, "exports", "doc.pdf"),
            Err(PathSecurityError::EscapesRepository { .. })
        ));
    }

    #[test]
    fn repository_containment_check() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        std::fs::write(root.join("a.txt"), "x").unwrap();

        assert!(validate_repository_path(&root.join("a.txt"), &root).is_ok());
        assert!(matches!(
            validate_repository_path(Path::new("/etc/passwd"), &root),
            Err(PathSecurityError::OutsideRepository { .. })
        ));
    }
}
