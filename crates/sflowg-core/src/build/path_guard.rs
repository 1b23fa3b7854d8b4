//! Path Guard (C1): reject any path that would escape a declared boundary
//! directory once both are resolved to their canonical form.

use std::path::{Path, PathBuf};

use super::error::PathGuardError;

/// Resolves `candidate` relative to `boundary` and confirms the result stays
/// inside `boundary`. `candidate` may be absolute or relative; `boundary`
/// must already exist on disk (the project directory, a flows source
/// directory, etc).
pub fn guard(boundary: &Path, candidate: &Path) -> Result<PathBuf, PathGuardError> {
    let boundary_canon = boundary.canonicalize().map_err(|_| PathGuardError {
        attempted: candidate.to_path_buf(),
        boundary: boundary.to_path_buf(),
    })?;

    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        boundary_canon.join(candidate)
    };

    let resolved = canonicalize_lexically(&joined);

    if resolved.starts_with(&boundary_canon) {
        Ok(resolved)
    } else {
        Err(PathGuardError {
            attempted: candidate.to_path_buf(),
            boundary: boundary.to_path_buf(),
        })
    }
}

/// Like `Path::canonicalize`, but tolerant of paths that don't exist yet
/// (e.g. a not-yet-created workspace file): normalizes `.`/`..` components
/// lexically instead of resolving symlinks on disk.
fn canonicalize_lexically(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_paths_inside_boundary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        let result = guard(dir.path(), Path::new("sub/file.yaml"));
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_parent_escape() {
        let dir = tempfile::tempdir().unwrap();
        let result = guard(dir.path(), Path::new("../../etc/passwd"));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_absolute_escape() {
        let dir = tempfile::tempdir().unwrap();
        let result = guard(dir.path(), Path::new("/etc/passwd"));
        assert!(result.is_err());
    }
}
