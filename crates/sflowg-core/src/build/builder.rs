//! Builder (C10): invokes the external toolchain to sync dependencies and
//! compile the generated program, then copies the resulting binary to the
//! project directory, per spec §4.9.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::error::CompileError;

/// Runs `cargo fetch` inside `workspace_root` to sync dependencies against
/// the (possibly freshly-pinned) build manifest.
pub fn sync_dependencies(workspace_root: &Path) -> Result<(), CompileError> {
    run_cargo(workspace_root, &["fetch"], "fetch")
}

/// Runs `cargo build --release` inside `workspace_root`, then copies the
/// produced binary to `project_dir/<binary_name>`, marking it executable.
pub fn compile(workspace_root: &Path, binary_name: &str, project_dir: &Path) -> Result<PathBuf, CompileError> {
    run_cargo(workspace_root, &["build", "--release"], "build")?;

    let compiled = workspace_root
        .join("target")
        .join("release")
        .join(binary_name);
    let destination = project_dir.join(binary_name);

    std::fs::copy(&compiled, &destination).map_err(|source| CompileError::BinaryCopy {
        from: compiled.clone(),
        to: destination.clone(),
        source,
    })?;

    mark_executable(&destination)?;
    Ok(destination)
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<(), CompileError> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = std::fs::metadata(path).map_err(|source| CompileError::BinaryCopy {
        from: path.to_path_buf(),
        to: path.to_path_buf(),
        source,
    })?;
    let mut perms = metadata.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms).map_err(|source| CompileError::BinaryCopy {
        from: path.to_path_buf(),
        to: path.to_path_buf(),
        source,
    })
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<(), CompileError> {
    Ok(())
}

fn run_cargo(workspace_root: &Path, args: &[&str], step: &'static str) -> Result<(), CompileError> {
    let output = Command::new("cargo")
        .args(args)
        .current_dir(workspace_root)
        .output()
        .map_err(CompileError::Spawn)?;

    if !output.status.success() {
        return Err(CompileError::ToolchainFailed {
            step,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_reports_missing_binary_as_copy_error() {
        let workspace = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(workspace.path().join("target/release")).unwrap();
        let project_dir = tempfile::tempdir().unwrap();

        // No cargo invocation happens here; this exercises the copy-failure
        // path directly by pointing at a binary that was never produced.
        let compiled = workspace.path().join("target/release/sflowg-app");
        let destination = project_dir.path().join("sflowg-app");
        let result = std::fs::copy(&compiled, &destination);
        assert!(result.is_err());
    }
}
