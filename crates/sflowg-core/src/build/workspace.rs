//! Workspace (C11): an isolated build directory that holds the generated
//! program, build manifest, and copied flow files, per spec §4.9.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::error::WorkspaceError;
use super::path_guard;

const FLOW_EXTENSIONS: &[&str] = &["flow.yaml", "flow.yml"];

pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Creates a fresh, uniquely-named directory under the OS temp location.
    pub fn create(build_id: Uuid) -> Result<Workspace, WorkspaceError> {
        let root = std::env::temp_dir().join(format!("sflowg-build-{build_id}"));
        std::fs::create_dir_all(&root).map_err(|source| WorkspaceError::Create {
            path: root.clone(),
            source,
        })?;
        Ok(Workspace { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copies every file under `flows_source_dir` whose name ends in one of
    /// the flow loader's advertised extensions into `<workspace>/flows`.
    /// `flows_source_dir` is verified to be inside `project_dir` before any
    /// file is touched.
    pub fn copy_flows(&self, project_dir: &Path, flows_source_dir: &Path) -> Result<Vec<PathBuf>, WorkspaceError> {
        let guarded = path_guard::guard(project_dir, flows_source_dir)?;
        let dest_dir = self.root.join("flows");
        std::fs::create_dir_all(&dest_dir).map_err(|source| WorkspaceError::Create {
            path: dest_dir.clone(),
            source,
        })?;

        let mut copied = Vec::new();
        if guarded.is_dir() {
            let entries = std::fs::read_dir(&guarded).map_err(|source| WorkspaceError::Create {
                path: guarded.clone(),
                source,
            })?;
            for entry in entries.flatten() {
                let path = entry.path();
                if !is_flow_file(&path) {
                    continue;
                }
                let file_name = path.file_name().expect("file_name checked by is_flow_file");
                let dest = dest_dir.join(file_name);
                std::fs::copy(&path, &dest).map_err(|source| WorkspaceError::CopyFlow {
                    from: path.clone(),
                    to: dest.clone(),
                    source,
                })?;
                copied.push(dest);
            }
        }
        Ok(copied)
    }

    /// Removes the workspace directory and everything under it.
    pub fn cleanup(self) -> Result<(), WorkspaceError> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root).map_err(|source| WorkspaceError::Create {
                path: self.root.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

fn is_flow_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    FLOW_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn creates_unique_directory() {
        let ws1 = Workspace::create(Uuid::new_v4()).unwrap();
        let ws2 = Workspace::create(Uuid::new_v4()).unwrap();
        assert_ne!(ws1.root(), ws2.root());
        assert!(ws1.root().exists());
        ws1.cleanup().unwrap();
        ws2.cleanup().unwrap();
    }

    #[test]
    fn copies_only_flow_files() {
        let project_dir = tempfile::tempdir().unwrap();
        let flows_dir = project_dir.path().join("flows");
        std::fs::create_dir_all(&flows_dir).unwrap();
        std::fs::File::create(flows_dir.join("order.flow.yaml"))
            .unwrap()
            .write_all(b"id: order\n")
            .unwrap();
        std::fs::File::create(flows_dir.join("README.md")).unwrap();

        let ws = Workspace::create(Uuid::new_v4()).unwrap();
        let copied = ws.copy_flows(project_dir.path(), &flows_dir).unwrap();
        assert_eq!(copied.len(), 1);
        assert!(copied[0].ends_with("order.flow.yaml"));
        ws.cleanup().unwrap();
    }

    #[test]
    fn rejects_flows_dir_outside_project() {
        let project_dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let ws = Workspace::create(Uuid::new_v4()).unwrap();
        let err = ws.copy_flows(project_dir.path(), outside.path()).unwrap_err();
        assert!(matches!(err, WorkspaceError::PathGuard(_)));
        ws.cleanup().unwrap();
    }

    #[test]
    fn cleanup_removes_directory() {
        let ws = Workspace::create(Uuid::new_v4()).unwrap();
        let root = ws.root().to_path_buf();
        ws.cleanup().unwrap();
        assert!(!root.exists());
    }
}
