//! Manifest Loader (C2) and the project manifest data model (spec §3).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::ManifestError;
use super::path_guard;

pub const MANIFEST_FILE_NAME: &str = "sflowg.yaml";

/// Raw project manifest, as declared by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub runtime: RuntimeSpec,
    #[serde(default)]
    pub properties: std::collections::BTreeMap<String, serde_json::Value>,
    pub plugins: Vec<PluginSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSpec {
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl Default for RuntimeSpec {
    fn default() -> Self {
        Self {
            port: None,
            version: None,
        }
    }
}

/// A single user-declared plugin entry (spec §3 PluginSpec).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSpec {
    pub source: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

/// The fully-defaulted manifest produced by [`load`].
#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    pub name: String,
    pub version: String,
    pub port: String,
    pub runtime_version: String,
    pub properties: std::collections::BTreeMap<String, serde_json::Value>,
    pub plugins: Vec<PluginSpec>,
}

const DEFAULT_VERSION: &str = "latest";
const DEFAULT_PORT: &str = "8080";

/// Reads and validates the manifest at `project_dir/sflowg.yaml`, applying
/// the defaults from spec §4.1. `project_dir` must itself be a boundary the
/// caller trusts; this function does not escape it since it only ever reads
/// the single conventional file name within it.
pub fn load(project_dir: &Path) -> Result<ResolvedManifest, ManifestError> {
    let manifest_path = path_guard::guard(project_dir, Path::new(MANIFEST_FILE_NAME))?;

    if !manifest_path.is_file() {
        return Err(ManifestError::NotFound(manifest_path));
    }

    let raw = std::fs::read_to_string(&manifest_path)
        .map_err(|_| ManifestError::NotFound(manifest_path.clone()))?;

    let manifest: Manifest = serde_yaml::from_str(&raw).map_err(|source| ManifestError::Parse {
        path: manifest_path.clone(),
        source,
    })?;

    resolve(manifest, project_dir, &manifest_path)
}

fn resolve(
    manifest: Manifest,
    project_dir: &Path,
    manifest_path: &Path,
) -> Result<ResolvedManifest, ManifestError> {
    if manifest.plugins.is_empty() {
        return Err(ManifestError::NoPlugins(manifest_path.to_path_buf()));
    }

    let mut plugins = Vec::with_capacity(manifest.plugins.len());
    for (index, mut plugin) in manifest.plugins.into_iter().enumerate() {
        if plugin.source.is_empty() {
            return Err(ManifestError::EmptyPluginSource {
                path: manifest_path.to_path_buf(),
                index,
            });
        }
        if plugin.version.as_deref().map(str::is_empty).unwrap_or(true) {
            plugin.version = Some(DEFAULT_VERSION.to_string());
        }
        plugins.push(plugin);
    }

    let name = manifest.name.unwrap_or_else(|| default_project_name(project_dir));

    Ok(ResolvedManifest {
        name,
        version: manifest.version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
        port: manifest.runtime.port.unwrap_or_else(|| DEFAULT_PORT.to_string()),
        runtime_version: manifest
            .runtime
            .version
            .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
        properties: manifest.properties,
        plugins,
    })
}

fn default_project_name(project_dir: &Path) -> String {
    project_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sflowg-project".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_manifest(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(MANIFEST_FILE_NAME);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            "plugins:\n  - source: http\n  - source: ./plugins/uuidgen\n",
        );
        let resolved = load(dir.path()).unwrap();
        assert_eq!(resolved.version, "latest");
        assert_eq!(resolved.port, "8080");
        assert_eq!(resolved.runtime_version, "latest");
        assert_eq!(resolved.plugins.len(), 2);
        assert_eq!(resolved.plugins[0].version.as_deref(), Some("latest"));
    }

    #[test]
    fn rejects_empty_plugins() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "plugins: []\n");
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::NoPlugins(_)));
    }

    #[test]
    fn rejects_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "plugins:\n  - name: foo\n");
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }) || matches!(err, ManifestError::EmptyPluginSource { .. }));
    }

    #[test]
    fn missing_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::NotFound(_)));
    }
}
