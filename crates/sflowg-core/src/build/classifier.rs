//! Plugin Classifier (C4): decides where a declared plugin source comes from,
//! infers its name, and expands its module path, per spec §3/§4.3.

use std::path::{Path, PathBuf};

use super::manifest::PluginSpec;

/// The fixed module base that core plugin identifiers expand under.
pub const CORE_PLUGINS_BASE: &str = "sflowg.dev/plugins";

/// The synthetic module namespace fabricated for local plugins so the build
/// manifest can carry a replace directive for them (spec §4.3).
pub const LOCAL_MODULE_NAMESPACE: &str = "example.com/local";

/// Where a plugin's code is meant to be sourced from (spec §3 PluginOrigin).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOrigin {
    /// A first-party plugin, addressed by a single identifier.
    Core,
    /// A path relative to, or under, the project directory.
    Local,
    /// A qualified module path, used verbatim.
    Remote,
}

/// A plugin source together with its resolved origin, inferred name, and
/// expanded module path (spec §3 PluginRecord).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRecord {
    pub origin: PluginOrigin,
    pub name: String,
    pub module_path: String,
    pub version: String,
    pub raw_config: serde_json::Map<String, serde_json::Value>,
    pub source_path: Option<PathBuf>,
}

/// Classifies every plugin entry in `specs`. Classification is total: every
/// `PluginSpec` produces exactly one `PluginRecord` (spec §8 property 1),
/// since the source-string shape alone determines the origin.
pub fn classify_all(specs: &[PluginSpec], project_dir: &Path) -> Vec<PluginRecord> {
    specs.iter().map(|spec| classify_one(spec, project_dir)).collect()
}

fn classify_one(spec: &PluginSpec, project_dir: &Path) -> PluginRecord {
    let source = spec.source.trim();
    let origin = classify(source);
    let name = spec.name.clone().unwrap_or_else(|| infer_name(source, &origin));
    let module_path = expand_module_path(source, &name, &origin);
    let source_path = match origin {
        PluginOrigin::Local => Some(project_dir.join(source)),
        _ => None,
    };

    PluginRecord {
        origin,
        name,
        module_path,
        version: spec.version.clone().unwrap_or_else(|| "latest".to_string()),
        raw_config: spec.config.clone(),
        source_path,
    }
}

/// `classify(source) -> PluginOrigin` per the rules in spec §3: local paths
/// start with `./`, `../`, or `/`; remote modules contain a `/` but aren't a
/// local path; anything else is a single core-plugin identifier.
pub fn classify(source: &str) -> PluginOrigin {
    if is_local_path(source) {
        PluginOrigin::Local
    } else if source.contains('/') {
        PluginOrigin::Remote
    } else {
        PluginOrigin::Core
    }
}

fn is_local_path(source: &str) -> bool {
    source.starts_with("./") || source.starts_with("../") || source.starts_with('/')
}

/// `inferName(source, origin)`: for Core, the source itself; otherwise the
/// last path segment.
pub fn infer_name(source: &str, origin: &PluginOrigin) -> String {
    match origin {
        PluginOrigin::Core => source.to_string(),
        PluginOrigin::Local | PluginOrigin::Remote => Path::new(source)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.to_string()),
    }
}

/// `expandModulePath`: Core prefixes with the fixed plugins base; Local
/// fabricates a synthetic `example.com/local/<name>` path; Remote is used
/// verbatim.
pub fn expand_module_path(source: &str, name: &str, origin: &PluginOrigin) -> String {
    match origin {
        PluginOrigin::Core => format!("{CORE_PLUGINS_BASE}/{name}"),
        PluginOrigin::Local => format!("{LOCAL_MODULE_NAMESPACE}/{name}"),
        PluginOrigin::Remote => source.to_string(),
    }
}
