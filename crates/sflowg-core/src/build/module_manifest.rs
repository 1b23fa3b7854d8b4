//! Module Manifest Emitter (C7): renders the generated program's `Cargo.toml`,
//! declaring its dependency on the runtime and on every plugin crate, with
//! local overrides for Local (and, with a dev override, Core) plugins, per
//! spec §4.6.

use std::path::PathBuf;

use serde::Serialize;
use tera::{Context, Tera};

use super::classifier::{PluginOrigin, PluginRecord};

const SENTINEL_VERSION: &str = "0.0.0-unresolved";
const RUST_EDITION: &str = "2021";

const MANIFEST_TEMPLATE: &str = r#"[package]
name = "{{ package_name }}"
version = "0.1.0"
edition = "{{ rust_edition }}"

[[bin]]
name = "{{ package_name }}"
path = "src/main.rs"

[dependencies]
{{ runtime.crate_name }} = { {{ runtime.source }} }
{%- for dep in dependencies %}
{{ dep.crate_name }} = { {{ dep.source }} }
{%- endfor %}
tokio = { version = "1", features = ["full"] }
clap = { version = "4", features = ["derive"] }
log = "0.4"
env_logger = "0.11"
serde_json = "1.0"
"#;

/// Where a dependency's source comes from: a registry version, or a local
/// path override. Cargo has no equivalent of a separate require/replace
/// pair for the same crate, so a dependency is one or the other, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencySource {
    Version(String),
    Path(String),
}

impl Serialize for DependencySource {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            DependencySource::Version(v) => serializer.serialize_str(&format!("version = \"{v}\"")),
            DependencySource::Path(p) => serializer.serialize_str(&format!("path = \"{p}\"")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyEntry {
    pub crate_name: String,
    /// The plugin's expanded module path, kept for traceability between the
    /// manifest and the plugin records it was built from.
    pub module_path: String,
    pub source: DependencySource,
}

/// The emitted build manifest, still holding "latest"/sentinel versions
/// until the Version Pinner (C8) resolves them.
#[derive(Debug, Clone)]
pub struct BuildManifest {
    pub package_name: String,
    pub runtime: DependencyEntry,
    pub dependencies: Vec<DependencyEntry>,
}

pub const RUNTIME_CRATE_NAME: &str = "sflowg-core";
pub const RUNTIME_MODULE_PATH: &str = "sflowg.dev/runtime";

/// Turns a plugin's inferred name into a valid Cargo crate name: lowercased,
/// with any character outside `[a-z0-9_-]` folded to `-`.
pub fn sanitize_package_name(name: &str) -> String {
    let sanitized: String = name
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect();
    if sanitized.is_empty() {
        "pkg".to_string()
    } else {
        sanitized
    }
}

/// Recovers a plugin's crate name from its module path (the last path
/// segment), sanitized to a valid Cargo identifier. Shared with the Program
/// Emitter (C9) so the generated `use` statements name the same crate the
/// manifest declares a dependency on.
pub fn crate_name_from_module_path(module_path: &str) -> String {
    let last = module_path.rsplit('/').next().unwrap_or(module_path);
    sanitize_package_name(last)
}

/// Builds a `BuildManifest` for `plugins`, pairing every Local plugin (and,
/// when provided, a development override for the runtime and Core plugins)
/// to an absolute local path.
pub fn build(
    package_name: &str,
    runtime_version: &str,
    plugins: &[PluginRecord],
    runtime_path_override: Option<&PathBuf>,
    plugins_path_override: Option<&PathBuf>,
) -> BuildManifest {
    let mut dependencies = Vec::with_capacity(plugins.len());

    for plugin in plugins {
        let crate_name = crate_name_from_module_path(&plugin.module_path);

        let source = match plugin.origin {
            PluginOrigin::Local => {
                let path = plugin
                    .source_path
                    .as_ref()
                    .expect("classifier always sets source_path for Local plugins");
                DependencySource::Path(path.to_string_lossy().into_owned())
            }
            PluginOrigin::Core => {
                if let Some(base) = plugins_path_override {
                    DependencySource::Path(base.join(&plugin.name).to_string_lossy().into_owned())
                } else if plugin.version == "latest" {
                    DependencySource::Version(SENTINEL_VERSION.to_string())
                } else {
                    DependencySource::Version(plugin.version.clone())
                }
            }
            PluginOrigin::Remote => {
                if plugin.version == "latest" {
                    DependencySource::Version(SENTINEL_VERSION.to_string())
                } else {
                    DependencySource::Version(plugin.version.clone())
                }
            }
        };

        dependencies.push(DependencyEntry {
            crate_name,
            module_path: plugin.module_path.clone(),
            source,
        });
    }

    let runtime_source = if let Some(path) = runtime_path_override {
        DependencySource::Path(path.to_string_lossy().into_owned())
    } else if runtime_version == "latest" {
        DependencySource::Version(SENTINEL_VERSION.to_string())
    } else {
        DependencySource::Version(runtime_version.to_string())
    };

    BuildManifest {
        package_name: sanitize_package_name(package_name),
        runtime: DependencyEntry {
            crate_name: RUNTIME_CRATE_NAME.to_string(),
            module_path: RUNTIME_MODULE_PATH.to_string(),
            source: runtime_source,
        },
        dependencies,
    }
}

/// Renders `manifest` to its textual `Cargo.toml` form.
pub fn render(manifest: &BuildManifest) -> tera::Result<String> {
    let mut tera = Tera::default();
    tera.add_raw_template("module_manifest", MANIFEST_TEMPLATE)?;

    let mut ctx = Context::new();
    ctx.insert("package_name", &manifest.package_name);
    ctx.insert("rust_edition", RUST_EDITION);
    ctx.insert("runtime", &manifest.runtime);
    ctx.insert("dependencies", &manifest.dependencies);

    tera.render("module_manifest", &ctx)
}
