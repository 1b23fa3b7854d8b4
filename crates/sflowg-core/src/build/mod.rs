//! Build Pipeline: packages a flow project manifest into a single compiled
//! binary (components C1-C11).

pub mod builder;
pub mod classifier;
pub mod error;
pub mod graph;
pub mod introspect;
pub mod manifest;
pub mod module_manifest;
pub mod path_guard;
pub mod program_emit;
pub mod template;
pub mod version_pin;
pub mod workspace;

use std::path::{Path, PathBuf};

use uuid::Uuid;

use classifier::{PluginOrigin, PluginRecord};
use error::{AnalysisError, BuildError, Result};
use introspect::{PluginMetadata, TaskKind, TaskMethod};
use version_pin::CargoVersionResolver;

/// Options controlling a single build, mirroring the build CLI's conceptual
/// surface (spec §6).
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub runtime_path: Option<PathBuf>,
    pub plugins_path: Option<PathBuf>,
    pub embed_flows: bool,
    /// When set, stop after validation and manifest emission without
    /// invoking the external toolchain (`sflowg build --check`).
    pub dry_run: bool,
}

/// The outcome of a dry-run build: everything that would have been done,
/// without invoking the external toolchain.
#[derive(Debug, Clone)]
pub struct DryRunReport {
    pub project_name: String,
    pub plugin_count: usize,
    pub topological_order: Vec<String>,
    pub rendered_manifest: String,
}

/// Runs the full build pipeline for the project at `project_dir`, producing
/// a compiled binary at `project_dir/<project_name>` (or, in dry-run mode, a
/// [`DryRunReport`] instead).
pub fn run(project_dir: &Path, options: &BuildOptions) -> Result<Option<PathBuf>> {
    let resolved = manifest::load(project_dir)?;
    let records = classifier::classify_all(&resolved.plugins, project_dir);

    let metadata = analyze_all(&records)?;
    let pairs: Vec<(PluginRecord, PluginMetadata)> = records.clone().into_iter().zip(metadata).collect();

    let dependency_pairs: Vec<(String, Vec<String>)> = pairs
        .iter()
        .map(|(record, meta)| {
            (
                record.name.clone(),
                meta.dependencies.iter().map(|d| d.target_plugin_name.clone()).collect(),
            )
        })
        .collect();

    let graph = graph::DependencyGraph::build(&dependency_pairs)?;
    if let Some(cycle) = graph.detect_cycle() {
        return Err(BuildError::Graph(error::GraphError::Circular(cycle)));
    }
    let order = graph.topological_order()?;

    let build_id = Uuid::new_v4();
    let mut build_manifest = module_manifest::build(
        &resolved.name,
        &resolved.runtime_version,
        &records,
        options.runtime_path.as_ref(),
        options.plugins_path.as_ref(),
    );
    version_pin::pin_versions(&mut build_manifest, &CargoVersionResolver)?;
    let rendered_manifest = module_manifest::render(&build_manifest)?;

    if options.dry_run {
        let report = DryRunReport {
            project_name: resolved.name.clone(),
            plugin_count: records.len(),
            topological_order: order,
            rendered_manifest,
        };
        log::info!(
            "dry run for '{}': {} plugin(s), order: {}",
            report.project_name,
            report.plugin_count,
            report.topological_order.join(" -> ")
        );
        log::info!("rendered manifest:\n{}", report.rendered_manifest);
        return Ok(None);
    }

    let program_source = program_emit::render(&pairs, &resolved.port, &resolved.properties)?;

    let workspace = workspace::Workspace::create(build_id)?;
    std::fs::write(workspace.root().join("Cargo.toml"), &rendered_manifest)?;
    std::fs::create_dir_all(workspace.root().join("src"))?;
    std::fs::write(workspace.root().join("src/main.rs"), &program_source)?;

    if options.embed_flows {
        let flows_dir = project_dir.join("flows");
        if flows_dir.is_dir() {
            workspace.copy_flows(project_dir, &flows_dir)?;
        }
    }

    builder::sync_dependencies(workspace.root())?;
    let binary_path = builder::compile(workspace.root(), &build_manifest.package_name, project_dir)?;

    workspace.cleanup()?;

    log::debug!("plugin initialization order: {}", order.join(" -> "));
    Ok(Some(binary_path))
}

/// Introspects every non-Core plugin's source. Core plugins ship with the
/// runtime crate rather than living in the build workspace, so they can't be
/// parsed the way Local plugins are; [`core_plugin_metadata`] below is a
/// hand-written descriptor for each one this build knows about. Remote
/// plugins have no local source and no registry entry, so they're rejected
/// instead of silently described as empty.
fn analyze_all(records: &[PluginRecord]) -> Result<Vec<PluginMetadata>> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        match record.origin {
            PluginOrigin::Core => {
                let metadata = core_plugin_metadata(&record.name).ok_or_else(|| AnalysisError {
                    plugin_name: record.name.clone(),
                    import_path: record.module_path.clone(),
                    message: format!("'{}' is not a known core plugin", record.name),
                })?;
                out.push(metadata);
            }
            PluginOrigin::Local => {
                let source_path = record
                    .source_path
                    .clone()
                    .expect("classifier always sets source_path for Local plugins");
                out.push(introspect::analyze_package(&source_path, &record.module_path)?);
            }
            PluginOrigin::Remote => {
                return Err(AnalysisError {
                    plugin_name: record.name.clone(),
                    import_path: record.module_path.clone(),
                    message: "remote plugin introspection is not supported; vendor it as a local plugin instead".to_string(),
                }
                .into());
            }
        }
    }
    Ok(out)
}

/// Descriptors for the first-party Core plugins the runtime crate ships.
/// `http` is the only one named anywhere in the project manifest examples;
/// it wraps outbound HTTP calls behind a single `MapTask`.
fn core_plugin_metadata(name: &str) -> Option<PluginMetadata> {
    match name {
        "http" => Some(PluginMetadata {
            type_name: "HttpPlugin".to_string(),
            package_name: "http".to_string(),
            has_config: false,
            config_schema: None,
            dependencies: Vec::new(),
            tasks: vec![TaskMethod {
                method_name: "request".to_string(),
                task_name: "http.request".to_string(),
                kind: TaskKind::MapTask,
                has_valid_signature: true,
            }],
        }),
        _ => None,
    }
}
