//! Error taxonomy for the build pipeline (spec §7: ManifestError, AnalysisError,
//! GraphError, VersionResolutionError, CompileError). Each subsystem raises its
//! own typed error; [`BuildError`] aggregates them for the CLI boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Manifest Loader failures (C2): missing/invalid manifest or plugin entry.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest not found at {0}")]
    NotFound(PathBuf),

    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("manifest at {0} declares no plugins")]
    NoPlugins(PathBuf),

    #[error("plugin entry {index} in {path} has an empty source")]
    EmptyPluginSource { path: PathBuf, index: usize },

    #[error("path escapes project boundary: {0}")]
    PathEscape(#[from] PathGuardError),
}

/// Path Guard failures (C1): a path resolves outside its declared boundary.
#[derive(Debug, Error)]
#[error("path '{attempted}' escapes boundary '{boundary}'")]
pub struct PathGuardError {
    pub attempted: PathBuf,
    pub boundary: PathBuf,
}

/// Source Introspector failures (C5): malformed plugin package or missing
/// plugin struct.
#[derive(Debug, Error)]
#[error("analysis error for plugin '{plugin_name}' ({import_path}): {message}")]
pub struct AnalysisError {
    pub plugin_name: String,
    pub import_path: String,
    pub message: String,
}

/// Dependency Graph failures (C6): missing dependency target or cycle.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("plugin '{dependent}' depends on unknown plugin '{target}'")]
    MissingDependency { dependent: String, target: String },

    #[error("circular dependency detected: {}", .0.join(" -> "))]
    Circular(Vec<String>),
}

/// Version Pinner failures (C8): the toolchain produced no concrete version.
#[derive(Debug, Error)]
#[error("could not resolve a version for crate '{crate_name}'")]
pub struct VersionResolutionError {
    pub crate_name: String,
}

/// Builder failures (C10): `cargo` sync/compile failed.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to spawn cargo: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("cargo {step} failed with status {status}:\n{stderr}")]
    ToolchainFailed {
        step: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("failed to copy compiled binary from {from} to {to}: {source}")]
    BinaryCopy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Workspace failures (C11): temp directory creation/cleanup or flow copy.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create build workspace at {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy flow file {from} to {to}: {source}")]
    CopyFlow {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    PathGuard(#[from] PathGuardError),
}

/// Top-level build error aggregating every build-pipeline subsystem.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("dependency graph error: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    VersionResolution(#[from] VersionResolutionError),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("template rendering error: {0}")]
    Template(#[from] tera::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BuildError>;
