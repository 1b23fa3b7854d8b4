//! Version Pinner (C8): resolves "latest"/sentinel crate versions against
//! the external toolchain and pins them into the build manifest, per spec
//! §4.7.

use std::process::Command;

use super::error::VersionResolutionError;
use super::module_manifest::{BuildManifest, DependencySource};

const SENTINEL_VERSION: &str = "0.0.0-unresolved";

/// Queries the external toolchain for the latest published version of
/// `crate_name`. The build pipeline never implements a registry client
/// itself; it delegates to whatever the deployed toolchain exposes.
pub trait VersionResolver {
    fn resolve_latest(&self, crate_name: &str) -> Option<String>;
}

/// Resolver backed by `cargo search`, the toolchain already used by the
/// Builder (C10) for dependency sync and compilation.
pub struct CargoVersionResolver;

impl VersionResolver for CargoVersionResolver {
    fn resolve_latest(&self, crate_name: &str) -> Option<String> {
        let output = Command::new("cargo")
            .args(["search", crate_name, "--limit", "1"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_cargo_search_version(&stdout, crate_name)
    }
}

fn parse_cargo_search_version(stdout: &str, crate_name: &str) -> Option<String> {
    let line = stdout.lines().find(|line| line.starts_with(crate_name))?;
    let version = line.split('=').nth(1)?;
    Some(version.trim().trim_matches('"').to_string())
}

/// Pins every dependency whose source is still the sentinel version, leaving
/// path-sourced (local-override) dependencies untouched since those are
/// never version-resolved.
pub fn pin_versions(manifest: &mut BuildManifest, resolver: &dyn VersionResolver) -> Result<(), VersionResolutionError> {
    pin_one(&manifest.runtime.crate_name.clone(), &mut manifest.runtime.source, resolver)?;

    for dep in &mut manifest.dependencies {
        pin_one(&dep.crate_name.clone(), &mut dep.source, resolver)?;
    }

    Ok(())
}

fn pin_one(crate_name: &str, source: &mut DependencySource, resolver: &dyn VersionResolver) -> Result<(), VersionResolutionError> {
    if let DependencySource::Version(v) = source {
        if v == SENTINEL_VERSION {
            let resolved = resolver
                .resolve_latest(crate_name)
                .ok_or_else(|| VersionResolutionError { crate_name: crate_name.to_string() })?;
            *v = resolved;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::module_manifest::DependencyEntry;

    struct FakeResolver {
        version: Option<&'static str>,
    }

    impl VersionResolver for FakeResolver {
        fn resolve_latest(&self, _crate_name: &str) -> Option<String> {
            self.version.map(str::to_string)
        }
    }

    fn manifest_with_one_dependency() -> BuildManifest {
        BuildManifest {
            package_name: "demo".to_string(),
            runtime: DependencyEntry {
                crate_name: "sflowg-core".to_string(),
                module_path: "sflowg.dev/runtime".to_string(),
                source: DependencySource::Version(SENTINEL_VERSION.to_string()),
            },
            dependencies: vec![DependencyEntry {
                crate_name: "redis".to_string(),
                module_path: "example.com/x/redis".to_string(),
                source: DependencySource::Version(SENTINEL_VERSION.to_string()),
            }],
        }
    }

    #[test]
    fn pins_sentinel_versions() {
        let mut manifest = manifest_with_one_dependency();
        let resolver = FakeResolver { version: Some("1.4.2") };
        pin_versions(&mut manifest, &resolver).unwrap();
        assert_eq!(manifest.runtime.source, DependencySource::Version("1.4.2".to_string()));
        assert_eq!(manifest.dependencies[0].source, DependencySource::Version("1.4.2".to_string()));
    }

    #[test]
    fn skips_path_dependencies() {
        let mut manifest = manifest_with_one_dependency();
        manifest.dependencies[0].source = DependencySource::Path("/dev/redis".to_string());
        let resolver = FakeResolver { version: Some("1.4.2") };
        pin_versions(&mut manifest, &resolver).unwrap();
        assert_eq!(manifest.dependencies[0].source, DependencySource::Path("/dev/redis".to_string()));
    }

    #[test]
    fn fails_when_resolver_finds_nothing() {
        let mut manifest = manifest_with_one_dependency();
        let resolver = FakeResolver { version: None };
        let err = pin_versions(&mut manifest, &resolver).unwrap_err();
        assert_eq!(err.crate_name, "sflowg-core");
    }
}
