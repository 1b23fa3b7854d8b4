//! Flow loading: reads every flow file (by the extensions this loader
//! advertises) from a directory, for the App Lifecycle (C19) to register as
//! HTTP routes.

use std::path::Path;

use super::flow::{Flow, FLOW_FILE_EXTENSIONS};

#[derive(Debug, thiserror::Error)]
pub enum FlowLoadError {
    #[error("cannot read flows directory {path}: {source}")]
    Directory {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot read flow file {path}: {source}")]
    ReadFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse flow file {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Loads every flow file directly under `flows_dir`.
pub fn load_all(flows_dir: &Path) -> Result<Vec<Flow>, FlowLoadError> {
    let mut flows = Vec::new();
    let entries = std::fs::read_dir(flows_dir).map_err(|source| FlowLoadError::Directory {
        path: flows_dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<_> = entries.flatten().map(|e| e.path()).filter(|p| is_flow_file(p)).collect();
    paths.sort();

    for path in paths {
        let raw = std::fs::read_to_string(&path).map_err(|source| FlowLoadError::ReadFile {
            path: path.clone(),
            source,
        })?;
        let flow: Flow = serde_yaml::from_str(&raw).map_err(|source| FlowLoadError::Parse {
            path: path.clone(),
            source,
        })?;
        flows.push(flow);
    }

    Ok(flows)
}

fn is_flow_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    FLOW_FILE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_flows_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let flow_yaml = r#"
id: sample
entrypoint:
  type: http
  config:
    method: post
    path: /sample
steps: []
return:
  type: http.json
  args: {}
"#;
        std::fs::File::create(dir.path().join("b.flow.yaml")).unwrap().write_all(flow_yaml.as_bytes()).unwrap();
        std::fs::File::create(dir.path().join("a.flow.yaml")).unwrap().write_all(flow_yaml.as_bytes()).unwrap();
        std::fs::File::create(dir.path().join("ignored.txt")).unwrap();

        let flows = load_all(dir.path()).unwrap();
        assert_eq!(flows.len(), 2);
    }
}
