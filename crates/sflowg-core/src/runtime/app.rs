//! App Lifecycle (C19): initializes the container, loads flows, starts the
//! HTTP server, and shuts down gracefully, per spec §4.15.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;

use super::container::Container;
use super::error::RuntimeError;
use super::flow_loader;
use super::http::{self, AppState};
use super::value_store::ValueStore;

/// Default deadline for graceful HTTP shutdown (spec §2.3/§5): requests in
/// flight get this long to finish before the listener is torn down.
pub const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

pub struct AppConfig {
    pub port: String,
    pub global_properties: ValueStore,
    pub flows_dir: Option<PathBuf>,
    pub embedded_flows: Vec<super::flow::Flow>,
}

pub struct App {
    config: AppConfig,
    container: Container,
}

impl App {
    pub fn new(config: AppConfig, container: Container) -> Self {
        App { config, container }
    }

    /// Runs the full lifecycle: initialize container -> load flows ->
    /// register routes -> start server -> wait for signal -> shutdown server
    /// -> shutdown container (reverse order).
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        self.container.initialize().await?;

        let flows = self.load_flows()?;
        log::info!("loaded {} flow(s)", flows.len());

        let state = Arc::new(AppState {
            container: Arc::new(self.container),
            global_properties: self.config.global_properties,
        });

        let router = http::build_router(flows, state.clone());

        let addr = format!("0.0.0.0:{}", self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        log::info!("listening on {addr}");

        axum::serve(listener, router)
            .with_graceful_shutdown(wait_for_shutdown_signal())
            .await?;

        log::info!("server stopped, shutting down plugins");
        tokio::time::timeout(DEFAULT_SHUTDOWN_DEADLINE, state.container.shutdown())
            .await
            .unwrap_or_else(|_| log::warn!("plugin shutdown exceeded {:?} deadline", DEFAULT_SHUTDOWN_DEADLINE));

        Ok(())
    }

    fn load_flows(&self) -> Result<Vec<super::flow::Flow>, RuntimeError> {
        if !self.config.embedded_flows.is_empty() {
            return Ok(self.config.embedded_flows.clone());
        }
        let dir = self.flows_dir();
        flow_loader::load_all(&dir).map_err(|err| RuntimeError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))
    }

    /// Flows-location priority (spec §6): explicit flag/config > `FLOWS_PATH`
    /// env var > `<exeDir>/flows` > `<exeDir>`.
    fn flows_dir(&self) -> PathBuf {
        if let Some(dir) = &self.config.flows_dir {
            return dir.clone();
        }
        if let Ok(env_path) = std::env::var("FLOWS_PATH") {
            return PathBuf::from(env_path);
        }
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        let candidate = exe_dir.join("flows");
        if candidate.is_dir() {
            candidate
        } else {
            exe_dir
        }
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Flattens a raw JSON-valued global-properties map into a [`ValueStore`]
/// with the manifest's key-normalization and nested-expansion rules applied
/// (spec §4.8: "the program ... injects global properties").
pub fn build_global_store(properties: HashMap<String, Value>) -> ValueStore {
    ValueStore::from_properties(properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flows_dir_prefers_explicit_override() {
        let config = AppConfig {
            port: "0".to_string(),
            global_properties: ValueStore::new(),
            flows_dir: Some(PathBuf::from("/explicit/flows")),
            embedded_flows: vec![],
        };
        let app = App::new(config, Container::new());
        assert_eq!(app.flows_dir(), PathBuf::from("/explicit/flows"));
    }
}
