//! Hand-wired example program of the shape the build pipeline's Program
//! Emitter generates: constructs plugins, registers their tasks, registers
//! the built-in response handlers, and starts the app.

mod flows;
mod plugins;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sflowg_core::runtime::app::{App, AppConfig};
use sflowg_core::runtime::config_init::ConfigDefaults;
use sflowg_core::runtime::container::{task_trampoline, Container};
use sflowg_core::runtime::http::register_builtin_handlers;
use sflowg_core::runtime::value_store::ValueStore;

use plugins::greeter::{GreeterConfig, GreeterPlugin};
use plugins::uuidgen::UuidgenPlugin;

/// Flags a program emitted by the build pipeline would parse at startup.
#[derive(Debug, Parser)]
struct Args {
    /// Overrides the flows directory (falls back to FLOWS_PATH, then the
    /// executable's own directory).
    #[arg(long)]
    flows: Option<PathBuf>,

    /// Overrides the HTTP listen port.
    #[arg(long)]
    port: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let mut container = Container::new();

    let uuidgen = Arc::new(UuidgenPlugin);
    container.register("uuidgen", uuidgen.clone())?;
    container.register_task("uuidgen.generate", task_trampoline(uuidgen.clone(), UuidgenPlugin::generate));

    let greeter_config = GreeterConfig::defaults();
    let greeter = Arc::new(GreeterPlugin::new(greeter_config));
    container.register("greeter", greeter.clone())?;
    container.register_task("greeter.greet", task_trampoline(greeter.clone(), GreeterPlugin::greet));

    register_builtin_handlers(&mut container);

    container.initialize().await?;

    let port = args.port.unwrap_or_else(|| "8080".to_string());
    let embedded_flows = if args.flows.is_some() { vec![] } else { vec![flows::greet_flow()] };

    let app = App::new(
        AppConfig {
            port,
            global_properties: ValueStore::new(),
            flows_dir: args.flows,
            embedded_flows,
        },
        container,
    );

    app.run().await
}
