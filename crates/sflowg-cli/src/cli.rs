//! Command-line surface for the `sflowg` build tool (spec §6: "Build CLI
//! (conceptual surface)").

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "sflowg", about = "Packages an SFlowG project into a single deployable binary")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the project at `project_dir` (defaults to the current directory).
    Build {
        #[arg(default_value = ".")]
        project_dir: PathBuf,

        /// Override the runtime module with a local development path.
        #[arg(long)]
        runtime_path: Option<PathBuf>,

        /// Override core plugin modules with a local development path.
        #[arg(long)]
        plugins_path: Option<PathBuf>,

        /// Embed the project's flow files into the compiled binary.
        #[arg(long)]
        embed_flows: bool,

        /// Validate and emit the build manifest without invoking the
        /// toolchain.
        #[arg(long)]
        check: bool,
    },
}
