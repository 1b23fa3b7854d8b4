mod cli;

use clap::Parser;
use sflowg_core::build::{self, BuildOptions};

use cli::{Cli, Command};

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build {
            project_dir,
            runtime_path,
            plugins_path,
            embed_flows,
            check,
        } => {
            let options = BuildOptions {
                runtime_path,
                plugins_path,
                embed_flows,
                dry_run: check,
            };

            match build::run(&project_dir, &options) {
                Ok(Some(binary_path)) => {
                    println!("built {}", binary_path.display());
                }
                Ok(None) => {
                    println!("manifest valid, no errors found");
                }
                Err(err) => {
                    eprintln!("build failed: {err}");
                    std::process::exit(1);
                }
            }
        }
    }
}
