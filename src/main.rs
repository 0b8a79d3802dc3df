use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use strata::{
    child_control::ExternalClientLauncher,
    config::{self, Config},
    desktop::Desktop,
    shell::Shell,
};

/// Workspace and shell supervision for a Wayland session.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Config file to read instead of the default location. It must exist.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Shell component to launch on startup, in addition to the configured ones.
    #[arg(long = "shell-component", value_name = "COMMAND")]
    shell_components: Vec<String>,
}

fn main() -> ExitCode {
    strata::logging::init_logger("SHELL");
    let args = Args::parse();
    run(args)
        .inspect_err(|err| log::error!("{err:#}"))
        .unwrap_or(ExitCode::FAILURE)
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let mut config = match args.config {
        Some(path) => Config::load_existing(&path)?,
        None => {
            let path = config::config_path();
            match config::write_documented_defaults(&path) {
                Ok(true) => log::info!("Wrote config template to {}", path.display()),
                Ok(false) => {}
                Err(err) => {
                    log::warn!("Failed to write config template to {}: {err}", path.display())
                }
            }
            Config::load(&path)?
        }
    };
    config.shell_component.extend(args.shell_components);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    runtime.block_on(async {
        let shell = Shell::new(
            &config,
            Desktop::default(),
            Arc::new(ExternalClientLauncher::new()),
        )?;
        log::info!("Session started");
        Ok::<_, anyhow::Error>(shell.run().await)
    })
}
