//! mdctx CLI
#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use camino::Utf8PathBuf;
use clap::Parser;
use mdctx::{Cli, Commands, commands};
use mdctx_core::config::{Config, ConfigLoader, ConfigOrigin};
use tracing::debug;

mod observability;

fn utf8(path: PathBuf, what: &str) -> anyhow::Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|raw| anyhow!("{what} is not valid UTF-8: {}", raw.display()))
}

/// Project search starts at the (possibly `-C`-changed) working directory.
fn load_config(explicit: Option<&PathBuf>) -> anyhow::Result<(Config, ConfigOrigin)> {
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let mut loader = ConfigLoader::new().search_from(utf8(cwd, "current directory")?);
    if let Some(path) = explicit {
        loader = loader.add_file(utf8(path.clone(), "config path")?);
    }
    loader.load().context("failed to load configuration")
}

fn run(command: Commands, cli: &Cli, config: &Config, origin: &ConfigOrigin) -> anyhow::Result<()> {
    let json = cli.json;
    match command {
        Commands::Analyze(args) => commands::analyze::cmd_analyze(args, json, config),
        Commands::Tokens(args) => commands::tokens::cmd_tokens(args, json, config),
        Commands::Models(args) => commands::models::cmd_models(args, json, config),
        Commands::Process(args) => commands::process::cmd_process(args, json, cli.quiet, config),
        Commands::Info(args) => commands::info::cmd_info(args, json, config, origin),
    }
}

fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    cli.color.apply();

    if cli.version_only {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    // clap already printed help when neither a subcommand nor --version-only was given
    let Some(command) = cli.command.take() else {
        return Ok(());
    };

    if let Some(dir) = &cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    // Read after -C so a project-local .env is honoured.
    let dotenv = dotenvy::dotenv();
    let (config, origin) = load_config(cli.config.as_ref())?;

    let logging = observability::ObservabilityConfig::from_env_with_overrides(
        config.log_dir.clone().map(Utf8PathBuf::into_std_path_buf),
    );
    let filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let console = cli.verbose > 0 || std::env::var_os("RUST_LOG").is_some();
    let _guard = observability::init_observability(&logging, filter, console)
        .context("failed to initialize logging")?;

    debug!(
        command = command.name(),
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        config_file = ?origin.effective_file(),
        "starting"
    );
    match dotenv {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "ignoring unreadable .env"),
    }

    run(command, &cli, &config, &origin).inspect_err(|err| {
        tracing::error!(error = %err, "command failed");
    })
}
