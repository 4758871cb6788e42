//! Argument parsing and command handlers for the `mdctx` binary.
//!
//! Kept in a library so integration tests and doc tooling can build the
//! [`clap::Command`] without spawning the binary. `main.rs` only wires
//! configuration, logging and dispatch.

pub mod commands;
pub mod render;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};

/// When to emit ANSI colors.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Let owo-colors decide from the terminal.
    #[default]
    Auto,
    /// Color even when piped.
    Always,
    /// Plain text.
    Never,
}

impl ColorChoice {
    const fn forced(self) -> Option<bool> {
        match self {
            Self::Auto => None,
            Self::Always => Some(true),
            Self::Never => Some(false),
        }
    }

    /// Set the process-wide color override, if this choice forces one.
    pub fn apply(self) {
        if let Some(on) = self.forced() {
            owo_colors::set_override(on);
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG           Log filter (e.g., debug, mdctx_core=trace)
    MDCTX_LOG_PATH     Explicit log file path
    MDCTX_LOG_DIR      Log directory
    MDCTX_<KEY>        Override any config key (nested: MDCTX_GENERATOR__MODEL)
    GEMINI_API_KEY     API key for `process` (also read from .env)
";

/// Top-level arguments. Flags other than `--version-only` apply to every subcommand.
#[derive(Parser)]
#[command(name = "mdctx")]
#[command(about = "Measure markdown files against LLM context windows", long_about = None)]
#[command(version, arg_required_else_help = true)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Print the bare version string and exit
    #[arg(long)]
    pub version_only: bool,

    /// Extra config file, merged above any discovered ones
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Change to DIR before doing anything else
    #[arg(short = 'C', long, global = true, value_name = "DIR")]
    pub chdir: Option<PathBuf>,

    /// Log errors only and hide progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Color mode
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Emit JSON on stdout instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

/// Subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Measure every markdown file in one or more directories
    Analyze(commands::analyze::AnalyzeArgs),

    /// Estimate tokens in a single file
    Tokens(commands::tokens::TokensArgs),

    /// Show the model context table and fit thresholds
    Models(commands::models::ModelsArgs),

    /// Reformat markdown files through Gemini
    Process(commands::process::ProcessArgs),

    /// Show version and effective configuration
    Info(commands::info::InfoArgs),
}

impl Commands {
    /// Subcommand name as typed on the command line.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Analyze(_) => "analyze",
            Self::Tokens(_) => "tokens",
            Self::Models(_) => "models",
            Self::Process(_) => "process",
            Self::Info(_) => "info",
        }
    }
}

/// The full clap definition, for man pages and completions.
pub fn command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        command().debug_assert();
    }

    #[test]
    fn names_match_clap() {
        let cli = Cli::try_parse_from(["mdctx", "tokens", "a.md"]).unwrap();
        assert_eq!(cli.command.unwrap().name(), "tokens");
        assert!(command().find_subcommand("process").is_some());
    }

    #[test]
    fn auto_color_leaves_detection_alone() {
        assert_eq!(ColorChoice::Auto.forced(), None);
        assert_eq!(ColorChoice::Never.forced(), Some(false));
    }

    #[test]
    fn analyze_accepts_repeated_models() {
        let cli = Cli::try_parse_from([
            "mdctx",
            "analyze",
            "docs",
            "--model",
            "small=8192",
            "--model",
            "big=128000",
        ])
        .unwrap();
        let Some(Commands::Analyze(args)) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.models.len(), 2);
        assert_eq!(args.models[0].name, "small");
        assert_eq!(args.models[1].context_tokens, 128_000);
    }
}
