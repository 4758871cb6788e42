//! `mdctx tokens`: estimate one file, optionally against a budget.

use anyhow::{Context, ensure};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use tracing::{debug, instrument};

use mdctx_core::config::Config;
use mdctx_core::tokens::{self, TokenReport};

use crate::render::{Paint, thousands};

/// Arguments for the `tokens` subcommand.
#[derive(Args, Debug)]
pub struct TokensArgs {
    /// Markdown (or any UTF-8) file to estimate.
    pub file: Utf8PathBuf,

    /// Fail when the estimate exceeds this many tokens (overrides `token_budget`).
    #[arg(long, value_name = "TOKENS")]
    pub budget: Option<usize>,
}

fn print_text(file: &Utf8Path, report: &TokenReport) -> anyhow::Result<()> {
    let Some(limit) = report.budget else {
        println!("{}", report.count);
        return Ok(());
    };
    ensure!(
        !report.over_budget,
        "{file} is ~{} tokens (budget: {}). Trim it.",
        thousands(report.count).red(),
        thousands(limit),
    );
    println!(
        "{} {file} is ~{} tokens (budget: {})",
        "PASS:".green(),
        thousands(report.count),
        thousands(limit),
    );
    Ok(())
}

/// Print the estimate; over budget is an error unless `--json` was given.
#[instrument(name = "cmd_tokens", skip_all, fields(file = %args.file))]
pub fn cmd_tokens(args: TokensArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file))?;
    let estimator = config.estimator().context("invalid chars_per_token")?;
    let report = tokens::check_budget(&text, &estimator, args.budget.or(config.token_budget));
    debug!(count = report.count, budget = ?report.budget, "estimated");

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    print_text(&args.file, &report)
}
