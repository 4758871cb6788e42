//! Analyze command: per-file statistics and model fit for whole directories.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use mdctx_core::config::Config;
use mdctx_core::fit::{self, FitOrder, FitPolicy, ModelLimit};
use mdctx_core::scan::{
    self, AggregateStats, Averages, CollectingSink, FileReport, ScanOptions, SkippedFile,
};

use crate::render::{self, Paint, TableSink};

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Directories to analyze. Defaults to the configured input directory,
    /// plus the output directory when it exists.
    pub dirs: Vec<Utf8PathBuf>,

    /// File-name glob (default from config, `*.md`).
    #[arg(long)]
    pub pattern: Option<String>,

    /// Model context limit; repeat to build the table in order.
    #[arg(long = "model", value_name = "NAME=TOKENS", value_parser = parse_model_limit)]
    pub models: Vec<ModelLimit>,

    /// Verdict rule.
    #[arg(long, value_enum)]
    pub policy: Option<FitPolicy>,

    /// Order the model table is walked in.
    #[arg(long, value_enum)]
    pub order: Option<FitOrder>,
}

/// Parse `NAME=TOKENS`. The last `=` separates, so names may contain `:`.
pub fn parse_model_limit(s: &str) -> Result<ModelLimit, String> {
    let (name, tokens) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected NAME=TOKENS, got {s:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing model name in {s:?}"));
    }
    let tokens: usize = tokens
        .trim()
        .replace('_', "")
        .parse()
        .map_err(|e| format!("invalid token count in {s:?}: {e}"))?;
    if tokens == 0 {
        return Err(format!("context size must be positive in {s:?}"));
    }
    Ok(ModelLimit::new(name, tokens))
}

#[derive(Serialize)]
struct DirectoryReport {
    directory: Utf8PathBuf,
    files: Vec<FileReport>,
    skipped: Vec<SkippedFile>,
    totals: AggregateStats,
    averages: Option<Averages>,
}

/// Build scan options from config plus command-line overrides.
fn scan_options(args: &AnalyzeArgs, config: &Config) -> anyhow::Result<ScanOptions> {
    let mut options = ScanOptions::from_config(config).context("invalid analysis settings")?;

    if let Some(ref pattern) = args.pattern {
        options = options.with_pattern(pattern)?;
    }
    if !args.models.is_empty() || args.order.is_some() {
        let base = if args.models.is_empty() {
            config
                .models
                .clone()
                .unwrap_or_else(fit::default_model_limits)
        } else {
            args.models.clone()
        };
        let order = args.order.unwrap_or(config.fit_order);
        options = options.with_limits(fit::ordered_limits(&base, order));
    }
    if let Some(policy) = args.policy {
        options = options.with_policy(policy);
    }
    Ok(options)
}

/// Directories to scan when none are given on the command line: the input
/// directory, then the output directory if it exists. A missing input
/// directory is reported on stderr and skipped.
fn default_dirs(config: &Config) -> Vec<Utf8PathBuf> {
    let mut dirs = Vec::with_capacity(2);
    if config.input_dir.is_dir() {
        dirs.push(config.input_dir.clone());
    } else {
        warn!(dir = %config.input_dir, "input directory not found");
        eprintln!("{}", format!("Input directory not found: {}/", config.input_dir).red());
    }
    if config.output_dir.is_dir() && config.output_dir != config.input_dir {
        dirs.push(config.output_dir.clone());
    }
    dirs
}

fn collect(dir: &Utf8Path, options: &ScanOptions) -> anyhow::Result<DirectoryReport> {
    let mut sink = CollectingSink::default();
    let totals = scan::analyze_directory(dir, options, &mut sink)
        .with_context(|| format!("failed to analyze {dir}"))?;
    Ok(DirectoryReport {
        directory: dir.to_path_buf(),
        files: sink.files,
        skipped: sink.skipped,
        averages: totals.averages(),
        totals,
    })
}

/// Analyze each directory and print a table or JSON.
#[instrument(name = "cmd_analyze", skip_all, fields(dirs = args.dirs.len()))]
pub fn cmd_analyze(args: AnalyzeArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    debug!(dirs = ?args.dirs, pattern = ?args.pattern, policy = ?args.policy, "executing analyze command");

    let options = scan_options(&args, config)?;
    let policy = args.policy.unwrap_or(config.fit_policy);
    let dirs = if args.dirs.is_empty() {
        default_dirs(config)
    } else {
        args.dirs
    };

    if global_json {
        let reports = dirs
            .iter()
            .map(|dir| collect(dir, &options))
            .collect::<anyhow::Result<Vec<_>>>()?;
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    if dirs.is_empty() {
        return Ok(());
    }

    let mut sink = TableSink::new();
    for (i, dir) in dirs.iter().enumerate() {
        if i > 0 {
            println!();
            println!("{}", format!("── {dir} ──").yellow());
        }
        scan::analyze_directory(dir, &options, &mut sink)
            .with_context(|| format!("failed to analyze {dir}"))?;
    }
    render::print_legend(options.thresholds());
    println!(
        "{} {} ({} models)",
        "Policy:".dimmed(),
        policy.as_str(),
        options.limits().len()
    );

    Ok(())
}
