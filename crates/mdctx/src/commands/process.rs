//! Process command: reformat markdown files through Gemini.

use std::time::Duration;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, instrument};

use mdctx_core::config::Config;
use mdctx_core::error::PipelineError;
use mdctx_core::gemini::GeminiClient;
use mdctx_core::pipeline::{self, ProcessSink, ProcessSummary, ProcessedFile, PromptTemplate};
use mdctx_core::scan::ScanOptions;

use crate::render::Paint;

/// Arguments for the `process` subcommand.
#[derive(Args, Debug, Default)]
pub struct ProcessArgs {
    /// Directory with source files (default from config, `input`).
    #[arg(long)]
    pub input: Option<Utf8PathBuf>,

    /// Directory for reformatted files (default from config, `outputs`).
    #[arg(long)]
    pub output: Option<Utf8PathBuf>,

    /// Prompt template file containing `{content}`.
    #[arg(long, value_name = "FILE")]
    pub template: Option<Utf8PathBuf>,
}

#[derive(Serialize)]
struct FailedFile {
    path: Utf8PathBuf,
    error: String,
}

/// Spinner plus a line per finished file.
struct ConsoleSink {
    bar: ProgressBar,
    visible: bool,
    done: usize,
    total: usize,
    processed: Vec<ProcessedFile>,
    failed: Vec<FailedFile>,
}

impl ConsoleSink {
    fn new(visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::default_spinner()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]);
            let style = style
                .clone()
                .template("{spinner:.blue} {msg} [{elapsed}]")
                .unwrap_or(style);
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            bar,
            visible,
            done: 0,
            total: 0,
            processed: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Print a line to stdout without tearing the spinner.
    fn say(&self, line: impl std::fmt::Display) {
        if self.visible {
            self.bar.suspend(|| println!("{line}"));
        }
    }
}

impl ProcessSink for ConsoleSink {
    fn on_start(&mut self, input_dir: &Utf8Path, total: usize) {
        self.total = total;
        self.say(format!("Found {total} markdown files in {input_dir}/").blue());
    }

    fn on_file_start(&mut self, path: &Utf8Path) {
        let name = path.file_name().unwrap_or(path.as_str());
        self.bar
            .set_message(format!("[{}/{}] {name}", self.done + 1, self.total));
    }

    fn on_processed(&mut self, file: &ProcessedFile) {
        self.done += 1;
        let name = file.input.file_name().unwrap_or(file.input.as_str());
        self.say(format!("✅ Processed: {name} ({:.2}s)", file.elapsed.as_secs_f64()).green());
        if file.possibly_truncated {
            self.say(
                format!(
                    "   Response may be truncated (input: {} chars, output: {} chars)",
                    file.input_chars, file.output_chars
                )
                .yellow(),
            );
        }
        self.processed.push(file.clone());
    }

    fn on_failed(&mut self, path: &Utf8Path, error: &PipelineError) {
        self.done += 1;
        let name = path.file_name().unwrap_or(path.as_str());
        self.say(format!("❌ Failed to process {name}: {error}").red());
        self.failed.push(FailedFile {
            path: path.to_path_buf(),
            error: error.to_string(),
        });
    }

    fn on_empty(&mut self, input_dir: &Utf8Path) {
        self.say(format!("No markdown files found in {input_dir}/").yellow());
    }
}

#[derive(Serialize)]
struct ProcessReport {
    input_dir: Utf8PathBuf,
    output_dir: Utf8PathBuf,
    model: String,
    total: usize,
    processed: usize,
    failed: usize,
    elapsed_secs: f64,
    average_secs: Option<f64>,
    files_per_second: Option<f64>,
    files: Vec<ProcessedFile>,
    failures: Vec<FailedFile>,
}

fn resolve_template(args: &ProcessArgs, config: &Config) -> anyhow::Result<PromptTemplate> {
    match args.template.as_ref().or(config.template_file.as_ref()) {
        Some(path) => PromptTemplate::from_file(path)
            .with_context(|| format!("failed to load prompt template {path}")),
        None => Ok(PromptTemplate::default()),
    }
}

fn print_summary(summary: &ProcessSummary, output_dir: &Utf8Path) {
    println!();
    println!("{}", "Processing Summary".bold().underline());
    println!("{}: {}", "Total files".dimmed(), summary.total);
    println!("{}: {}", "Processed".dimmed(), summary.processed.green());
    if summary.failed > 0 {
        println!("{}: {}", "Failed".dimmed(), summary.failed.red());
    } else {
        println!("{}: {}", "Failed".dimmed(), summary.failed);
    }
    println!(
        "{}: {:.2}s",
        "Total time".dimmed(),
        summary.elapsed.as_secs_f64()
    );
    if let Some(avg) = summary.average() {
        println!("{}: {:.2}s", "Average per file".dimmed(), avg.as_secs_f64());
    }
    if let Some(rate) = summary.rate() {
        println!("{}: {rate:.2} files/s", "Rate".dimmed());
    }
    if summary.processed > 0 {
        println!();
        println!(
            "{} {}",
            "Output written to".green(),
            format!("{output_dir}/").cyan()
        );
    }
}

/// Run the reformatting batch.
#[instrument(name = "cmd_process", skip_all)]
pub fn cmd_process(
    args: ProcessArgs,
    global_json: bool,
    quiet: bool,
    config: &Config,
) -> anyhow::Result<()> {
    debug!(input = ?args.input, output = ?args.output, template = ?args.template, "executing process command");

    let client = GeminiClient::from_env(&config.generator)
        .context("cannot reach the text-generation service")?;
    let template = resolve_template(&args, config)?;
    let options = ScanOptions::from_config(config).context("invalid analysis settings")?;

    let input_dir = args.input.unwrap_or_else(|| config.input_dir.clone());
    let output_dir = args.output.unwrap_or_else(|| config.output_dir.clone());

    if !global_json {
        println!(
            "{} {} {}",
            "Reformatting with".bold(),
            client.model().cyan(),
            format!("({input_dir}/ -> {output_dir}/)").dimmed()
        );
    }

    let mut sink = ConsoleSink::new(!global_json && !quiet);
    let summary = pipeline::process_directory(
        &input_dir,
        &output_dir,
        &options,
        &client,
        &template,
        &mut sink,
    )
    .with_context(|| format!("failed to process {input_dir}"))?;
    sink.bar.finish_and_clear();

    if global_json {
        let report = ProcessReport {
            input_dir,
            output_dir,
            model: client.model().to_string(),
            total: summary.total,
            processed: summary.processed,
            failed: summary.failed,
            elapsed_secs: summary.elapsed.as_secs_f64(),
            average_secs: summary.average().map(|d| d.as_secs_f64()),
            files_per_second: summary.rate(),
            files: sink.processed,
            failures: sink.failed,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if summary.total > 0 {
        print_summary(&summary, &output_dir);
    }

    Ok(())
}
