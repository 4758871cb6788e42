//! `mdctx info`: version plus the settings a run would actually use.

use std::fmt::Display;

use clap::Args;
use mdctx_core::config::{Config, ConfigOrigin};
use mdctx_core::fit::{FitOrder, FitPolicy};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::render::Paint;

/// Arguments for the `info` subcommand (none beyond the global flags).
#[derive(Args, Debug, Default)]
pub struct InfoArgs {}

#[derive(Serialize)]
struct Build {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

const BUILD: Build = Build {
    name: env!("CARGO_PKG_NAME"),
    version: env!("CARGO_PKG_VERSION"),
    description: env!("CARGO_PKG_DESCRIPTION"),
    repository: env!("CARGO_PKG_REPOSITORY"),
    license: env!("CARGO_PKG_LICENSE"),
};

/// Effective settings, flattened for display.
#[derive(Serialize)]
struct Effective {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    log_level: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
    input_dir: String,
    output_dir: String,
    pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    chars_per_token: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comfortable_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tight_ratio: Option<f64>,
    fit_policy: FitPolicy,
    fit_order: FitOrder,
    models: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_budget: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_file: Option<String>,
    generator_model: String,
}

impl Effective {
    fn new(config: &Config, origin: &ConfigOrigin) -> Self {
        let to_string = |p: &camino::Utf8PathBuf| p.to_string();
        Self {
            config_file: origin.effective_file().map(|p| p.to_string()),
            log_level: config.log_level.as_str(),
            log_dir: config.log_dir.as_ref().map(to_string),
            input_dir: config.input_dir.to_string(),
            output_dir: config.output_dir.to_string(),
            pattern: config.pattern.clone(),
            chars_per_token: config.chars_per_token,
            comfortable_ratio: config.comfortable_ratio,
            tight_ratio: config.tight_ratio,
            fit_policy: config.fit_policy,
            fit_order: config.fit_order,
            models: config.model_limits().into_iter().map(|l| l.name).collect(),
            token_budget: config.token_budget,
            template_file: config.template_file.as_ref().map(to_string),
            generator_model: config.generator.model.clone(),
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    build: &'a Build,
    config: Effective,
}

fn heading(title: &str) {
    println!();
    println!("{}", title.bold().underline());
}

fn field(label: &str, value: impl Display) {
    println!("{}: {value}", label.dimmed());
}

fn maybe<T: Display>(label: &str, value: Option<T>) {
    match value {
        Some(v) => field(label, v),
        None => field(label, "(not set)".dimmed()),
    }
}

fn print_text(cfg: &Effective) {
    println!("{} {}", BUILD.name.bold(), BUILD.version.green());
    if !BUILD.description.is_empty() {
        println!("{}", BUILD.description);
    }
    if !BUILD.license.is_empty() {
        field("License", BUILD.license);
    }
    if !BUILD.repository.is_empty() {
        field("Repository", BUILD.repository.cyan());
    }

    heading("Configuration");
    match &cfg.config_file {
        Some(path) => field("Config file", path.cyan()),
        None => field("Config file", "none loaded".yellow()),
    }
    field("Log level", cfg.log_level);
    if let Some(dir) = &cfg.log_dir {
        field("Log directory", dir);
    }

    heading("Analysis");
    field("Input directory", &cfg.input_dir);
    field("Output directory", &cfg.output_dir);
    field("Pattern", &cfg.pattern);
    maybe("Chars per token", cfg.chars_per_token);
    maybe("Comfortable ratio", cfg.comfortable_ratio);
    maybe("Tight ratio", cfg.tight_ratio);
    field("Fit policy", cfg.fit_policy.as_str());
    field("Models", cfg.models.join(", "));
    maybe("Token budget", cfg.token_budget);

    heading("Generator");
    field("Model", &cfg.generator_model);
    maybe("Template file", cfg.template_file.as_ref());
}

/// Print the build metadata and effective configuration.
#[instrument(name = "cmd_info", skip_all, fields(json = global_json))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    origin: &ConfigOrigin,
) -> anyhow::Result<()> {
    let effective = Effective::new(config, origin);
    debug!(config_file = ?effective.config_file, "reporting configuration");

    if global_json {
        let report = Report {
            build: &BUILD,
            config: effective,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&effective);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn text_and_json_both_render() {
        let origin = ConfigOrigin::default();
        assert!(cmd_info(InfoArgs::default(), false, &Config::default(), &origin).is_ok());
        assert!(cmd_info(InfoArgs::default(), true, &Config::default(), &origin).is_ok());
    }

    #[test]
    fn defaults_are_reported() {
        let info = Effective::new(&Config::default(), &ConfigOrigin::default());
        assert!(info.config_file.is_none());
        assert_eq!(info.log_level, "info");
        assert_eq!(info.pattern, "*.md");
        assert_eq!(info.models.len(), 7);
        assert_eq!(info.generator_model, "gemini-2.5-pro");
    }

    #[test]
    fn explicit_file_is_reported_over_project_file() {
        let origin = ConfigOrigin {
            project: vec![Utf8PathBuf::from("/p/.mdctx.toml")],
            explicit: vec![Utf8PathBuf::from("/x/override.toml")],
            ..ConfigOrigin::default()
        };
        let info = Effective::new(&Config::default(), &origin);
        assert_eq!(info.config_file.as_deref(), Some("/x/override.toml"));
    }
}
