//! Models command: show the effective context table.

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tracing::{debug, instrument};

use mdctx_core::config::Config;
use mdctx_core::fit::{FitOrder, FitPolicy, FitThresholds, ModelLimit};

use crate::render::{Paint, thousands};

/// Arguments for the `models` subcommand.
#[derive(Args, Debug, Default)]
pub struct ModelsArgs {}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ModelRow {
    name: String,
    context_tokens: usize,
    comfortable_tokens: usize,
    tight_tokens: usize,
}

#[derive(Serialize)]
struct ModelTable {
    policy: FitPolicy,
    order: FitOrder,
    comfortable_ratio: f64,
    tight_ratio: f64,
    models: Vec<ModelRow>,
}

/// Largest token count that still passes `ratio * limit`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn threshold_tokens(limit: usize, ratio: f64) -> usize {
    (limit as f64 * ratio).floor() as usize
}

fn rows(limits: &[ModelLimit], thresholds: FitThresholds) -> Vec<ModelRow> {
    limits
        .iter()
        .map(|l| ModelRow {
            name: l.name.clone(),
            context_tokens: l.context_tokens,
            comfortable_tokens: threshold_tokens(l.context_tokens, thresholds.comfortable()),
            tight_tokens: threshold_tokens(l.context_tokens, thresholds.tight()),
        })
        .collect()
}

/// Print the model table in classification order.
#[instrument(name = "cmd_models", skip_all)]
pub fn cmd_models(_args: ModelsArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing models command");

    let thresholds = config.thresholds().context("invalid fit thresholds")?;
    let table = ModelTable {
        policy: config.fit_policy,
        order: config.fit_order,
        comfortable_ratio: thresholds.comfortable(),
        tight_ratio: thresholds.tight(),
        models: rows(&config.model_limits(), thresholds),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "{:<20}  {:>10}  {:>12}  {:>12}",
            "Model", "Context", "Comfortable", "Tight"
        )
        .bold()
    );
    for row in &table.models {
        println!(
            "{}  {:>10}  {}  {}",
            format!("{:<20}", row.name).cyan(),
            thousands(row.context_tokens),
            format!("{:>12}", thousands(row.comfortable_tokens)).green(),
            format!("{:>12}", thousands(row.tight_tokens)).yellow(),
        );
    }
    println!();
    println!(
        "{}: {} ({}), {}: {:.0}% / {:.0}%",
        "Policy".dimmed(),
        table.policy.as_str(),
        match table.order {
            FitOrder::AsListed => "as listed",
            FitOrder::SmallestFirst => "smallest first",
        },
        "Thresholds".dimmed(),
        table.comfortable_ratio * 100.0,
        table.tight_ratio * 100.0,
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_floored() {
        let thresholds = FitThresholds::new(0.7, 0.9).unwrap();
        let rows = rows(&[ModelLimit::new("gemma2:9b", 8192)], thresholds);
        assert_eq!(
            rows[0],
            ModelRow {
                name: "gemma2:9b".to_string(),
                context_tokens: 8192,
                comfortable_tokens: 5734,
                tight_tokens: 7372,
            }
        );
    }

    #[test]
    fn cmd_models_succeeds_with_defaults() {
        assert!(cmd_models(ModelsArgs::default(), true, &Config::default()).is_ok());
        assert!(cmd_models(ModelsArgs::default(), false, &Config::default()).is_ok());
    }
}
