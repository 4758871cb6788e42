//! Model-fit classification.
//!
//! Compares an estimated token count against an ordered table of model
//! context limits at two thresholds: 70% of a limit is a comfortable fit,
//! 90% is tight, anything above is too large.
//!
//! The table is an ordered list, never a map. Which model a verdict is
//! attributed to depends on that order, so callers pass it explicitly (see
//! [`FitOrder`] for the built-in rankings).

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

/// A named model and its maximum context size in tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLimit {
    /// Model identifier, e.g. `qwen2.5:14b`.
    pub name: String,
    /// Maximum input context in tokens.
    pub context_tokens: usize,
}

impl ModelLimit {
    /// Create a limit entry.
    pub fn new(name: impl Into<String>, context_tokens: usize) -> Self {
        Self {
            name: name.into(),
            context_tokens,
        }
    }
}

/// The built-in limit table, in its canonical order.
pub fn default_model_limits() -> Vec<ModelLimit> {
    vec![
        ModelLimit::new("llama3.1:8b", 128_000),
        ModelLimit::new("llama3.1:70b", 128_000),
        ModelLimit::new("qwen2.5:14b", 32_768),
        ModelLimit::new("mistral-nemo:12b", 128_000),
        ModelLimit::new("phi3.5:3.8b", 128_000),
        ModelLimit::new("gemma2:9b", 8_192),
        ModelLimit::new("codellama:13b", 16_384),
    ]
}

/// How well a document fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitVerdict {
    /// Within the comfortable share of some model's context.
    Comfortable,
    /// Within the tight share of some model's context, but not comfortable.
    Tight,
    /// Too large for every model in the table.
    Exceeds,
}

impl FitVerdict {
    /// Single glyph shown per file in reports.
    pub const fn glyph(&self) -> &'static str {
        match self {
            Self::Comfortable => "✅",
            Self::Tight => "⚠️",
            Self::Exceeds => "❌",
        }
    }

    /// Lowercase name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Comfortable => "comfortable",
            Self::Tight => "tight",
            Self::Exceeds => "exceeds",
        }
    }
}

impl std::fmt::Display for FitVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fractions of a context limit that separate the verdicts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitThresholds {
    comfortable: f64,
    tight: f64,
}

/// Default comfortable share of a context window.
pub const DEFAULT_COMFORTABLE_RATIO: f64 = 0.7;
/// Default tight share of a context window.
pub const DEFAULT_TIGHT_RATIO: f64 = 0.9;

impl Default for FitThresholds {
    fn default() -> Self {
        Self {
            comfortable: DEFAULT_COMFORTABLE_RATIO,
            tight: DEFAULT_TIGHT_RATIO,
        }
    }
}

impl FitThresholds {
    /// Create thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidThresholds`] unless
    /// `0 < comfortable <= tight`.
    pub fn new(comfortable: f64, tight: f64) -> AnalysisResult<Self> {
        if !(comfortable > 0.0 && comfortable <= tight && tight.is_finite()) {
            return Err(AnalysisError::InvalidThresholds { comfortable, tight });
        }
        Ok(Self { comfortable, tight })
    }

    /// Comfortable fraction.
    pub const fn comfortable(&self) -> f64 {
        self.comfortable
    }

    /// Tight fraction.
    pub const fn tight(&self) -> f64 {
        self.tight
    }
}

/// Which rule picks the verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum FitPolicy {
    /// Comfortable if any model fits comfortably, else tight if any model
    /// fits tightly, else exceeds. The first matching model in list order is
    /// reported.
    #[default]
    AnyModel,
    /// Stop at the first model whose tight threshold admits the document and
    /// judge against that model alone. Matches the older report layout, where
    /// a later, larger model could not upgrade a tight verdict.
    FirstCandidate,
}

impl FitPolicy {
    /// Kebab-case name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AnyModel => "any-model",
            Self::FirstCandidate => "first-candidate",
        }
    }
}

/// Ordering applied to the limit table before classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum FitOrder {
    /// Use the table exactly as configured.
    #[default]
    AsListed,
    /// Smallest context first; ties keep their configured order.
    SmallestFirst,
}

/// Return `limits` arranged for classification.
pub fn ordered_limits(limits: &[ModelLimit], order: FitOrder) -> Vec<ModelLimit> {
    let mut ordered = limits.to_vec();
    if order == FitOrder::SmallestFirst {
        ordered.sort_by_key(|l| l.context_tokens);
    }
    ordered
}

/// Verdict plus the model it was decided against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitOutcome {
    /// The verdict.
    pub verdict: FitVerdict,
    /// The deciding model; `None` when nothing fits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl FitOutcome {
    const fn exceeds() -> Self {
        Self {
            verdict: FitVerdict::Exceeds,
            model: None,
        }
    }

    fn with(verdict: FitVerdict, limit: &ModelLimit) -> Self {
        Self {
            verdict,
            model: Some(limit.name.clone()),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn within(tokens: usize, limit: &ModelLimit, fraction: f64) -> bool {
    tokens as f64 <= limit.context_tokens as f64 * fraction
}

/// Classify `estimated_tokens` against `limits`, walked in the given order.
///
/// An empty table always yields [`FitVerdict::Exceeds`].
pub fn classify_fit(
    estimated_tokens: usize,
    limits: &[ModelLimit],
    thresholds: FitThresholds,
    policy: FitPolicy,
) -> FitOutcome {
    match policy {
        FitPolicy::AnyModel => {
            if let Some(limit) = limits
                .iter()
                .find(|l| within(estimated_tokens, l, thresholds.comfortable))
            {
                return FitOutcome::with(FitVerdict::Comfortable, limit);
            }
            limits
                .iter()
                .find(|l| within(estimated_tokens, l, thresholds.tight))
                .map_or_else(FitOutcome::exceeds, |limit| {
                    FitOutcome::with(FitVerdict::Tight, limit)
                })
        }
        FitPolicy::FirstCandidate => {
            for limit in limits {
                if within(estimated_tokens, limit, thresholds.comfortable) {
                    return FitOutcome::with(FitVerdict::Comfortable, limit);
                }
                if within(estimated_tokens, limit, thresholds.tight) {
                    return FitOutcome::with(FitVerdict::Tight, limit);
                }
            }
            FitOutcome::exceeds()
        }
    }
}
