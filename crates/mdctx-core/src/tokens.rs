//! Token estimation from raw text.
//!
//! There is no subword tokenizer here. Whitespace is normalised and the
//! resulting length is divided by a fixed characters-per-token ratio, which is
//! stable, reproducible and good enough for context-window planning. Technical
//! and code-heavy markdown sits around 3.2 characters per token.
//!
//! "Whitespace" is Unicode `White_Space` plus the four ASCII information
//! separators U+001C..=U+001F, which Python-style `split()` also breaks on.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

/// Default characters-per-token ratio for technical markdown.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 3.2;

/// Estimate tokens with the default ratio.
///
/// Equivalent to `floor(normalized_len(text) / 3.2)`.
pub fn estimate_tokens(text: &str) -> usize {
    TokenEstimator::default().estimate(text)
}

/// Whether `c` separates words.
pub fn is_separator(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Non-empty runs of non-separator characters.
pub fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(is_separator).filter(|w| !w.is_empty())
}

/// Length in characters of `text` after trimming and collapsing every run of
/// whitespace into a single space.
pub fn normalized_len(text: &str) -> usize {
    let mut len = 0usize;
    let mut words = 0usize;
    for word in self::words(text) {
        len += word.chars().count();
        words += 1;
    }
    // one separating space between each pair of words
    len + words.saturating_sub(1)
}

/// Fixed-ratio token estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenEstimator {
    chars_per_token: f64,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self {
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
        }
    }
}

impl TokenEstimator {
    /// Create an estimator with a custom ratio.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidRatio`] unless the ratio is finite and
    /// strictly positive.
    pub fn new(chars_per_token: f64) -> AnalysisResult<Self> {
        if !chars_per_token.is_finite() || chars_per_token <= 0.0 {
            return Err(AnalysisError::InvalidRatio(chars_per_token));
        }
        Ok(Self { chars_per_token })
    }

    /// The configured characters-per-token ratio.
    pub const fn chars_per_token(&self) -> f64 {
        self.chars_per_token
    }

    /// Estimate the token count of `text`, truncating toward zero.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn estimate(&self, text: &str) -> usize {
        (normalized_len(text) as f64 / self.chars_per_token) as usize
    }
}

/// Result of estimating tokens for a single document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenReport {
    /// Estimated number of tokens.
    pub count: usize,
    /// Token budget (if provided).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<usize>,
    /// Whether the estimate exceeds the budget.
    pub over_budget: bool,
}

/// Estimate tokens in `text` and compare against an optional budget.
#[tracing::instrument(skip(text, estimator), fields(text_len = text.len()))]
pub fn check_budget(text: &str, estimator: &TokenEstimator, budget: Option<usize>) -> TokenReport {
    let count = estimator.estimate(text);
    let over_budget = budget.is_some_and(|max| count > max);

    TokenReport {
        count,
        budget,
        over_budget,
    }
}
