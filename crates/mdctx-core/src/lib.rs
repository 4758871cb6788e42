//! Core library for mdctx.
//!
//! Measures markdown files against LLM context windows: token estimates,
//! per-file text statistics, model-fit verdicts and directory totals. Also
//! drives an optional batch reformatting pipeline through a text-generation
//! service.
//!
//! # Modules
//!
//! - [`tokens`] - Heuristic token estimation and budget checks
//! - [`stats`] - Per-file measurements
//! - [`fit`] - Model context limits and fit verdicts
//! - [`scan`] - Directory discovery and aggregation
//! - [`pipeline`] - Prompt templating and batch reformatting
//! - [`gemini`] - Gemini text-generation client
//! - [`config`] - Layered settings from files and the environment
//! - [`error`] - Error types and result aliases
//!
//! # Quick Start
//!
//! ```no_run
//! use camino::Utf8Path;
//! use mdctx_core::scan::{analyze_directory, CollectingSink, ScanOptions};
//!
//! let mut sink = CollectingSink::default();
//! let totals = analyze_directory(Utf8Path::new("docs"), &ScanOptions::default(), &mut sink)
//!     .expect("directory readable");
//!
//! for report in &sink.files {
//!     println!("{}: {} tokens, {}", report.metrics.filename, report.metrics.estimated_tokens, report.fit.verdict);
//! }
//! println!("{} files, {} tokens", totals.files, totals.total_tokens);
//! ```
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod fit;
pub mod gemini;
pub mod pipeline;
pub mod scan;
pub mod stats;
pub mod tokens;

pub use config::{Config, ConfigLoader, ConfigOrigin, GeneratorConfig, LogLevel};
pub use error::{
    AnalysisError, AnalysisResult, ConfigError, ConfigResult, GenerateError, GenerateResult,
    PipelineError, PipelineResult,
};
pub use fit::{FitOrder, FitOutcome, FitPolicy, FitThresholds, FitVerdict, ModelLimit};
pub use stats::FileMetrics;
pub use tokens::{TokenEstimator, estimate_tokens};
