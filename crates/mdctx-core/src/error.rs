//! Error types for mdctx-core.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Failure to turn config layers into a [`Config`](crate::config::Config).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A layer could not be parsed, or a value has the wrong shape.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while measuring files and directories.
///
/// Only [`AnalysisError::FileRead`] is produced per file; a directory scan
/// records it as a skip and keeps going.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A single file could not be read or is not valid UTF-8.
    #[error("failed to read {path}: {source}")]
    FileRead {
        /// The file that failed.
        path: Utf8PathBuf,
        /// Underlying I/O or decoding error.
        source: std::io::Error,
    },

    /// The directory to scan could not be listed.
    #[error("failed to read directory {path}: {source}")]
    DirectoryRead {
        /// The directory that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file-name pattern is not a valid glob.
    #[error("invalid file pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The pattern as configured.
        pattern: String,
        /// Why the glob was rejected.
        reason: String,
    },

    /// The characters-per-token ratio must be positive and finite.
    #[error("invalid characters-per-token ratio: {0}")]
    InvalidRatio(f64),

    /// Fit thresholds must satisfy `0 < comfortable <= tight`.
    #[error("invalid fit thresholds: comfortable {comfortable}, tight {tight}")]
    InvalidThresholds {
        /// Fraction of the context limit considered comfortable.
        comfortable: f64,
        /// Fraction of the context limit considered tight.
        tight: f64,
    },
}

/// Result type alias using [`AnalysisError`].
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Errors returned by a text-generation service.
#[derive(Error, Debug)]
pub enum GenerateError {
    /// No API key in the environment.
    #[error("{var} not found in environment variables")]
    MissingApiKey {
        /// The environment variable that was consulted.
        var: &'static str,
    },

    /// The request never produced a response.
    #[error("request to {service} failed: {source}")]
    Transport {
        /// Service name, for messages.
        service: &'static str,
        /// Underlying HTTP client error.
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        /// Service name, for messages.
        service: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("could not decode {service} response: {reason}")]
    Decode {
        /// Service name, for messages.
        service: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// The service returned no text.
    #[error("empty response{}", feedback.as_ref().map(|f| format!(" (prompt feedback: {f})")).unwrap_or_default())]
    EmptyResponse {
        /// Prompt feedback reported by the service, if any.
        feedback: Option<String>,
    },
}

/// Result type alias using [`GenerateError`].
pub type GenerateResult<T> = Result<T, GenerateError>;

/// Errors from the reformatting pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The prompt template has no `{content}` placeholder.
    #[error("prompt template has no {{content}} placeholder")]
    Template,

    /// Reading an input file (or the template file) failed.
    #[error("error reading {path}: {source}")]
    Read {
        /// The file that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The text-generation service failed for one file.
    #[error("error generating output for {path}: {source}")]
    Generate {
        /// The input file being processed.
        path: Utf8PathBuf,
        /// Service error.
        source: GenerateError,
    },

    /// Writing an output file (or creating its directory) failed.
    #[error("error saving {path}: {source}")]
    Write {
        /// The output path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Input and output resolve to the same directory; outputs would
    /// overwrite their sources.
    #[error("input and output directory are the same: {path}")]
    SameDirectory {
        /// The shared directory.
        path: Utf8PathBuf,
    },

    /// Discovering input files failed.
    #[error(transparent)]
    Discover(#[from] AnalysisError),
}

/// Result type alias using [`PipelineError`].
pub type PipelineResult<T> = Result<T, PipelineError>;
