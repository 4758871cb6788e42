//! Layered settings.
//!
//! Each layer overrides the one before it:
//!
//! 1. built-in defaults
//! 2. the user file, `config.<ext>` under the platform config dir for `mdctx`
//! 3. the project files, `.mdctx.<ext>` then `mdctx.<ext>`, taken from the
//!    nearest directory (walking upward from the search root) that has any;
//!    the walk ends at the first directory holding a `.git` entry
//! 4. files added with [`ConfigLoader::add_file`], in call order
//! 5. `MDCTX_*` environment variables, `__` separating nested keys
//!    (`MDCTX_GENERATOR__MODEL`)
//!
//! `<ext>` is `toml`, `yaml`, `yml` or `json`. Within one directory they
//! merge in that order, so a `.json` file has the last word.
//!
//! ```no_run
//! use camino::Utf8PathBuf;
//! use mdctx_core::config::ConfigLoader;
//!
//! let here = Utf8PathBuf::from(".");
//! let (config, origin) = ConfigLoader::new().search_from(&here).load()?;
//! if let Some(file) = origin.effective_file() {
//!     println!("settings from {file}");
//! }
//! println!("scanning {} for {}", config.input_dir, config.pattern);
//! # Ok::<(), mdctx_core::error::ConfigError>(())
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisResult, ConfigError, ConfigResult};
use crate::fit::{self, FitOrder, FitPolicy, FitThresholds, ModelLimit};
use crate::tokens::TokenEstimator;

const APP: &str = "mdctx";
const ENV_PREFIX: &str = "MDCTX_";
const REPO_MARKER: &str = ".git";

/// Settings for the hosted text-generation service used by `process`.
///
/// The API key is never read from config files; it comes from the
/// `GEMINI_API_KEY` environment variable.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Model identifier.
    pub model: String,
    /// API base URL, without trailing slash.
    pub base_url: String,
    /// Sampling temperature. Low keeps formatting consistent.
    pub temperature: f64,
    /// Nucleus sampling cutoff.
    pub top_p: f64,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-pro".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.1,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 32_768,
            timeout_secs: 600,
        }
    }
}

/// Everything `mdctx` can be told through config files or the environment.
///
/// Unknown keys are ignored and every field has a default, so an empty
/// file is valid.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Minimum level written to the log file and, with `-v`, the console.
    pub log_level: LogLevel,
    /// Where JSONL logs go. Unset means no file logging.
    pub log_dir: Option<Utf8PathBuf>,
    /// Directory holding the source markdown files.
    pub input_dir: Utf8PathBuf,
    /// Directory that receives reformatted files.
    pub output_dir: Utf8PathBuf,
    /// File-name glob selecting files inside a directory (non-recursive).
    pub pattern: String,
    /// Characters per estimated token (default 3.2).
    pub chars_per_token: Option<f64>,
    /// Share of a context window that counts as a comfortable fit (default 0.7).
    pub comfortable_ratio: Option<f64>,
    /// Share of a context window that still fits, tightly (default 0.9).
    pub tight_ratio: Option<f64>,
    /// Verdict rule.
    pub fit_policy: FitPolicy,
    /// Order the model table is walked in.
    pub fit_order: FitOrder,
    /// Ordered model context limits. Replaces the built-in table when set.
    pub models: Option<Vec<ModelLimit>>,
    /// Budget `mdctx tokens` enforces when `--budget` is absent.
    pub token_budget: Option<usize>,
    /// Prompt template file for `process` (must contain `{content}`).
    pub template_file: Option<Utf8PathBuf>,
    /// Text-generation service settings.
    pub generator: GeneratorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            log_dir: None,
            input_dir: Utf8PathBuf::from("input"),
            output_dir: Utf8PathBuf::from("outputs"),
            pattern: "*.md".to_string(),
            chars_per_token: None,
            comfortable_ratio: None,
            tight_ratio: None,
            fit_policy: FitPolicy::default(),
            fit_order: FitOrder::default(),
            models: None,
            token_budget: None,
            template_file: None,
            generator: GeneratorConfig::default(),
        }
    }
}

impl Config {
    /// Token estimator for the configured ratio.
    pub fn estimator(&self) -> AnalysisResult<TokenEstimator> {
        self.chars_per_token
            .map_or_else(|| Ok(TokenEstimator::default()), TokenEstimator::new)
    }

    /// Fit thresholds, with defaults for whichever ratio is unset.
    pub fn thresholds(&self) -> AnalysisResult<FitThresholds> {
        FitThresholds::new(
            self.comfortable_ratio
                .unwrap_or(fit::DEFAULT_COMFORTABLE_RATIO),
            self.tight_ratio.unwrap_or(fit::DEFAULT_TIGHT_RATIO),
        )
    }

    /// The model table in classification order.
    pub fn model_limits(&self) -> Vec<ModelLimit> {
        let limits = self
            .models
            .clone()
            .unwrap_or_else(fit::default_model_limits);
        fit::ordered_limits(&limits, self.fit_order)
    }
}

/// Threshold for the default tracing filter.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Include per-file and per-layer detail.
    Debug,
    /// Command lifecycle only.
    #[default]
    Info,
    /// Recoverable problems.
    Warn,
    /// Failures.
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// The files that fed a [`Config`], grouped by layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOrigin {
    /// The user-level file, if one exists.
    pub user: Option<Utf8PathBuf>,
    /// Project files from the nearest directory, in merge order.
    pub project: Vec<Utf8PathBuf>,
    /// Files added explicitly, in merge order.
    pub explicit: Vec<Utf8PathBuf>,
}

impl ConfigOrigin {
    /// The file whose values won, ignoring environment overrides.
    pub fn effective_file(&self) -> Option<&Utf8Path> {
        [self.explicit.last(), self.project.last(), self.user.as_ref()]
            .into_iter()
            .flatten()
            .map(Utf8PathBuf::as_path)
            .next()
    }

    fn layers(&self) -> impl Iterator<Item = &Utf8Path> {
        self.user
            .iter()
            .chain(&self.project)
            .chain(&self.explicit)
            .map(Utf8PathBuf::as_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Toml,
    Yaml,
    Json,
}

impl FileFormat {
    /// Merge order within a single directory.
    const EXTENSIONS: [(&'static str, Self); 4] = [
        ("toml", Self::Toml),
        ("yaml", Self::Yaml),
        ("yml", Self::Yaml),
        ("json", Self::Json),
    ];

    /// Unrecognised extensions are read as TOML.
    fn of(path: &Utf8Path) -> Self {
        Self::EXTENSIONS
            .iter()
            .find(|(ext, _)| path.extension() == Some(*ext))
            .map_or(Self::Toml, |(_, format)| *format)
    }

    fn merge_into(self, figment: Figment, path: &Utf8Path) -> Figment {
        let path = path.as_str();
        match self {
            Self::Toml => figment.merge(Toml::file_exact(path)),
            Self::Yaml => figment.merge(Yaml::file_exact(path)),
            Self::Json => figment.merge(Json::file_exact(path)),
        }
    }
}

/// Existing files named `<stem>.<ext>` in `dir`, in merge order.
fn candidates(dir: &Utf8Path, stem: &str) -> impl Iterator<Item = Utf8PathBuf> {
    FileFormat::EXTENSIONS
        .iter()
        .map(move |(ext, _)| dir.join(format!("{stem}.{ext}")))
        .filter(|path| path.is_file())
}

/// Project files of the nearest directory at or above `start` that has any.
fn nearest_project_files(start: &Utf8Path, stop_at: Option<&str>) -> Vec<Utf8PathBuf> {
    let hidden = format!(".{APP}");
    for dir in start.ancestors() {
        let found: Vec<_> = candidates(dir, &hidden).chain(candidates(dir, APP)).collect();
        if !found.is_empty() {
            return found;
        }
        if stop_at.is_some_and(|marker| dir.join(marker).exists()) {
            break;
        }
    }
    Vec::new()
}

/// Platform config directory for `mdctx` (`~/.config/mdctx` on Linux).
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", APP)?;
    Utf8PathBuf::from_path_buf(dirs.config_dir().to_path_buf()).ok()
}

/// Collects config layers and merges them into a [`Config`].
#[derive(Debug)]
pub struct ConfigLoader {
    search_root: Option<Utf8PathBuf>,
    user_layer: bool,
    stop_at: Option<String>,
    extra: Vec<Utf8PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// A loader that reads the user file and stops the project walk at `.git`.
    /// No project search happens until [`search_from`](Self::search_from).
    pub fn new() -> Self {
        Self {
            search_root: None,
            user_layer: true,
            stop_at: Some(REPO_MARKER.to_string()),
            extra: Vec::new(),
        }
    }

    /// Walk upward from `dir` looking for project files.
    pub fn search_from(mut self, dir: impl AsRef<Utf8Path>) -> Self {
        self.search_root = Some(dir.as_ref().to_owned());
        self
    }

    /// Toggle the user-level layer.
    pub const fn user_layer(mut self, enabled: bool) -> Self {
        self.user_layer = enabled;
        self
    }

    /// Let the project walk continue to the filesystem root.
    pub fn unbounded(mut self) -> Self {
        self.stop_at = None;
        self
    }

    /// Merge `path` above the discovered files. Later calls win.
    pub fn add_file(mut self, path: impl AsRef<Utf8Path>) -> Self {
        self.extra.push(path.as_ref().to_owned());
        self
    }

    fn discover(&self) -> ConfigOrigin {
        let user = if self.user_layer {
            user_config_dir().and_then(|dir| candidates(&dir, "config").next())
        } else {
            None
        };
        let project = self
            .search_root
            .as_deref()
            .map(|root| nearest_project_files(root, self.stop_at.as_deref()))
            .unwrap_or_default();
        ConfigOrigin {
            user,
            project,
            explicit: self.extra.clone(),
        }
    }

    /// Merge every layer and report which files took part.
    #[tracing::instrument(skip(self), fields(root = ?self.search_root))]
    pub fn load(self) -> ConfigResult<(Config, ConfigOrigin)> {
        let origin = self.discover();
        tracing::debug!(?origin, "config layers discovered");

        let figment = origin.layers().fold(
            Figment::from(Serialized::defaults(Config::default())),
            |acc, path| FileFormat::of(path).merge_into(acc, path),
        );
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true))
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;

        tracing::debug!(
            level = config.log_level.as_str(),
            input = %config.input_dir,
            policy = config.fit_policy.as_str(),
            "config ready"
        );
        Ok((config, origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// A UTF-8 temp root seeded with `(relative path, contents)` pairs.
    fn tree(files: &[(&str, &str)]) -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        for (rel, body) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, body).unwrap();
        }
        (tmp, root)
    }

    fn isolated() -> ConfigLoader {
        ConfigLoader::new().user_layer(false)
    }

    /// Loads with the environment held still.
    fn load(loader: ConfigLoader) -> (Config, ConfigOrigin) {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        loader.load().unwrap()
    }

    fn from_single(name: &str, body: &str) -> Config {
        let (_tmp, root) = tree(&[(name, body)]);
        load(isolated().add_file(root.join(name))).0
    }

    #[test]
    fn defaults_cover_every_setting() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.log_dir.is_none());
        assert_eq!(config.input_dir, "input");
        assert_eq!(config.output_dir, "outputs");
        assert_eq!(config.pattern, "*.md");
        assert_eq!(config.fit_policy, FitPolicy::AnyModel);
        assert_eq!(config.model_limits(), fit::default_model_limits());
    }

    #[test]
    fn nothing_to_load_yields_defaults() {
        let (config, origin) = load(isolated().unbounded());
        assert_eq!(config, Config::default());
        assert!(origin.effective_file().is_none());
    }

    #[test]
    fn explicit_file_sets_values() {
        let config = from_single(
            "settings.toml",
            "log_level = \"debug\"\nlog_dir = \"/tmp/mdctx\"\ninput_dir = \"docs\"\n",
        );
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.log_dir.as_deref().map(Utf8Path::as_str), Some("/tmp/mdctx"));
        assert_eq!(config.input_dir, "docs");
    }

    #[test]
    fn last_added_file_wins() {
        let (_tmp, root) = tree(&[
            ("a.toml", r#"log_level = "warn""#),
            ("b.toml", r#"log_level = "error""#),
        ]);
        let loader = isolated()
            .add_file(root.join("a.toml"))
            .add_file(root.join("b.toml"));
        let (config, origin) = load(loader);

        assert_eq!(config.log_level, LogLevel::Error);
        assert_eq!(origin.effective_file(), Some(root.join("b.toml").as_path()));
    }

    #[test]
    fn walk_finds_ancestor_project_file() {
        let (_tmp, root) = tree(&[
            ("vault/.mdctx.toml", r#"log_level = "debug""#),
            ("vault/notes/deep/a.md", "x"),
        ]);
        let loader = isolated()
            .unbounded()
            .search_from(root.join("vault/notes/deep"));
        let (config, origin) = load(loader);

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(origin.project, [root.join("vault/.mdctx.toml")]);
    }

    #[test]
    fn repository_root_ends_the_walk() {
        let (_tmp, root) = tree(&[
            ("outer/.mdctx.toml", r#"log_level = "warn""#),
            ("outer/repo/.git/HEAD", ""),
            ("outer/repo/work/a.md", "x"),
        ]);
        let loader = isolated().search_from(root.join("outer/repo/work"));
        let (config, origin) = load(loader);

        assert_eq!(config.log_level, LogLevel::Info);
        assert!(origin.project.is_empty());
    }

    #[test]
    fn file_beside_git_marker_still_counts() {
        let (_tmp, root) = tree(&[
            ("repo/.git/HEAD", ""),
            ("repo/mdctx.yaml", "pattern: \"*.mdx\"\n"),
        ]);
        let (config, _) = load(isolated().search_from(root.join("repo")));
        assert_eq!(config.pattern, "*.mdx");
    }

    #[test]
    fn plain_name_beats_hidden_name() {
        let (_tmp, root) = tree(&[
            (".mdctx.toml", r#"log_level = "debug""#),
            ("mdctx.toml", r#"log_level = "error""#),
        ]);
        let (config, origin) = load(isolated().unbounded().search_from(&root));

        assert_eq!(config.log_level, LogLevel::Error);
        assert_eq!(origin.project.len(), 2);
    }

    #[test]
    fn farther_directories_are_ignored_once_one_matches() {
        let (_tmp, root) = tree(&[
            ("up/mdctx.toml", "pattern = \"*.txt\"\n"),
            ("up/down/.mdctx.toml", r#"log_level = "error""#),
        ]);
        let loader = isolated()
            .unbounded()
            .search_from(root.join("up/down"));
        let (config, origin) = load(loader);

        assert_eq!(config.log_level, LogLevel::Error);
        assert_eq!(config.pattern, "*.md");
        assert_eq!(origin.project.len(), 1);
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(FileFormat::of(Utf8Path::new("a.yml")), FileFormat::Yaml);
        assert_eq!(FileFormat::of(Utf8Path::new("a.json")), FileFormat::Json);
        assert_eq!(FileFormat::of(Utf8Path::new("a.conf")), FileFormat::Toml);
    }

    #[test]
    fn models_keep_their_configured_order() {
        let config = from_single(
            "config.yaml",
            r#"
models:
  - name: big
    context_tokens: 200000
  - name: small
    context_tokens: 4096
"#,
        );
        let names: Vec<_> = config.model_limits().into_iter().map(|l| l.name).collect();
        assert_eq!(names, ["big", "small"]);
    }

    #[test]
    fn smallest_first_reorders_models() {
        let config = from_single(
            "config.json",
            r#"{"fit_order": "smallest-first", "models": [
                {"name": "big", "context_tokens": 200000},
                {"name": "small", "context_tokens": 4096}
            ]}"#,
        );
        assert_eq!(config.model_limits()[0].name, "small");
    }

    #[test]
    fn policy_and_ratios_deserialize() {
        let config = from_single(
            "config.toml",
            "fit_policy = \"first-candidate\"\ncomfortable_ratio = 0.5\ntight_ratio = 0.8\nchars_per_token = 4.0\n",
        );
        assert_eq!(config.fit_policy, FitPolicy::FirstCandidate);
        let t = config.thresholds().unwrap();
        assert!((t.comfortable() - 0.5).abs() < f64::EPSILON);
        assert!((t.tight() - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.estimator().unwrap().estimate("abcdefgh"), 2);
    }

    #[test]
    fn invalid_ratios_surface_as_errors() {
        let config = Config {
            comfortable_ratio: Some(0.95),
            ..Config::default()
        };
        assert!(config.thresholds().is_err());
        let config = Config {
            chars_per_token: Some(0.0),
            ..Config::default()
        };
        assert!(config.estimator().is_err());
    }

    #[test]
    fn generator_defaults_and_partial_override() {
        let config = from_single("config.toml", "[generator]\nmodel = \"gemini-2.5-flash\"\n");
        assert_eq!(config.generator.model, "gemini-2.5-flash");
        assert_eq!(config.generator.top_k, 64);
        assert_eq!(config.generator.max_output_tokens, 32_768);
    }

    #[test]
    fn sparse_yaml_fills_in_defaults() {
        let config: Config = serde_yaml::from_str("log_level: info\n").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[allow(unsafe_code)]
    fn environment_beats_files() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let (_tmp, root) = tree(&[("c.toml", "pattern = \"*.md\"\n")]);

        // SAFETY: ENV_LOCK serializes every test that touches the environment.
        unsafe {
            std::env::set_var("MDCTX_PATTERN", "*.markdown");
            std::env::set_var("MDCTX_GENERATOR__MODEL", "gemini-env");
        }
        let loaded = isolated().add_file(root.join("c.toml")).load();
        // SAFETY: as above.
        unsafe {
            std::env::remove_var("MDCTX_PATTERN");
            std::env::remove_var("MDCTX_GENERATOR__MODEL");
        }

        let (config, _) = loaded.unwrap();
        assert_eq!(config.pattern, "*.markdown");
        assert_eq!(config.generator.model, "gemini-env");
    }

    #[test]
    fn user_dir_is_named_after_the_app() {
        if let Some(path) = user_config_dir() {
            assert!(path.as_str().contains(APP));
        }
    }
}
