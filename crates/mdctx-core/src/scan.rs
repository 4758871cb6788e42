//! Directory aggregation.
//!
//! [`analyze_directory`] lists the matching files directly inside a directory,
//! measures each one, classifies its fit and folds the result into an
//! [`AggregateStats`]. Rows are handed to a [`ScanSink`] as they are produced;
//! the library itself never prints.
//!
//! A file that cannot be read is a soft failure: it is reported to the sink,
//! counted as skipped, and excluded from totals and averages.

use camino::{Utf8Path, Utf8PathBuf};
use globset::{Glob, GlobMatcher};
use serde::Serialize;

use crate::config::Config;
use crate::error::{AnalysisError, AnalysisResult};
use crate::fit::{self, FitOutcome, FitPolicy, FitThresholds, ModelLimit};
use crate::stats::{self, FileMetrics};
use crate::tokens::TokenEstimator;

/// One analyzed file: its measurements and its fit.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// Measurements.
    #[serde(flatten)]
    pub metrics: FileMetrics,
    /// Fit against the model table.
    pub fit: FitOutcome,
}

/// Running totals for one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    /// Files analyzed successfully.
    pub files: usize,
    /// Files that failed to read.
    pub skipped: usize,
    /// Sum of per-file sizes in KiB.
    pub total_size_kb: f64,
    /// Sum of characters.
    pub total_characters: usize,
    /// Sum of words.
    pub total_words: usize,
    /// Sum of lines.
    pub total_lines: usize,
    /// Sum of code blocks.
    pub total_code_blocks: usize,
    /// Sum of estimated tokens.
    pub total_tokens: usize,
}

/// Per-file averages over successfully analyzed files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Averages {
    /// Mean size in KiB, two decimals.
    pub size_kb: f64,
    /// Mean characters, integer division.
    pub characters: usize,
    /// Mean words, integer division.
    pub words: usize,
    /// Mean lines, integer division.
    pub lines: usize,
    /// Mean code blocks, one decimal.
    pub code_blocks: f64,
    /// Mean estimated tokens, integer division.
    pub tokens: usize,
}

impl AggregateStats {
    /// Fold one file into the totals.
    pub fn record(&mut self, metrics: &FileMetrics) {
        self.files += 1;
        self.total_size_kb += metrics.size_kb;
        self.total_characters += metrics.characters;
        self.total_words += metrics.words;
        self.total_lines += metrics.lines;
        self.total_code_blocks += metrics.code_blocks;
        self.total_tokens += metrics.estimated_tokens;
    }

    /// Count a file that could not be read.
    pub const fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Averages over analyzed files, or `None` when there are none.
    #[allow(clippy::cast_precision_loss)]
    pub fn averages(&self) -> Option<Averages> {
        let n = self.files;
        if n == 0 {
            return None;
        }
        Some(Averages {
            size_kb: stats::round_to(self.total_size_kb / n as f64, 2),
            characters: self.total_characters / n,
            words: self.total_words / n,
            lines: self.total_lines / n,
            code_blocks: stats::round_to(self.total_code_blocks as f64 / n as f64, 1),
            tokens: self.total_tokens / n,
        })
    }
}

/// Receives scan events as they happen.
///
/// Every method except [`ScanSink::on_file`] has an empty default.
pub trait ScanSink {
    /// Called once after discovery, before any file is read.
    fn on_start(&mut self, _dir: &Utf8Path, _candidates: usize) {}

    /// Called for each successfully analyzed file.
    fn on_file(&mut self, report: &FileReport);

    /// Called for each file that could not be read.
    fn on_skip(&mut self, _path: &Utf8Path, _error: &AnalysisError) {}

    /// Called instead of `on_start` when no file matches.
    fn on_empty(&mut self, _dir: &Utf8Path) {}

    /// Called once at the end with the final totals.
    fn on_finish(&mut self, _dir: &Utf8Path, _stats: &AggregateStats) {}
}

/// A file that was skipped, with the reason as text.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    /// Path of the unreadable file.
    pub path: Utf8PathBuf,
    /// Human-readable reason.
    pub error: String,
}

/// A sink that keeps everything it is given.
#[derive(Debug, Default, Serialize)]
pub struct CollectingSink {
    /// Analyzed files, in scan order.
    pub files: Vec<FileReport>,
    /// Skipped files, in scan order.
    pub skipped: Vec<SkippedFile>,
}

impl ScanSink for CollectingSink {
    fn on_file(&mut self, report: &FileReport) {
        self.files.push(report.clone());
    }

    fn on_skip(&mut self, path: &Utf8Path, error: &AnalysisError) {
        self.skipped.push(SkippedFile {
            path: path.to_path_buf(),
            error: error.to_string(),
        });
    }
}

/// Everything a scan needs besides the directory.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pattern: String,
    matcher: GlobMatcher,
    limits: Vec<ModelLimit>,
    thresholds: FitThresholds,
    policy: FitPolicy,
    estimator: TokenEstimator,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            pattern: "*.md".to_string(),
            matcher: Glob::new("*.md").expect("valid glob").compile_matcher(),
            limits: fit::default_model_limits(),
            thresholds: FitThresholds::default(),
            policy: FitPolicy::default(),
            estimator: TokenEstimator::default(),
        }
    }
}

impl ScanOptions {
    /// Build options from the loaded configuration.
    pub fn from_config(config: &Config) -> AnalysisResult<Self> {
        Ok(Self::default()
            .with_pattern(&config.pattern)?
            .with_limits(config.model_limits())
            .with_thresholds(config.thresholds()?)
            .with_policy(config.fit_policy)
            .with_estimator(config.estimator()?))
    }

    /// Select files whose name matches `pattern`.
    pub fn with_pattern(mut self, pattern: &str) -> AnalysisResult<Self> {
        let glob = Glob::new(pattern).map_err(|e| AnalysisError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.kind().to_string(),
        })?;
        self.matcher = glob.compile_matcher();
        self.pattern = pattern.to_string();
        Ok(self)
    }

    /// Replace the model table. The given order is the classification order.
    pub fn with_limits(mut self, limits: Vec<ModelLimit>) -> Self {
        self.limits = limits;
        self
    }

    /// Replace the fit thresholds.
    pub fn with_thresholds(mut self, thresholds: FitThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Replace the verdict rule.
    pub fn with_policy(mut self, policy: FitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the token estimator.
    pub fn with_estimator(mut self, estimator: TokenEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// The file-name pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The model table in classification order.
    pub fn limits(&self) -> &[ModelLimit] {
        &self.limits
    }

    /// The fit thresholds.
    pub const fn thresholds(&self) -> FitThresholds {
        self.thresholds
    }

    /// The token estimator.
    pub const fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// Whether a bare file name is selected.
    pub fn matches(&self, file_name: &str) -> bool {
        self.matcher.is_match(file_name)
    }

    /// Classify a token count with these options.
    pub fn classify(&self, tokens: usize) -> FitOutcome {
        fit::classify_fit(tokens, &self.limits, self.thresholds, self.policy)
    }
}

/// List matching regular files directly inside `dir`, sorted by name.
///
/// Entries whose names are not valid UTF-8 are ignored.
pub fn discover_files(dir: &Utf8Path, options: &ScanOptions) -> AnalysisResult<Vec<Utf8PathBuf>> {
    let dir_err = |source: std::io::Error| AnalysisError::DirectoryRead {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir.as_std_path()).map_err(dir_err)? {
        let entry = entry.map_err(dir_err)?;
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            continue;
        };
        if path.is_file() && path.file_name().is_some_and(|name| options.matches(name)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Analyze every matching file in `dir`.
///
/// Per-file read failures never abort the scan. The only error is failing to
/// list `dir` itself.
#[tracing::instrument(skip(options, sink), fields(pattern = options.pattern()))]
pub fn analyze_directory(
    dir: &Utf8Path,
    options: &ScanOptions,
    sink: &mut dyn ScanSink,
) -> AnalysisResult<AggregateStats> {
    let files = discover_files(dir, options)?;
    let mut stats = AggregateStats::default();

    if files.is_empty() {
        tracing::info!("no matching files");
        sink.on_empty(dir);
        sink.on_finish(dir, &stats);
        return Ok(stats);
    }

    sink.on_start(dir, files.len());

    for path in &files {
        match stats::analyze_file(path, options.estimator()) {
            Ok(metrics) => {
                let fit = options.classify(metrics.estimated_tokens);
                stats.record(&metrics);
                sink.on_file(&FileReport { metrics, fit });
            }
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "skipping unreadable file");
                stats.record_skip();
                sink.on_skip(path, &err);
            }
        }
    }

    tracing::info!(files = stats.files, skipped = stats.skipped, "scan complete");
    sink.on_finish(dir, &stats);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::FitVerdict;
    use std::fs;
    use tempfile::TempDir;

    fn utf8_dir(tmp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap()
    }

    #[derive(Default)]
    struct EventLog {
        events: Vec<String>,
    }

    impl ScanSink for EventLog {
        fn on_start(&mut self, _dir: &Utf8Path, candidates: usize) {
            self.events.push(format!("start {candidates}"));
        }
        fn on_file(&mut self, report: &FileReport) {
            self.events.push(format!("file {}", report.metrics.filename));
        }
        fn on_skip(&mut self, path: &Utf8Path, _error: &AnalysisError) {
            self.events.push(format!("skip {}", path.file_name().unwrap()));
        }
        fn on_empty(&mut self, _dir: &Utf8Path) {
            self.events.push("empty".to_string());
        }
        fn on_finish(&mut self, _dir: &Utf8Path, stats: &AggregateStats) {
            self.events.push(format!("finish {}", stats.files));
        }
    }

    #[test]
    fn empty_directory_yields_zero_report() {
        let tmp = TempDir::new().unwrap();
        let mut sink = EventLog::default();
        let stats = analyze_directory(&utf8_dir(&tmp), &ScanOptions::default(), &mut sink).unwrap();

        assert_eq!(stats, AggregateStats::default());
        assert!(stats.averages().is_none());
        assert_eq!(sink.events, ["empty", "finish 0"]);
    }

    #[test]
    fn read_failures_are_excluded_from_averages() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a-empty.md"), "").unwrap();
        fs::write(tmp.path().join("b-broken.md"), [0xff, 0xfe, 0xfd]).unwrap();

        let mut sink = CollectingSink::default();
        let stats = analyze_directory(&utf8_dir(&tmp), &ScanOptions::default(), &mut sink).unwrap();

        assert_eq!(stats.files, 1);
        assert_eq!(stats.skipped, 1);
        let avg = stats.averages().unwrap();
        assert_eq!(avg.characters, 0);
        assert!(avg.size_kb.abs() < f64::EPSILON);
        assert_eq!(sink.files.len(), 1);
        assert_eq!(sink.skipped.len(), 1);
        assert!(sink.skipped[0].path.as_str().ends_with("b-broken.md"));
    }

    #[test]
    fn events_arrive_in_name_order() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.md"), "bee").unwrap();
        fs::write(tmp.path().join("a.md"), "ay").unwrap();
        fs::write(tmp.path().join("c.md"), [0xc3, 0x28]).unwrap();

        let mut sink = EventLog::default();
        analyze_directory(&utf8_dir(&tmp), &ScanOptions::default(), &mut sink).unwrap();
        assert_eq!(
            sink.events,
            ["start 3", "file a.md", "file b.md", "skip c.md", "finish 2"]
        );
    }

    #[test]
    fn only_matching_files_directly_inside() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("keep.md"), "x").unwrap();
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        fs::write(tmp.path().join("README.MD"), "x").unwrap();
        fs::create_dir(tmp.path().join("nested.md")).unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub").join("deep.md"), "x").unwrap();

        let files = discover_files(&utf8_dir(&tmp), &ScanOptions::default()).unwrap();
        let names: Vec<_> = files.iter().filter_map(|p| p.file_name()).collect();
        assert_eq!(names, ["keep.md"]);
    }

    #[test]
    fn custom_pattern_selects_other_extensions() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.markdown"), "x").unwrap();
        fs::write(tmp.path().join("b.md"), "x").unwrap();

        let options = ScanOptions::default().with_pattern("*.markdown").unwrap();
        let files = discover_files(&utf8_dir(&tmp), &options).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].as_str().ends_with("a.markdown"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = ScanOptions::default().with_pattern("[unclosed").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidPattern { .. }));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let mut sink = CollectingSink::default();
        let err = analyze_directory(
            Utf8Path::new("/nonexistent/mdctx/input"),
            &ScanOptions::default(),
            &mut sink,
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::DirectoryRead { .. }));
    }

    #[test]
    fn totals_equal_sum_of_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("one.md"), "alpha beta\ngamma\n").unwrap();
        fs::write(
            tmp.path().join("two.md"),
            "```\ncode\n```\n\n```\nmore\n```\n",
        )
        .unwrap();

        let mut sink = CollectingSink::default();
        let stats = analyze_directory(&utf8_dir(&tmp), &ScanOptions::default(), &mut sink).unwrap();

        let sum = |f: fn(&FileMetrics) -> usize| -> usize {
            sink.files.iter().map(|r| f(&r.metrics)).sum()
        };
        assert_eq!(stats.files, 2);
        assert_eq!(stats.total_characters, sum(|m| m.characters));
        assert_eq!(stats.total_words, sum(|m| m.words));
        assert_eq!(stats.total_lines, sum(|m| m.lines));
        assert_eq!(stats.total_code_blocks, 2);
        assert_eq!(stats.total_tokens, sum(|m| m.estimated_tokens));

        let avg = stats.averages().unwrap();
        assert!((avg.code_blocks - 1.0).abs() < f64::EPSILON);
        assert_eq!(avg.lines, stats.total_lines / 2);
    }

    #[test]
    fn classification_uses_supplied_limits() {
        let tmp = TempDir::new().unwrap();
        // 64 characters -> 20 tokens
        fs::write(tmp.path().join("doc.md"), "x".repeat(64)).unwrap();

        let options = ScanOptions::default().with_limits(vec![
            ModelLimit::new("tiny", 10),
            ModelLimit::new("small", 25),
        ]);
        let mut sink = CollectingSink::default();
        analyze_directory(&utf8_dir(&tmp), &options, &mut sink).unwrap();

        let fit = &sink.files[0].fit;
        assert_eq!(fit.verdict, FitVerdict::Tight);
        assert_eq!(fit.model.as_deref(), Some("small"));
    }

    #[test]
    fn averages_round_like_the_report() {
        let mut stats = AggregateStats::default();
        for (size, blocks) in [(0.01, 1), (0.02, 0), (0.02, 0)] {
            stats.record(&FileMetrics {
                filename: "f.md".to_string(),
                size_kb: size,
                characters: 10,
                characters_no_spaces: 8,
                words: 3,
                lines: 2,
                code_blocks: blocks,
                estimated_tokens: 3,
            });
        }
        let avg = stats.averages().unwrap();
        assert!((avg.size_kb - 0.02).abs() < 1e-9);
        assert!((avg.code_blocks - 0.3).abs() < 1e-9);
        assert_eq!(avg.characters, 10);
    }
}
