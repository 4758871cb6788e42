//! Per-file text statistics.
//!
//! [`analyze_file`] reads one markdown file and measures it: size, characters,
//! words, lines, fenced code blocks and estimated tokens.

use std::sync::LazyLock;

use camino::Utf8Path;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::tokens::{self, TokenEstimator};

/// Lazy, non-nested match from one triple-backtick fence to the next.
static CODE_BLOCK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[\s\S]*?```").expect("valid regex"));

/// Width used when file names are shown in tables.
pub const DISPLAY_NAME_WIDTH: usize = 20;

/// Measurements for a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetrics {
    /// File name without directory.
    pub filename: String,
    /// Size on disk in KiB, rounded to two decimals.
    pub size_kb: f64,
    /// Characters, whitespace included.
    pub characters: usize,
    /// Characters with spaces, tabs and newlines removed.
    pub characters_no_spaces: usize,
    /// Whitespace-delimited words.
    pub words: usize,
    /// Newline-delimited lines.
    pub lines: usize,
    /// Paired triple-backtick regions.
    pub code_blocks: usize,
    /// Estimated token count.
    pub estimated_tokens: usize,
}

impl FileMetrics {
    /// File name cut to `max` characters, with `...` appended when cut.
    pub fn display_name(&self, max: usize) -> String {
        if self.filename.chars().count() > max {
            let head: String = self.filename.chars().take(max).collect();
            format!("{head}...")
        } else {
            self.filename.clone()
        }
    }
}

/// Read and measure a file.
///
/// The size comes from file metadata (logical length, not allocated blocks),
/// so an empty file is always `0.00` KiB.
///
/// # Errors
///
/// Returns [`AnalysisError::FileRead`] when the file cannot be opened, its
/// metadata cannot be read, or its content is not valid UTF-8.
#[tracing::instrument(skip(estimator))]
pub fn analyze_file(path: &Utf8Path, estimator: &TokenEstimator) -> AnalysisResult<FileMetrics> {
    let read_err = |source: std::io::Error| AnalysisError::FileRead {
        path: path.to_path_buf(),
        source,
    };
    let metadata = std::fs::metadata(path.as_std_path()).map_err(read_err)?;
    let content = std::fs::read_to_string(path.as_std_path()).map_err(read_err)?;

    let filename = path.file_name().unwrap_or(path.as_str());
    let metrics = measure(filename, metadata.len(), &content, estimator);
    tracing::debug!(
        characters = metrics.characters,
        tokens = metrics.estimated_tokens,
        "file measured"
    );
    Ok(metrics)
}

/// Measure already-loaded content.
#[allow(clippy::cast_precision_loss)]
pub fn measure(
    filename: &str,
    size_bytes: u64,
    content: &str,
    estimator: &TokenEstimator,
) -> FileMetrics {
    FileMetrics {
        filename: filename.to_string(),
        size_kb: round_to(size_bytes as f64 / 1024.0, 2),
        characters: content.chars().count(),
        characters_no_spaces: content
            .chars()
            .filter(|c| !matches!(c, ' ' | '\n' | '\t'))
            .count(),
        words: tokens::words(content).count(),
        lines: content.lines().count(),
        code_blocks: count_code_blocks(content),
        estimated_tokens: estimator.estimate(content),
    }
}

/// Count paired triple-backtick regions. An unpaired trailing fence is ignored.
pub fn count_code_blocks(text: &str) -> usize {
    CODE_BLOCK_PATTERN.find_iter(text).count()
}

/// Round to `places` decimals, exact ties going to the even digit.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round_ties_even() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::fs;
    use tempfile::TempDir;

    fn metrics_for(content: &str) -> FileMetrics {
        measure("doc.md", content.len() as u64, content, &TokenEstimator::default())
    }

    #[test]
    fn no_fences_no_code_blocks() {
        assert_eq!(count_code_blocks("plain text\nwith `inline` code"), 0);
    }

    #[test]
    fn one_fenced_region() {
        let text = "intro\n```rust\nfn main() {}\n```\noutro";
        assert_eq!(count_code_blocks(text), 1);
    }

    #[test]
    fn three_sequential_regions() {
        let text = "```\na\n```\n\n```sh\nb\n```\ntext\n```\nc\n```\n";
        assert_eq!(count_code_blocks(text), 3);
    }

    #[test]
    fn unpaired_trailing_fence_is_not_counted() {
        let text = "```\na\n```\n```\nunterminated";
        assert_eq!(count_code_blocks(text), 1);
    }

    #[test]
    fn longer_fences_pair_on_their_first_three_backticks() {
        // "````" starts a region at its first three backticks; the stray
        // fourth backtick is not a fence on its own.
        assert_eq!(count_code_blocks("````\nx\n````"), 1);
    }

    #[test]
    fn empty_content_measures_zero() {
        let m = metrics_for("");
        assert_eq!(m.characters, 0);
        assert_eq!(m.characters_no_spaces, 0);
        assert_eq!(m.words, 0);
        assert_eq!(m.lines, 0);
        assert_eq!(m.code_blocks, 0);
        assert_eq!(m.estimated_tokens, 0);
        assert!(m.size_kb.abs() < f64::EPSILON);
    }

    #[test]
    fn counts_basic_metrics() {
        let m = metrics_for("# Title\n\nSome words here.\n\tindented line\n");
        assert_eq!(m.characters, 41);
        assert_eq!(m.characters_no_spaces, 32);
        assert_eq!(m.words, 7);
        assert_eq!(m.lines, 4);
    }

    #[test]
    fn carriage_returns_are_kept_in_no_space_count() {
        let m = metrics_for("a\r\nb");
        assert_eq!(m.characters_no_spaces, 3);
        assert_eq!(m.lines, 2);
    }

    #[test]
    fn characters_counts_scalar_values() {
        let m = metrics_for("héllo wörld");
        assert_eq!(m.characters, 11);
        assert_eq!(m.words, 2);
    }

    #[test]
    fn size_is_rounded_kib() {
        let m = measure("x.md", 1536, "", &TokenEstimator::default());
        assert!((m.size_kb - 1.5).abs() < f64::EPSILON);
        let m = measure("x.md", 1000, "", &TokenEstimator::default());
        assert!((m.size_kb - 0.98).abs() < f64::EPSILON);
    }

    #[test]
    fn exact_size_ties_round_to_even() {
        // 128 B = 0.125 KiB, 640 B = 0.625 KiB: both exact binary ties
        let m = measure("x.md", 128, "", &TokenEstimator::default());
        assert!((m.size_kb - 0.12).abs() < f64::EPSILON);
        let m = measure("x.md", 640, "", &TokenEstimator::default());
        assert!((m.size_kb - 0.62).abs() < f64::EPSILON);
        let m = measure("x.md", 384, "", &TokenEstimator::default());
        assert!((m.size_kb - 0.38).abs() < f64::EPSILON);
    }

    #[test]
    fn words_split_on_information_separators() {
        assert_eq!(metrics_for("alpha\u{1f}beta gamma").words, 3);
    }

    #[test]
    fn display_name_truncates_long_names() {
        let mut m = metrics_for("");
        m.filename = "a-very-long-file-name-indeed.md".to_string();
        assert_eq!(m.display_name(DISPLAY_NAME_WIDTH), "a-very-long-file-nam...");
        m.filename = "short.md".to_string();
        assert_eq!(m.display_name(DISPLAY_NAME_WIDTH), "short.md");
        m.filename = "x".repeat(20);
        assert_eq!(m.display_name(DISPLAY_NAME_WIDTH), "x".repeat(20));
    }

    #[test]
    fn analyze_zero_byte_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.md");
        fs::write(&path, "").unwrap();
        let path = Utf8PathBuf::try_from(path).unwrap();

        let m = analyze_file(&path, &TokenEstimator::default()).unwrap();
        assert_eq!(m.filename, "empty.md");
        assert_eq!(m.characters, 0);
        assert_eq!(m.words, 0);
        assert_eq!(m.lines, 0);
        assert_eq!(m.code_blocks, 0);
        assert!(m.size_kb.abs() < f64::EPSILON);
    }

    #[test]
    fn analyze_uses_file_size_not_content_length() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("multi.md");
        // 2048 bytes, 1024 characters
        fs::write(&path, "é".repeat(1024)).unwrap();
        let path = Utf8PathBuf::try_from(path).unwrap();

        let m = analyze_file(&path, &TokenEstimator::default()).unwrap();
        assert!((m.size_kb - 2.0).abs() < f64::EPSILON);
        assert_eq!(m.characters, 1024);
    }

    #[test]
    fn invalid_utf8_is_a_read_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.md");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let path = Utf8PathBuf::try_from(path).unwrap();

        let err = analyze_file(&path, &TokenEstimator::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::FileRead { .. }));
        assert!(err.to_string().contains("bad.md"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = analyze_file(
            Utf8Path::new("/nonexistent/definitely/missing.md"),
            &TokenEstimator::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::FileRead { .. }));
    }
}
