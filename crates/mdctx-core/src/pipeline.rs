//! Batch reformatting through a text-generation service.
//!
//! Each matching input file is wrapped in a [`PromptTemplate`], sent to a
//! [`TextGenerator`], and the trimmed response is written under the same file
//! name in the output directory. Files are processed one at a time; a failure
//! on one file is reported and counted, and the batch moves on.

use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::error::{GenerateResult, PipelineError, PipelineResult};
use crate::scan::{self, ScanOptions};

/// Placeholder replaced by the document text.
pub const CONTENT_PLACEHOLDER: &str = "{content}";

/// A response shorter than this share of the input is flagged as possibly
/// truncated.
pub const TRUNCATION_RATIO: f64 = 0.8;

/// Built-in prompt: reorganize a library-component document into a
/// retrieval-friendly layout without dropping information.
pub const DEFAULT_TEMPLATE: &str = r#"
You are a technical documentation formatter specializing in creating RAG-optimized content for library components.

Your task is to reorganize the provided content into a structured template while preserving ALL original information, code examples, and technical details.

Please format the content using this exact structure:

## Metadata
```json
{
  "library": "[library/framework name - e.g., sera-ui, react-three-fiber, three.js]",
  "component_name": "[main component name]",
  "category": "[category - e.g., forms, animation, ui, visualization, effects]",
  "type": "[type - e.g., react, function, class, hook, utility, shader]",
  "features": ["[feature1]", "[feature2]", "[feature3]"]
}
```

# Component Name
[Extract the main component/library name from the content]

# Library/Framework
[Identify the primary framework - React, Three.js, Vue, etc.]

# Component Type
[Specify: React Component, Function, Class, Hook, Utility, etc.]

# Core Purpose
[Brief, clear description of what this component does]

# Installation
[Include all npm/yarn install commands and setup instructions from the original]

# Syntax & Parameters
[Document all props, parameters, configuration options, and their types]

# Code Examples
[Include ALL code examples from the original content - preserve every implementation variant]

# Variations & Tweaks
[Document different implementations, styling options, configuration variants shown in the original]

# Common Patterns
[Implementation patterns, best practices, and usage approaches demonstrated]

# Related Components
[Dependencies, related imports, and components that work together]

# Additional Notes
[Any other technical details, comments, troubleshooting, or important information]

# RAG Keywords
[Extract key technical terms for search: component names, framework terms, concepts, methods]

Important guidelines:
- Extract accurate metadata from the content and place it at the very top
- Preserve ALL original code blocks exactly as written
- Maintain ALL examples and implementation variants
- Keep ALL technical details and parameters
- Do not summarize or condense the content
- Only reorganize and categorize the existing information
- Ensure the formatted output contains the same amount of information as the input

Original content to format:

{content}
"#;

/// Anything that turns a prompt into text.
pub trait TextGenerator {
    /// Generate a response for `prompt`.
    fn generate(&self, prompt: &str) -> GenerateResult<String>;
}

impl<T: TextGenerator + ?Sized> TextGenerator for &T {
    fn generate(&self, prompt: &str) -> GenerateResult<String> {
        (**self).generate(prompt)
    }
}

/// Prompt text with a `{content}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Wrap template text.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Template`] if `{content}` does not occur.
    pub fn new(text: impl Into<String>) -> PipelineResult<Self> {
        let text = text.into();
        if !text.contains(CONTENT_PLACEHOLDER) {
            return Err(PipelineError::Template);
        }
        Ok(Self { text })
    }

    /// Load a template from a UTF-8 file.
    pub fn from_file(path: &Utf8Path) -> PipelineResult<Self> {
        let text =
            std::fs::read_to_string(path.as_std_path()).map_err(|source| PipelineError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(text)
    }

    /// Substitute `content` for every placeholder.
    pub fn render(&self, content: &str) -> String {
        self.text.replace(CONTENT_PLACEHOLDER, content)
    }

    /// The raw template text.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Result of reformatting one file.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedFile {
    /// Source file.
    pub input: Utf8PathBuf,
    /// Written file.
    pub output: Utf8PathBuf,
    /// Characters in the source.
    pub input_chars: usize,
    /// Characters in the trimmed response.
    pub output_chars: usize,
    /// Wall time spent on this file.
    pub elapsed: Duration,
    /// The response is much shorter than the input.
    pub possibly_truncated: bool,
}

#[allow(clippy::cast_precision_loss)]
fn looks_truncated(input_chars: usize, output_chars: usize) -> bool {
    (output_chars as f64) < input_chars as f64 * TRUNCATION_RATIO
}

/// Reformat a single file into `output_dir`.
#[tracing::instrument(skip(generator, template))]
pub fn process_file(
    input: &Utf8Path,
    output_dir: &Utf8Path,
    generator: &dyn TextGenerator,
    template: &PromptTemplate,
) -> PipelineResult<ProcessedFile> {
    let started = Instant::now();

    let raw = std::fs::read_to_string(input.as_std_path()).map_err(|source| {
        PipelineError::Read {
            path: input.to_path_buf(),
            source,
        }
    })?;

    let response = generator
        .generate(&template.render(&raw))
        .map_err(|source| PipelineError::Generate {
            path: input.to_path_buf(),
            source,
        })?;
    let formatted = response.trim();

    let input_chars = raw.chars().count();
    let output_chars = formatted.chars().count();
    let possibly_truncated = looks_truncated(input_chars, output_chars);
    if possibly_truncated {
        tracing::warn!(input_chars, output_chars, "response may be truncated");
    }

    let file_name = input.file_name().unwrap_or(input.as_str());
    let output = output_dir.join(file_name);
    let write_err = |source: std::io::Error| PipelineError::Write {
        path: output.clone(),
        source,
    };
    std::fs::create_dir_all(output_dir.as_std_path()).map_err(write_err)?;
    std::fs::write(output.as_std_path(), formatted).map_err(write_err)?;

    Ok(ProcessedFile {
        input: input.to_path_buf(),
        output: output.clone(),
        input_chars,
        output_chars,
        elapsed: started.elapsed(),
        possibly_truncated,
    })
}

/// Receives batch events as they happen.
pub trait ProcessSink {
    /// Called once after discovery.
    fn on_start(&mut self, _input_dir: &Utf8Path, _total: usize) {}

    /// Called before each file is sent.
    fn on_file_start(&mut self, _path: &Utf8Path) {}

    /// Called after a file has been written.
    fn on_processed(&mut self, file: &ProcessedFile);

    /// Called when a file fails at any stage.
    fn on_failed(&mut self, path: &Utf8Path, error: &PipelineError);

    /// Called instead of `on_start` when no file matches.
    fn on_empty(&mut self, _input_dir: &Utf8Path) {}
}

/// Totals for one batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessSummary {
    /// Files discovered.
    pub total: usize,
    /// Files written.
    pub processed: usize,
    /// Files that failed.
    pub failed: usize,
    /// Per-file time for processed files.
    pub durations: Vec<Duration>,
    /// Wall time for the whole batch.
    pub elapsed: Duration,
}

impl ProcessSummary {
    /// Mean time per processed file.
    pub fn average(&self) -> Option<Duration> {
        let n = u32::try_from(self.durations.len()).ok().filter(|n| *n > 0)?;
        Some(self.durations.iter().sum::<Duration>() / n)
    }

    /// Processed files per second of batch time.
    #[allow(clippy::cast_precision_loss)]
    pub fn rate(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (self.processed > 0 && secs > 0.0).then(|| self.processed as f64 / secs)
    }
}

/// Reformat every matching file in `input_dir` into `output_dir`.
///
/// Both directories are created if missing. Only creating them, listing
/// `input_dir`, or the two resolving to the same directory can fail the batch.
#[tracing::instrument(skip(options, generator, template, sink))]
pub fn process_directory(
    input_dir: &Utf8Path,
    output_dir: &Utf8Path,
    options: &ScanOptions,
    generator: &dyn TextGenerator,
    template: &PromptTemplate,
    sink: &mut dyn ProcessSink,
) -> PipelineResult<ProcessSummary> {
    let started = Instant::now();

    for dir in [input_dir, output_dir] {
        std::fs::create_dir_all(dir.as_std_path()).map_err(|source| PipelineError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let resolve = |dir: &Utf8Path| {
        dir.canonicalize_utf8().map_err(|source| PipelineError::Read {
            path: dir.to_path_buf(),
            source,
        })
    };
    let resolved = resolve(input_dir)?;
    if resolved == resolve(output_dir)? {
        return Err(PipelineError::SameDirectory { path: resolved });
    }

    let files = scan::discover_files(input_dir, options)?;
    let mut summary = ProcessSummary {
        total: files.len(),
        ..ProcessSummary::default()
    };

    if files.is_empty() {
        sink.on_empty(input_dir);
        return Ok(summary);
    }
    sink.on_start(input_dir, files.len());

    for path in &files {
        sink.on_file_start(path);
        match process_file(path, output_dir, generator, template) {
            Ok(done) => {
                summary.processed += 1;
                summary.durations.push(done.elapsed);
                sink.on_processed(&done);
            }
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "file failed");
                summary.failed += 1;
                sink.on_failed(path, &err);
            }
        }
    }

    summary.elapsed = started.elapsed();
    tracing::info!(
        processed = summary.processed,
        failed = summary.failed,
        "batch complete"
    );
    Ok(summary)
}
