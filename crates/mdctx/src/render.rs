//! Terminal rendering for scan results.

use camino::Utf8Path;
use mdctx_core::error::AnalysisError;
use mdctx_core::fit::FitThresholds;
use mdctx_core::scan::{AggregateStats, FileReport, ScanSink};
use mdctx_core::stats::DISPLAY_NAME_WIDTH;
use owo_colors::{Stream, Style};

/// File column: the display name plus a possible `...`.
const FILE_WIDTH: usize = DISPLAY_NAME_WIDTH + 3;

const COLUMNS: [(&str, usize); 6] = [
    ("Size (KB)", 9),
    ("Characters", 11),
    ("Words", 9),
    ("Lines", 7),
    ("Code Blocks", 11),
    ("Est. Tokens", 11),
];

/// Color styling that honours `--color`, `NO_COLOR` and piped output.
///
/// Plain `OwoColorize` methods always emit escapes; these go through
/// `if_supports_color`, which `owo_colors::set_override` controls. Each call
/// renders to a `String`, so styles can be chained.
#[allow(missing_docs)]
pub trait Paint: std::fmt::Display {
    /// Render with `style` when stdout takes color, plain otherwise.
    fn styled(&self, style: Style) -> String {
        owo_colors::OwoColorize::if_supports_color(&self, Stream::Stdout, |v| {
            owo_colors::OwoColorize::style(v, style)
        })
        .to_string()
    }

    fn red(&self) -> String {
        self.styled(Style::new().red())
    }

    fn green(&self) -> String {
        self.styled(Style::new().green())
    }

    fn yellow(&self) -> String {
        self.styled(Style::new().yellow())
    }

    fn blue(&self) -> String {
        self.styled(Style::new().blue())
    }

    fn magenta(&self) -> String {
        self.styled(Style::new().magenta())
    }

    fn cyan(&self) -> String {
        self.styled(Style::new().cyan())
    }

    fn bold(&self) -> String {
        self.styled(Style::new().bold())
    }

    fn dimmed(&self) -> String {
        self.styled(Style::new().dimmed())
    }

    fn underline(&self) -> String {
        self.styled(Style::new().underline())
    }
}

impl<T: std::fmt::Display + ?Sized> Paint for T {}

/// Format an integer with `,` between groups of three digits.
pub fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Cell text for one file, in column order (without the fit column).
pub fn row_cells(report: &FileReport) -> [String; 7] {
    let m = &report.metrics;
    [
        m.display_name(DISPLAY_NAME_WIDTH),
        format!("{:.2}", m.size_kb),
        thousands(m.characters),
        thousands(m.words),
        m.lines.to_string(),
        m.code_blocks.to_string(),
        thousands(m.estimated_tokens),
    ]
}

/// `(metric, total, average)` rows for the summary table.
pub fn summary_rows(stats: &AggregateStats) -> Vec<(&'static str, String, String)> {
    let Some(avg) = stats.averages() else {
        return Vec::new();
    };
    vec![
        ("Files", stats.files.to_string(), "-".to_string()),
        (
            "Size (KB)",
            format!("{:.2}", stats.total_size_kb),
            format!("{:.2}", avg.size_kb),
        ),
        (
            "Characters",
            thousands(stats.total_characters),
            thousands(avg.characters),
        ),
        ("Words", thousands(stats.total_words), thousands(avg.words)),
        ("Lines", thousands(stats.total_lines), thousands(avg.lines)),
        (
            "Code Blocks",
            stats.total_code_blocks.to_string(),
            format!("{:.1}", avg.code_blocks),
        ),
        (
            "Est. Tokens",
            thousands(stats.total_tokens),
            thousands(avg.tokens),
        ),
    ]
}

/// Prints a table row per file as the scan progresses, then a summary.
#[derive(Debug, Default)]
pub struct TableSink;

impl TableSink {
    /// A new table printer.
    pub const fn new() -> Self {
        Self
    }
}

impl ScanSink for TableSink {
    fn on_start(&mut self, dir: &Utf8Path, candidates: usize) {
        println!(
            "{}",
            format!("Analyzing {candidates} markdown files in {dir}/")
                .blue()
                .bold()
        );
        println!();
        let mut header = format!("{:<FILE_WIDTH$}", "File");
        for (title, width) in COLUMNS {
            header.push_str(&format!("  {title:>width$}"));
        }
        header.push_str("  Model Fit");
        println!("{}", header.bold());
    }

    fn on_file(&mut self, report: &FileReport) {
        let cells = row_cells(report);
        let [name, size, chars, words, lines, blocks, tokens] = &cells;
        let w = |i: usize| COLUMNS[i].1;
        let fit = match report.fit.model {
            Some(ref model) => format!("{} {}", report.fit.verdict.glyph(), model.dimmed()),
            None => report.fit.verdict.glyph().to_string(),
        };
        println!(
            "{}  {}  {}  {}  {}  {}  {}  {fit}",
            format!("{name:<FILE_WIDTH$}").cyan(),
            format!("{size:>0$}", w(0)).magenta(),
            format!("{chars:>0$}", w(1)).green(),
            format!("{words:>0$}", w(2)).yellow(),
            format!("{lines:>0$}", w(3)).blue(),
            format!("{blocks:>0$}", w(4)).red(),
            format!("{tokens:>0$}", w(5)).green().bold(),
        );
    }

    fn on_skip(&mut self, path: &Utf8Path, error: &AnalysisError) {
        eprintln!("{} {error}", format!("Skipped {path}:").red());
    }

    fn on_empty(&mut self, dir: &Utf8Path) {
        println!("{}", format!("No matching files found in {dir}/").yellow());
    }

    fn on_finish(&mut self, _dir: &Utf8Path, stats: &AggregateStats) {
        let rows = summary_rows(stats);
        if rows.is_empty() {
            if stats.skipped > 0 {
                println!(
                    "{}",
                    format!("None of {} files could be read", stats.skipped).yellow()
                );
            }
            return;
        }
        println!();
        println!("{}", "Summary Statistics".bold().underline());
        println!("{}", format!("{:<12}  {:>12}  {:>10}", "Metric", "Total", "Average").bold());
        for (metric, total, average) in rows {
            println!(
                "{}  {}  {}",
                format!("{metric:<12}").cyan(),
                format!("{total:>12}").green(),
                format!("{average:>10}").yellow(),
            );
        }
        if stats.skipped > 0 {
            println!("{}", format!("{} files skipped", stats.skipped).red());
        }
    }
}

/// Print what the fit glyphs mean for the given thresholds.
pub fn print_legend(thresholds: FitThresholds) {
    let pct = |r: f64| (r * 100.0).round();
    let (c, t) = (pct(thresholds.comfortable()), pct(thresholds.tight()));
    println!();
    println!("{}", "Model Fit".bold().underline());
    println!("✅ = Fits comfortably (<= {c}% of context)");
    println!("⚠️ = Fits but tight ({c}-{t}% of context)");
    println!("❌ = Too large (> {t}% of context for every model)");
}
