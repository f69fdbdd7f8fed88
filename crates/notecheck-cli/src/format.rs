//! Text rendering for terminal output.

use std::fmt;
use std::io::IsTerminal;

use notecheck_core::{ComplianceReport, ElementResult, ElementStatus, OverallRating, Severity};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

/// Colour settings for one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    /// No escape codes.
    pub fn plain() -> Self {
        Self { enabled: false }
    }

    /// Always emit escape codes.
    pub fn colored() -> Self {
        Self { enabled: true }
    }

    /// Colour when stdout is a terminal and `NO_COLOR` is unset.
    pub fn detect() -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        Self {
            enabled: std::io::stdout().is_terminal() && !no_color,
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("{}{}{}", code, text, RESET)
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn severity(&self, severity: Severity) -> String {
        let label = severity.as_str().to_uppercase();
        match severity {
            Severity::Critical => self.paint(RED, &label),
            Severity::High => self.paint(YELLOW, &label),
            Severity::Medium => self.paint(CYAN, &label),
            Severity::Low => self.dim(&label),
        }
    }

    fn rating(&self, rating: OverallRating) -> String {
        match rating {
            OverallRating::Compliant => self.paint(GREEN, rating.label()),
            OverallRating::MinorGaps => self.paint(CYAN, rating.label()),
            OverallRating::RequiresAttention => self.paint(YELLOW, rating.label()),
            OverallRating::NonCompliant => self.paint(RED, rating.label()),
        }
    }

    fn verdict(&self, passed: bool) -> String {
        if passed {
            self.paint(GREEN, "PASS")
        } else {
            self.paint(RED, "FAIL")
        }
    }
}

/// Full report: header, gaps by severity, present elements, summary.
pub fn render_report(report: &ComplianceReport, palette: Palette) -> String {
    ReportView { report, palette }.to_string()
}

struct ReportView<'a> {
    report: &'a ComplianceReport,
    palette: Palette,
}

impl fmt::Display for ReportView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (report, palette) = (self.report, self.palette);

        writeln!(
            f,
            "{} {} (v{})",
            palette.bold("Checklist:"),
            report.checklist_id,
            report.checklist_version
        )?;
        if let Some(meeting_type) = &report.meeting_type {
            writeln!(f, "{} {}", palette.bold("Meeting type:"), meeting_type)?;
        }
        if report.pii_redacted {
            writeln!(f, "{}", palette.dim("PII redacted before assessment"))?;
        }
        writeln!(
            f,
            "{} {}  {}  {:.0}%",
            palette.bold("Result:"),
            palette.verdict(report.passed),
            palette.rating(report.overall_rating),
            report.overall_score * 100.0
        )?;
        writeln!(
            f,
            "Elements: {} assessed, {} present, {} partial, {} missing",
            report.stats.total_elements,
            report.stats.present_count,
            report.stats.partial_count,
            report.stats.missing_count
        )?;

        let mut gaps: Vec<&ElementResult> = report.gaps().collect();
        gaps.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then_with(|| a.element_id.cmp(&b.element_id))
        });

        if !gaps.is_empty() {
            writeln!(f, "\n{}", palette.bold("Gaps:"))?;
            for gap in gaps {
                write_gap(f, gap, palette)?;
            }
        }

        let present: Vec<&ElementResult> = report
            .results
            .iter()
            .filter(|r| r.status == ElementStatus::Present)
            .collect();
        if !present.is_empty() {
            writeln!(f, "\n{}", palette.bold("Present:"))?;
            for result in present {
                writeln!(f, "  {} {}", palette.paint(GREEN, "+"), result.name)?;
            }
        }

        if !report.summary.trim().is_empty() {
            writeln!(f, "\n{}", palette.bold("Summary:"))?;
            writeln!(f, "  {}", report.summary.trim())?;
        }

        Ok(())
    }
}

fn write_gap(f: &mut fmt::Formatter<'_>, gap: &ElementResult, palette: Palette) -> fmt::Result {
    let status = match gap.status {
        ElementStatus::Partial => format!("partial, {:.0}%", gap.score * 100.0),
        other => other.to_string(),
    };
    let optional = if gap.required { "" } else { " (optional)" };

    writeln!(
        f,
        "  [{}] {} ({}){}",
        palette.severity(gap.severity),
        gap.name,
        status,
        palette.dim(optional)
    )?;
    if let Some(notes) = gap.notes.as_deref().filter(|n| !n.is_empty()) {
        writeln!(f, "      {}", palette.dim(notes))?;
    }
    for suggestion in &gap.suggestions {
        writeln!(f, "      - {}", suggestion)?;
    }
    Ok(())
}

/// One row of batch output.
#[derive(Debug, Clone)]
pub struct BatchRow {
    pub note_id: String,
    pub outcome: Result<ComplianceReport, String>,
}

/// Aligned table of batch results.
pub fn render_batch_table(rows: &[BatchRow], palette: Palette) -> String {
    BatchTableView { rows, palette }.to_string()
}

struct BatchTableView<'a> {
    rows: &'a [BatchRow],
    palette: Palette,
}

impl fmt::Display for BatchTableView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let palette = self.palette;
        let width = self
            .rows
            .iter()
            .map(|r| r.note_id.len())
            .chain(std::iter::once("NOTE".len()))
            .max()
            .unwrap_or(4);

        writeln!(
            f,
            "{}",
            palette.bold(&format!("{:<width$}  {:<6}  {:>5}  {:<18}  {}", "NOTE", "RESULT", "SCORE", "RATING", "GAPS"))
        )?;

        for row in self.rows {
            match &row.outcome {
                Ok(report) => {
                    // Pad before painting so escape codes do not break alignment
                    let verdict = if report.passed { "PASS" } else { "FAIL" };
                    let verdict = palette.paint(if report.passed { GREEN } else { RED }, &format!("{:<6}", verdict));
                    writeln!(
                        f,
                        "{:<width$}  {}  {:>4.0}%  {:<18}  {}",
                        row.note_id,
                        verdict,
                        report.overall_score * 100.0,
                        report.overall_rating.label(),
                        report.stats.gap_count()
                    )?;
                }
                Err(error) => {
                    writeln!(
                        f,
                        "{:<width$}  {}  {}",
                        row.note_id,
                        palette.paint(RED, &format!("{:<6}", "ERROR")),
                        error
                    )?;
                }
            }
        }

        Ok(())
    }
}
