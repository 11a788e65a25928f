//! Line-oriented text report
//!
//! One `<target>:<status><body>` line per outcome, sorted by target name so
//! the output does not depend on completion order. The body is written as
//! received.

use std::io::Write;

use colored::Colorize;
use tracing::warn;

use crate::models::deployment::{Outcome, OutcomeStatus};
use crate::report::{response_body, status_text, GroupReport, ReportSink};

/// Plain text report writer
pub struct TextReport<W: Write> {
    out: W,
    color: bool,
}

impl<W: Write> TextReport<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_group(&mut self, report: &GroupReport) -> std::io::Result<()> {
        writeln!(
            self.out,
            "Resource group {}/{}: {}",
            report.index, report.total, report.group
        )?;

        if let Some(error) = &report.listing_error {
            let status = format!("resolution failed: {}", error);
            writeln!(self.out, "{}:{}", report.group, self.paint(&status, false))?;
            writeln!(self.out)?;
            return self.out.flush();
        }

        let mut outcomes: Vec<&Outcome> = report.outcomes.iter().collect();
        outcomes.sort_by(|a, b| a.target.cmp(&b.target));
        for outcome in outcomes {
            writeln!(self.out, "{}", self.outcome_line(outcome))?;
        }

        let summary = format!("{} succeeded, {} failed", report.succeeded(), report.failed());
        writeln!(self.out, "{}", self.paint(&summary, report.failed() == 0))?;
        writeln!(self.out)?;
        self.out.flush()
    }

    fn outcome_line(&self, outcome: &Outcome) -> String {
        let status = self.paint(&status_text(outcome), outcome.status == OutcomeStatus::Succeeded);
        let body = response_body(outcome).unwrap_or_default();
        format!("{}:{}{}", outcome.target, status, body)
    }

    fn paint(&self, text: &str, ok: bool) -> String {
        match (self.color, ok) {
            (false, _) => text.to_string(),
            (true, true) => text.green().to_string(),
            (true, false) => text.red().to_string(),
        }
    }
}

impl<W: Write> ReportSink for TextReport<W> {
    fn render_group(&mut self, report: &GroupReport) {
        if let Err(e) = self.write_group(report) {
            warn!("Failed to write report for {}: {}", report.group, e);
        }
    }
}
