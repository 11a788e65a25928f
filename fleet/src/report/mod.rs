//! Deployment report

pub mod text;

use crate::models::deployment::{Outcome, OutcomeStatus};

/// Everything reported for one resource group
#[derive(Debug, Clone)]
pub struct GroupReport {
    /// 1-based position in the group list
    pub index: usize,
    pub total: usize,
    pub group: String,
    pub outcomes: Vec<Outcome>,

    /// Set when the group's targets could not be listed
    pub listing_error: Option<String>,
}

impl GroupReport {
    pub fn new(index: usize, total: usize, group: impl Into<String>) -> Self {
        Self {
            index,
            total,
            group: group.into(),
            outcomes: Vec::new(),
            listing_error: None,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Consumer of finished group reports
pub trait ReportSink {
    fn render_group(&mut self, report: &GroupReport);
}

/// Status of an outcome, without the body.
///
/// A completed attempt sequence reports the last attempt's status as is.
pub fn status_text(outcome: &Outcome) -> String {
    let last = outcome.last.as_ref().map(|a| a.status.to_string());

    match outcome.status {
        OutcomeStatus::Succeeded => last.unwrap_or_default(),
        OutcomeStatus::Failed => match (last, &outcome.detail) {
            (Some(last), None) => last,
            (Some(last), Some(detail)) => format!("{} ({})", last, detail),
            (None, Some(detail)) => format!("failed: {}", detail),
            (None, None) => "failed".to_string(),
        },
        OutcomeStatus::ResolutionFailed => format!(
            "resolution failed: {}",
            outcome.detail.as_deref().unwrap_or("unknown error")
        ),
        OutcomeStatus::DeadlineExceeded => match last {
            Some(last) => format!(
                "deadline exceeded after {} attempts (last: {})",
                outcome.attempts, last
            ),
            None => "deadline exceeded before any attempt".to_string(),
        },
    }
}

/// Response body of a completed attempt sequence, appended to the status
pub fn response_body(outcome: &Outcome) -> Option<&str> {
    match (outcome.status, &outcome.detail) {
        (OutcomeStatus::Succeeded | OutcomeStatus::Failed, None) => {
            outcome.last.as_ref().and_then(|a| a.body.as_deref())
        }
        _ => None,
    }
}
