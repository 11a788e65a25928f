//! Deployment models

use std::fmt;

use chrono::{DateTime, Utc};
use kudu_models::models::DeployRequest;
use serde::Serialize;

use crate::errors::FleetError;

/// Payload sent to every target of a batch.
///
/// Serialized once; every attempt sends the same bytes.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    payload: DeployRequest,
    bytes: Vec<u8>,
}

impl DeploymentRequest {
    /// Build a `basic` git deployment for `repo_url`
    pub fn new(repo_url: &str) -> Result<Self, FleetError> {
        let payload = DeployRequest::basic(repo_url);
        let bytes = serde_json::to_vec(&payload)?;
        Ok(Self { payload, bytes })
    }

    pub fn repo_url(&self) -> &str {
        &self.payload.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// How a single attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptStatus {
    /// The endpoint answered with this HTTP status
    Http { code: u16 },

    /// The request never produced a response
    Transport { message: String },

    /// No response within the per-attempt timeout
    TimedOut { after_secs: u64 },
}

impl AttemptStatus {
    /// Only a plain 200 counts as a triggered deployment
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptStatus::Http { code: 200 })
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::Http { code } => {
                let reason = reqwest::StatusCode::from_u16(*code)
                    .ok()
                    .and_then(|s| s.canonical_reason());
                match reason {
                    Some(reason) => write!(f, "{} {}", code, reason),
                    None => write!(f, "{}", code),
                }
            }
            AttemptStatus::Transport { message } => write!(f, "transport error: {}", message),
            AttemptStatus::TimedOut { after_secs } => write!(f, "timed out after {}s", after_secs),
        }
    }
}

/// Result of one attempt against one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptResult {
    /// 1-based attempt number
    pub attempt: u32,
    pub status: AttemptStatus,
    pub body: Option<String>,
}

/// Final status of a target in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    ResolutionFailed,
    DeadlineExceeded,
}

impl OutcomeStatus {
    pub fn is_success(&self) -> bool {
        *self == OutcomeStatus::Succeeded
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Succeeded => "succeeded",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::ResolutionFailed => "resolution-failed",
            OutcomeStatus::DeadlineExceeded => "deadline-exceeded",
        };
        f.write_str(s)
    }
}

/// Terminal per-target result of a batch
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub target: String,
    pub status: OutcomeStatus,

    /// Attempts actually issued
    pub attempts: u32,

    /// Last attempt, absent when none was made
    pub last: Option<AttemptResult>,

    /// Why the target never got a usable attempt sequence
    pub detail: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Outcome {
    /// Outcome after the attempt sequence ran to completion
    pub fn completed(target: String, last: AttemptResult, started_at: DateTime<Utc>) -> Self {
        let status = if last.status.is_success() {
            OutcomeStatus::Succeeded
        } else {
            OutcomeStatus::Failed
        };
        Self {
            target,
            status,
            attempts: last.attempt,
            last: Some(last),
            detail: None,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Target that never reached the dispatch engine
    pub fn resolution_failed(target: String, detail: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            target,
            status: OutcomeStatus::ResolutionFailed,
            attempts: 0,
            last: None,
            detail: Some(detail.into()),
            started_at: now,
            finished_at: now,
        }
    }

    /// Target still pending when the batch deadline passed
    pub fn deadline_exceeded(
        target: String,
        last: Option<AttemptResult>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            target,
            status: OutcomeStatus::DeadlineExceeded,
            attempts: last.as_ref().map(|a| a.attempt).unwrap_or(0),
            last,
            detail: Some("batch deadline exceeded".to_string()),
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Target whose task ended without reporting
    pub fn aborted(
        target: String,
        last: Option<AttemptResult>,
        started_at: DateTime<Utc>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            target,
            status: OutcomeStatus::Failed,
            attempts: last.as_ref().map(|a| a.attempt).unwrap_or(0),
            last,
            detail: Some(detail.into()),
            started_at,
            finished_at: Utc::now(),
        }
    }
}
