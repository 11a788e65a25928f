//! Finite state machine for a target's attempt sequence

use chrono::{DateTime, Utc};

use crate::models::deployment::{AttemptResult, Outcome};

/// Attempt state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Nothing sent yet
    Pending,

    /// A request is in flight
    Attempting,

    /// Last attempt failed, waiting out the retry delay
    BackingOff,

    /// An attempt returned 200
    Succeeded,

    /// Every allowed attempt failed
    Exhausted,
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Succeeded | AttemptState::Exhausted)
    }
}

/// Attempt event
#[derive(Debug, Clone)]
pub enum AttemptEvent {
    /// Send the first attempt
    Start,

    /// The in-flight attempt succeeded
    Succeeded(AttemptResult),

    /// The in-flight attempt failed
    Failed(AttemptResult),

    /// Retry delay elapsed, send the next attempt
    Retry,
}

/// Attempt FSM for one target
#[derive(Debug, Clone)]
pub struct AttemptFsm {
    state: AttemptState,
    attempts: u32,
    max_attempts: u32,
    last: Option<AttemptResult>,
}

impl AttemptFsm {
    /// Create a new FSM allowing `max_attempts` attempts (at least one)
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: AttemptState::Pending,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            last: None,
        }
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// Attempts started so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last(&self) -> Option<&AttemptResult> {
        self.last.as_ref()
    }

    /// Check if another attempt is allowed after a failure
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: AttemptEvent) -> Result<(), String> {
        let new_state = match (self.state, event) {
            (AttemptState::Pending, AttemptEvent::Start) => {
                self.attempts = 1;
                AttemptState::Attempting
            }

            (AttemptState::Attempting, AttemptEvent::Succeeded(result)) => {
                self.last = Some(result);
                AttemptState::Succeeded
            }
            (AttemptState::Attempting, AttemptEvent::Failed(result)) => {
                self.last = Some(result);
                if self.can_retry() {
                    AttemptState::BackingOff
                } else {
                    AttemptState::Exhausted
                }
            }

            (AttemptState::BackingOff, AttemptEvent::Retry) => {
                self.attempts += 1;
                AttemptState::Attempting
            }

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }

    /// Fold the finished sequence into the target's outcome
    pub fn into_outcome(self, target: String, started_at: DateTime<Utc>) -> Result<Outcome, String> {
        match (self.state, self.last) {
            (state, Some(last)) if state.is_terminal() => {
                Ok(Outcome::completed(target, last, started_at))
            }
            (state, _) => Err(format!("Attempt sequence not finished: {:?}", state)),
        }
    }
}
