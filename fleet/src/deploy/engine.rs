//! Concurrent dispatch engine
//!
//! One task per target, fanned out on a `JoinSet` and fanned back in through
//! an mpsc channel. A batch resolves when every task has reported its outcome
//! or the batch deadline passes, whichever comes first. Either way exactly
//! one outcome per submitted target is returned.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};

use crate::deploy::fsm::{AttemptEvent, AttemptFsm, AttemptState};
use crate::deploy::transport::DeployTransport;
use crate::endpoint::Endpoint;
use crate::models::deployment::{AttemptResult, AttemptStatus, DeploymentRequest, Outcome};

/// Attempts per target, the first one included
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Fixed pause between two attempts of the same target
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Dispatch settings
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Total attempts per target
    pub max_attempts: u32,

    /// Delay between attempts
    pub retry_delay: Duration,

    /// Timeout of a single deploy call
    pub attempt_timeout: Duration,

    /// Time after which still-pending targets are given up
    pub batch_deadline: Duration,

    /// Deploy calls in flight at once, 0 for no limit
    pub max_concurrency: usize,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            attempt_timeout: Duration::from_secs(120),
            batch_deadline: Duration::from_secs(900), // 15 minutes
            max_concurrency: 16,
        }
    }
}

/// Progress reported by target tasks
#[derive(Debug)]
enum DispatchEvent {
    Attempted { target: String, result: AttemptResult },
    Finished(Outcome),
}

struct PendingTarget {
    started_at: DateTime<Utc>,
    last: Option<AttemptResult>,
}

/// Runs deployment batches
pub struct DispatchEngine<T: ?Sized, S> {
    transport: Arc<T>,
    options: DispatchOptions,
    sleep_fn: S,
}

impl<T> DispatchEngine<T, fn(Duration) -> Sleep>
where
    T: DeployTransport + ?Sized + 'static,
{
    /// Create an engine sleeping on the tokio timer
    pub fn new(transport: Arc<T>, options: DispatchOptions) -> Self {
        Self::with_sleep(transport, options, tokio::time::sleep as fn(Duration) -> Sleep)
    }
}

impl<T, S, F> DispatchEngine<T, S>
where
    T: DeployTransport + ?Sized + 'static,
    S: Fn(Duration) -> F + Clone + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    /// Create an engine with a custom retry sleep
    pub fn with_sleep(transport: Arc<T>, options: DispatchOptions, sleep_fn: S) -> Self {
        Self {
            transport,
            options,
            sleep_fn,
        }
    }

    /// Deploy `request` to every target concurrently and wait for all of them.
    ///
    /// Outcomes come back in completion order.
    pub async fn dispatch(
        &self,
        request: Arc<DeploymentRequest>,
        targets: HashMap<String, Endpoint>,
    ) -> Vec<Outcome> {
        let total = targets.len();
        if total == 0 {
            return Vec::new();
        }
        info!("Dispatching {} to {} targets", request.repo_url(), total);

        let limiter = match self.options.max_concurrency {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<String, PendingTarget> = HashMap::with_capacity(total);

        for (target, endpoint) in targets {
            let started_at = Utc::now();
            debug!("Deploying to function: {} ({})", target, endpoint);
            pending.insert(
                target.clone(),
                PendingTarget {
                    started_at,
                    last: None,
                },
            );

            let job = TargetJob {
                target,
                endpoint,
                started_at,
                request: Arc::clone(&request),
                transport: Arc::clone(&self.transport),
                options: self.options.clone(),
                limiter: limiter.clone(),
                sleep_fn: self.sleep_fn.clone(),
                events: events_tx.clone(),
            };
            tasks.spawn(job.run());
        }
        drop(events_tx);

        let deadline = tokio::time::sleep(self.options.batch_deadline);
        tokio::pin!(deadline);

        let mut outcomes = Vec::with_capacity(total);
        let mut deadline_hit = false;

        loop {
            tokio::select! {
                biased;
                event = events_rx.recv() => match event {
                    Some(event) => apply_event(event, &mut pending, &mut outcomes),
                    None => break,
                },
                _ = &mut deadline => {
                    warn!(
                        "Batch deadline ({:?}) reached with {} targets pending",
                        self.options.batch_deadline,
                        pending.len()
                    );
                    deadline_hit = true;
                    break;
                }
            }
        }

        tasks.abort_all();
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    error!("Dispatch task panicked: {}", e);
                }
            }
        }
        while let Ok(event) = events_rx.try_recv() {
            apply_event(event, &mut pending, &mut outcomes);
        }

        for (target, left) in pending {
            let outcome = if deadline_hit {
                Outcome::deadline_exceeded(target, left.last, left.started_at)
            } else {
                Outcome::aborted(
                    target,
                    left.last,
                    left.started_at,
                    "dispatch task ended without an outcome",
                )
            };
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.status.is_success()).count();
        info!(
            "Batch finished: {} succeeded, {} failed",
            succeeded,
            outcomes.len() - succeeded
        );
        outcomes
    }
}

fn apply_event(
    event: DispatchEvent,
    pending: &mut HashMap<String, PendingTarget>,
    outcomes: &mut Vec<Outcome>,
) {
    match event {
        DispatchEvent::Attempted { target, result } => {
            if let Some(entry) = pending.get_mut(&target) {
                entry.last = Some(result);
            }
        }
        DispatchEvent::Finished(outcome) => {
            if pending.remove(&outcome.target).is_some() {
                outcomes.push(outcome);
            }
        }
    }
}

/// Attempt sequence of a single target
struct TargetJob<T: ?Sized, S> {
    target: String,
    endpoint: Endpoint,
    started_at: DateTime<Utc>,
    request: Arc<DeploymentRequest>,
    transport: Arc<T>,
    options: DispatchOptions,
    limiter: Option<Arc<Semaphore>>,
    sleep_fn: S,
    events: mpsc::UnboundedSender<DispatchEvent>,
}

impl<T, S, F> TargetJob<T, S>
where
    T: DeployTransport + ?Sized + 'static,
    S: Fn(Duration) -> F + Clone + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    async fn run(self) {
        let mut fsm = AttemptFsm::new(self.options.max_attempts);

        let outcome = match self.attempt_all(&mut fsm).await {
            Ok(()) => fsm
                .clone()
                .into_outcome(self.target.clone(), self.started_at),
            Err(e) => Err(e),
        };
        let outcome = outcome.unwrap_or_else(|e| {
            error!("{}: {}", self.target, e);
            Outcome::aborted(
                self.target.clone(),
                fsm.last().cloned(),
                self.started_at,
                e,
            )
        });

        let _ = self.events.send(DispatchEvent::Finished(outcome));
    }

    async fn attempt_all(&self, fsm: &mut AttemptFsm) -> Result<(), String> {
        fsm.process(AttemptEvent::Start)?;

        loop {
            let result = self.attempt_once(fsm.attempts()).await;
            let _ = self.events.send(DispatchEvent::Attempted {
                target: self.target.clone(),
                result: result.clone(),
            });

            if result.status.is_success() {
                info!("{}: deployment triggered on attempt {}", self.target, result.attempt);
                return fsm.process(AttemptEvent::Succeeded(result));
            }

            warn!(
                "{}: attempt {}/{} failed: {}",
                self.target, result.attempt, self.options.max_attempts, result.status
            );
            fsm.process(AttemptEvent::Failed(result))?;
            if fsm.state() == AttemptState::Exhausted {
                warn!("{}: giving up after {} attempts", self.target, fsm.attempts());
                return Ok(());
            }

            debug!("{}: retrying in {:?}", self.target, self.options.retry_delay);
            (self.sleep_fn)(self.options.retry_delay).await;
            fsm.process(AttemptEvent::Retry)?;
        }
    }

    async fn attempt_once(&self, attempt: u32) -> AttemptResult {
        let _permit = match &self.limiter {
            Some(limiter) => limiter.acquire().await.ok(),
            None => None,
        };

        let timeout = self.options.attempt_timeout;
        let sent = tokio::time::timeout(timeout, self.transport.send(&self.endpoint, &self.request)).await;

        match sent {
            Ok(Ok(response)) => AttemptResult {
                attempt,
                status: AttemptStatus::Http {
                    code: response.status,
                },
                body: Some(response.body).filter(|body| !body.is_empty()),
            },
            Ok(Err(e)) => AttemptResult {
                attempt,
                status: AttemptStatus::Transport {
                    message: e.to_string(),
                },
                body: None,
            },
            Err(_) => AttemptResult {
                attempt,
                status: AttemptStatus::TimedOut {
                    after_secs: timeout.as_secs(),
                },
                body: None,
            },
        }
    }
}
