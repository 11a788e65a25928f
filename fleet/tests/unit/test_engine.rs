//! Dispatch engine tests

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kudufleet::deploy::engine::{DispatchEngine, DispatchOptions};
use kudufleet::models::deployment::{AttemptStatus, DeploymentRequest, Outcome, OutcomeStatus};
use tokio::time::Instant;

use crate::common::{endpoints, Reply, ScriptedTransport};

const REPO: &str = "https://github.com/acme/functions.git";

fn request() -> Arc<DeploymentRequest> {
    Arc::new(DeploymentRequest::new(REPO).unwrap())
}

fn find<'a>(outcomes: &'a [Outcome], target: &str) -> &'a Outcome {
    outcomes
        .iter()
        .find(|o| o.target == target)
        .unwrap_or_else(|| panic!("no outcome for {target}"))
}

#[tokio::test(start_paused = true)]
async fn test_one_outcome_per_target() {
    let transport = Arc::new(ScriptedTransport::new().script("app-c", vec![Reply::Status(500, "")]));
    let engine = DispatchEngine::new(Arc::clone(&transport), DispatchOptions::default());

    let outcomes = engine
        .dispatch(request(), endpoints(&["app-a", "app-b", "app-c", "app-d", "app-e"]))
        .await;

    assert_eq!(outcomes.len(), 5);
    let targets: HashSet<&str> = outcomes.iter().map(|o| o.target.as_str()).collect();
    assert_eq!(targets.len(), 5);
    assert_eq!(find(&outcomes, "app-c").status, OutcomeStatus::Failed);

    // Every call carries the same payload
    let bodies: HashSet<Vec<u8>> = transport.calls().into_iter().map(|c| c.body).collect();
    assert_eq!(bodies.len(), 1);
    assert!(bodies.contains(request().bytes()));
}

#[tokio::test(start_paused = true)]
async fn test_empty_batch() {
    let engine = DispatchEngine::new(Arc::new(ScriptedTransport::new()), DispatchOptions::default());
    let outcomes = engine.dispatch(request(), endpoints(&[])).await;
    assert!(outcomes.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_first_attempt_success() {
    let transport = Arc::new(ScriptedTransport::new().script("app-a", vec![Reply::Status(200, "queued")]));
    let engine = DispatchEngine::new(Arc::clone(&transport), DispatchOptions::default());

    let outcomes = engine.dispatch(request(), endpoints(&["app-a"])).await;

    let outcome = find(&outcomes, "app-a");
    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    assert_eq!(outcome.attempts, 1);
    let last = outcome.last.as_ref().unwrap();
    assert_eq!(last.status, AttemptStatus::Http { code: 200 });
    assert_eq!(last.body.as_deref(), Some("queued"));
    assert_eq!(transport.calls_to("app-a").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_failure_retries_with_delay() {
    let transport = Arc::new(
        ScriptedTransport::new().script("app-a", vec![Reply::Status(500, "build agent offline")]),
    );
    let engine = DispatchEngine::new(Arc::clone(&transport), DispatchOptions::default());

    let outcomes = engine.dispatch(request(), endpoints(&["app-a"])).await;

    let outcome = find(&outcomes, "app-a");
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.attempts, 3);
    let last = outcome.last.as_ref().unwrap();
    assert_eq!(last.attempt, 3);
    assert_eq!(last.status, AttemptStatus::Http { code: 500 });
    assert_eq!(last.body.as_deref(), Some("build agent offline"));

    let calls = transport.calls_to("app-a");
    assert_eq!(calls.len(), 3);
    for pair in calls.windows(2) {
        assert!(pair[1].at - pair[0].at >= Duration::from_secs(5));
    }
}

#[tokio::test(start_paused = true)]
async fn test_fail_fail_succeed() {
    let transport = Arc::new(ScriptedTransport::new().script(
        "app-a",
        vec![
            Reply::Status(500, ""),
            Reply::Status(502, ""),
            Reply::Status(200, ""),
        ],
    ));
    let engine = DispatchEngine::new(Arc::clone(&transport), DispatchOptions::default());

    let outcomes = engine.dispatch(request(), endpoints(&["app-a"])).await;

    let outcome = find(&outcomes, "app-a");
    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(transport.calls_to("app-a").len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_non_200_success_codes_are_failures() {
    let transport = Arc::new(ScriptedTransport::new().script("app-a", vec![Reply::Status(202, "")]));
    let engine = DispatchEngine::new(Arc::clone(&transport), DispatchOptions::default());

    let outcomes = engine.dispatch(request(), endpoints(&["app-a"])).await;

    assert_eq!(find(&outcomes, "app-a").status, OutcomeStatus::Failed);
    assert_eq!(transport.calls_to("app-a").len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_is_retried() {
    let transport = Arc::new(
        ScriptedTransport::new().script("app-a", vec![Reply::Error, Reply::Status(200, "")]),
    );
    let engine = DispatchEngine::new(Arc::clone(&transport), DispatchOptions::default());

    let outcomes = engine.dispatch(request(), endpoints(&["app-a"])).await;

    let outcome = find(&outcomes, "app-a");
    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    assert_eq!(outcome.attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_exhaust_attempts() {
    let transport = Arc::new(ScriptedTransport::new().script("app-a", vec![Reply::Error]));
    let engine = DispatchEngine::new(Arc::clone(&transport), DispatchOptions::default());

    let outcomes = engine.dispatch(request(), endpoints(&["app-a"])).await;

    let outcome = find(&outcomes, "app-a");
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(matches!(
        outcome.last.as_ref().unwrap().status,
        AttemptStatus::Transport { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_slow_targets_do_not_block_others() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .script("app-slow-1", vec![Reply::Delayed(Duration::from_secs(60), 200)])
            .script("app-slow-2", vec![Reply::Delayed(Duration::from_secs(60), 200)])
            .script("app-fast", vec![Reply::Status(200, "")]),
    );
    let engine = DispatchEngine::new(Arc::clone(&transport), DispatchOptions::default());

    let started = Instant::now();
    let outcomes = engine
        .dispatch(request(), endpoints(&["app-slow-1", "app-slow-2", "app-fast"]))
        .await;
    let elapsed = started.elapsed();

    // Outcomes arrive in completion order
    assert_eq!(outcomes[0].target, "app-fast");
    assert!(outcomes.iter().all(|o| o.status == OutcomeStatus::Succeeded));
    assert!(elapsed >= Duration::from_secs(60));
    assert!(elapsed < Duration::from_secs(120));
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_ceiling() {
    let names = ["app-1", "app-2", "app-3", "app-4", "app-5", "app-6"];
    let mut transport = ScriptedTransport::new();
    for name in names {
        transport = transport.script(name, vec![Reply::Delayed(Duration::from_secs(10), 200)]);
    }
    let transport = Arc::new(transport);
    let options = DispatchOptions {
        max_concurrency: 2,
        ..Default::default()
    };
    let engine = DispatchEngine::new(Arc::clone(&transport), options);

    let started = Instant::now();
    let outcomes = engine.dispatch(request(), endpoints(&names)).await;

    assert_eq!(outcomes.len(), 6);
    assert_eq!(transport.peak(), 2);
    assert!(started.elapsed() >= Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_panicking_target_still_gets_an_outcome() {
    let transport = Arc::new(ScriptedTransport::new().script("app-b", vec![Reply::Panic]));
    let engine = DispatchEngine::new(Arc::clone(&transport), DispatchOptions::default());

    let outcomes = engine
        .dispatch(request(), endpoints(&["app-a", "app-b", "app-c"]))
        .await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(find(&outcomes, "app-a").status, OutcomeStatus::Succeeded);
    assert_eq!(find(&outcomes, "app-c").status, OutcomeStatus::Succeeded);

    let crashed = find(&outcomes, "app-b");
    assert_eq!(crashed.status, OutcomeStatus::Failed);
    assert_eq!(
        crashed.detail.as_deref(),
        Some("dispatch task ended without an outcome")
    );
    let failed = outcomes.iter().filter(|o| !o.status.is_success()).count();
    assert_eq!(failed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeout() {
    let transport = Arc::new(ScriptedTransport::new().script("app-a", vec![Reply::Hang]));
    let options = DispatchOptions {
        attempt_timeout: Duration::from_secs(10),
        ..Default::default()
    };
    let engine = DispatchEngine::new(Arc::clone(&transport), options);

    let started = Instant::now();
    let outcomes = engine.dispatch(request(), endpoints(&["app-a"])).await;

    let outcome = find(&outcomes, "app-a");
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(
        outcome.last.as_ref().unwrap().status,
        AttemptStatus::TimedOut { after_secs: 10 }
    );
    // Three timeouts and two retry delays
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(40));
    assert!(elapsed < Duration::from_secs(41));
    assert_eq!(transport.peak(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_batch_deadline_marks_pending_targets() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .script("app-hung", vec![Reply::Hang])
            .script("app-flaky", vec![Reply::Status(503, "warming up"), Reply::Hang])
            .script("app-ok", vec![Reply::Status(200, "")]),
    );
    let options = DispatchOptions {
        batch_deadline: Duration::from_secs(30),
        ..Default::default()
    };
    let engine = DispatchEngine::new(Arc::clone(&transport), options);

    let outcomes = engine
        .dispatch(request(), endpoints(&["app-hung", "app-flaky", "app-ok"]))
        .await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(find(&outcomes, "app-ok").status, OutcomeStatus::Succeeded);

    let hung = find(&outcomes, "app-hung");
    assert_eq!(hung.status, OutcomeStatus::DeadlineExceeded);
    assert!(hung.last.is_none());

    let flaky = find(&outcomes, "app-flaky");
    assert_eq!(flaky.status, OutcomeStatus::DeadlineExceeded);
    assert_eq!(flaky.attempts, 1);
    assert_eq!(
        flaky.last.as_ref().unwrap().body.as_deref(),
        Some("warming up")
    );
}

#[tokio::test(start_paused = true)]
async fn test_batches_are_independent() {
    let transport = Arc::new(ScriptedTransport::new().script(
        "app-a",
        vec![
            Reply::Status(500, ""),
            Reply::Status(500, ""),
            Reply::Status(500, ""),
            Reply::Status(200, ""),
        ],
    ));
    let engine = DispatchEngine::new(Arc::clone(&transport), DispatchOptions::default());

    let first = engine.dispatch(request(), endpoints(&["app-a"])).await;
    let second = engine.dispatch(request(), endpoints(&["app-a"])).await;

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].status, OutcomeStatus::Failed);
    assert_eq!(first[0].attempts, 3);
    assert_eq!(second[0].status, OutcomeStatus::Succeeded);
    assert_eq!(second[0].attempts, 1);
    assert_eq!(transport.calls_to("app-a").len(), 4);
}

#[tokio::test]
async fn test_retry_delay_goes_through_sleep_fn() {
    let delays = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&delays);
    let sleep_fn = move |delay: Duration| {
        recorded.lock().unwrap().push(delay);
        std::future::ready(())
    };

    let transport = Arc::new(ScriptedTransport::new().script("app-a", vec![Reply::Status(500, "")]));
    let options = DispatchOptions {
        retry_delay: Duration::from_secs(7),
        ..Default::default()
    };
    let engine = DispatchEngine::with_sleep(transport, options, sleep_fn);

    let outcomes = engine.dispatch(request(), endpoints(&["app-a"])).await;

    assert_eq!(outcomes[0].attempts, 3);
    assert_eq!(
        *delays.lock().unwrap(),
        vec![Duration::from_secs(7), Duration::from_secs(7)]
    );
}
