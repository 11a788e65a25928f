//! Report rendering tests

use chrono::Utc;
use kudufleet::models::deployment::{AttemptResult, AttemptStatus, Outcome};
use kudufleet::report::text::TextReport;
use kudufleet::report::{GroupReport, ReportSink};

fn attempt(attempt: u32, code: u16, body: Option<&str>) -> AttemptResult {
    AttemptResult {
        attempt,
        status: AttemptStatus::Http { code },
        body: body.map(str::to_string),
    }
}

fn render(reports: &[GroupReport]) -> String {
    let mut sink = TextReport::new(Vec::new(), false);
    for report in reports {
        sink.render_group(report);
    }
    String::from_utf8(sink.into_inner()).unwrap()
}

#[test]
fn test_group_lines_sorted_with_summary() {
    let mut report = GroupReport::new(1, 2, "rg-a");
    report.outcomes = vec![
        Outcome::completed("app-b".to_string(), attempt(1, 200, Some(" queued")), Utc::now()),
        Outcome::completed("app-a".to_string(), attempt(3, 500, Some("boom")), Utc::now()),
        Outcome::resolution_failed("app-c".to_string(), "no endpoint returned"),
    ];

    assert_eq!(
        render(&[report]),
        "Resource group 1/2: rg-a\n\
         app-a:500 Internal Server Errorboom\n\
         app-b:200 OK queued\n\
         app-c:resolution failed: no endpoint returned\n\
         1 succeeded, 2 failed\n\
         \n"
    );
}

#[test]
fn test_retried_success_and_deadline() {
    let mut report = GroupReport::new(1, 1, "rg-a");
    report.outcomes = vec![
        Outcome::completed("app-a".to_string(), attempt(2, 200, None), Utc::now()),
        Outcome::deadline_exceeded("app-b".to_string(), Some(attempt(1, 503, None)), Utc::now()),
        Outcome::deadline_exceeded("app-c".to_string(), None, Utc::now()),
    ];

    let text = render(&[report]);
    assert!(text.contains("app-a:200 OK\n"));
    assert!(text.contains("app-b:deadline exceeded after 1 attempts (last: 503 Service Unavailable)\n"));
    assert!(text.contains("app-c:deadline exceeded before any attempt\n"));
    assert!(text.contains("1 succeeded, 2 failed\n"));
}

#[test]
fn test_status_is_the_last_response_and_body_is_verbatim() {
    let mut report = GroupReport::new(1, 1, "rg-a");
    report.outcomes = vec![
        Outcome::completed("app-a".to_string(), attempt(3, 409, Some(" busy ")), Utc::now()),
        Outcome::completed("app-b".to_string(), attempt(2, 200, Some("")), Utc::now()),
        Outcome::aborted(
            "app-c".to_string(),
            Some(attempt(1, 500, Some("ignored"))),
            Utc::now(),
            "dispatch task ended without an outcome",
        ),
    ];

    assert_eq!(
        render(&[report]),
        "Resource group 1/1: rg-a\n\
         app-a:409 Conflict busy \n\
         app-b:200 OK\n\
         app-c:500 Internal Server Error (dispatch task ended without an outcome)\n\
         1 succeeded, 2 failed\n\
         \n"
    );
}

#[test]
fn test_listing_failure_line() {
    let mut report = GroupReport::new(2, 2, "rg-b");
    report.listing_error = Some("Directory error: listing refused".to_string());

    assert_eq!(
        render(&[report]),
        "Resource group 2/2: rg-b\nrg-b:resolution failed: Directory error: listing refused\n\n"
    );
}

#[test]
fn test_empty_group() {
    let report = GroupReport::new(1, 1, "rg-empty");
    assert_eq!(
        render(&[report]),
        "Resource group 1/1: rg-empty\n0 succeeded, 0 failed\n\n"
    );
}

#[test]
fn test_color_only_when_enabled() {
    colored::control::set_override(true);
    let mut report = GroupReport::new(1, 1, "rg-a");
    report.outcomes = vec![Outcome::completed(
        "app-a".to_string(),
        attempt(1, 200, None),
        Utc::now(),
    )];

    let mut sink = TextReport::new(Vec::new(), true);
    sink.render_group(&report);
    let colored_text = String::from_utf8(sink.into_inner()).unwrap();
    assert!(colored_text.contains("\u{1b}["));

    assert!(!render(&[report]).contains("\u{1b}["));
}
