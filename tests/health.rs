// ABOUTME: Integration tests for the health verification engine.
// ABOUTME: Polling, terminal-failure short-circuits, and concurrent collection.

mod support;

use caravel::health::{HealthError, HealthVerifier};
use std::time::Duration;
use support::{FakeChecker, fast_verifier, unit};

#[tokio::test]
async fn check_one_healthy_without_endpoint() {
    let checker = FakeChecker::new().script("db", &["running"]);
    let verifier = fast_verifier();

    let result = verifier.check_one(&checker, &unit("db")).await;
    assert!(result.healthy);
    assert_eq!(result.status, "running");
    assert!(result.endpoint.is_none());
}

#[tokio::test]
async fn check_one_folds_probe_errors_into_result() {
    let checker = FakeChecker::new().erroring("ghost");
    let verifier = fast_verifier();

    let result = verifier.check_one(&checker, &unit("ghost")).await;
    assert!(!result.healthy);
    assert_eq!(result.status, "unknown");
    assert!(result.message.contains("status probe failed"));
}

#[tokio::test]
async fn check_one_terminal_state_skips_http() {
    // The endpoint is unroutable; reaching for it would error loudly, but a
    // terminal status must short-circuit before any HTTP.
    let checker = FakeChecker::new()
        .script("api", &["failed"])
        .with_endpoint("api", "http://192.0.2.1:9/health");
    let verifier = fast_verifier();

    let result = verifier.check_one(&checker, &unit("api")).await;
    assert!(!result.healthy);
    assert_eq!(result.status, "failed");
    assert!(result.endpoint.is_none());
}

#[tokio::test]
async fn wait_returns_promptly_once_healthy() {
    // Flips to healthy on the third poll.
    let checker = FakeChecker::new().script("api", &["starting", "starting", "running"]);
    let verifier = fast_verifier();

    let result = verifier
        .wait_until_healthy(&checker, &unit("api"), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(result.healthy);
    assert_eq!(checker.poll_count(), 3);
}

#[tokio::test]
async fn wait_times_out_when_never_healthy() {
    let checker = FakeChecker::new().script("api", &["starting"]);
    let verifier = fast_verifier();

    let result = verifier
        .wait_until_healthy(&checker, &unit("api"), Duration::from_millis(50))
        .await;

    match result {
        Err(HealthError::Timeout { unit: u, .. }) => assert_eq!(u.as_str(), "api"),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn wait_fails_immediately_on_terminal_status() {
    // A declared failure must not be retried for the whole budget.
    let checker = FakeChecker::new().script("api", &["failed"]);
    let verifier = fast_verifier();

    let started = std::time::Instant::now();
    let result = verifier
        .wait_until_healthy(&checker, &unit("api"), Duration::from_secs(30))
        .await;

    match result {
        Err(HealthError::Failed { unit: u, status, .. }) => {
            assert_eq!(u.as_str(), "api");
            assert_eq!(status, "failed");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(checker.poll_count(), 1);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn check_many_collects_all_despite_one_erroring() {
    let checker = FakeChecker::new()
        .script("db", &["running"])
        .script("cache", &["running"])
        .erroring("broken");
    let verifier = fast_verifier();

    let units = [unit("db"), unit("cache"), unit("broken")];
    let results = verifier.check_many(&checker, &units).await;

    assert_eq!(results.len(), 3);
    assert!(results[&unit("db")].healthy);
    assert!(results[&unit("cache")].healthy);
    assert!(!results[&unit("broken")].healthy);
}

#[tokio::test]
async fn wait_many_succeeds_when_all_healthy() {
    let checker = FakeChecker::new()
        .script("db", &["running"])
        .script("api", &["starting", "running"]);
    let verifier = fast_verifier();

    let units = [unit("db"), unit("api")];
    let results = verifier
        .wait_many_until_healthy(&checker, &units, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.values().all(|r| r.healthy));
}

#[tokio::test]
async fn wait_many_fails_fast_on_terminal_unit() {
    let checker = FakeChecker::new()
        .script("db", &["running"])
        .script("api", &["failed"]);
    let verifier = fast_verifier();

    let units = [unit("db"), unit("api")];
    let result = verifier
        .wait_many_until_healthy(&checker, &units, Duration::from_secs(30))
        .await;

    match result {
        Err(HealthError::Failed { unit: u, .. }) => assert_eq!(u.as_str(), "api"),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn summary_reflects_mixed_results() {
    let checker = FakeChecker::new()
        .script("db", &["running"])
        .script("api", &["unhealthy"]);
    let verifier = fast_verifier();

    let units = [unit("db"), unit("api")];
    let results = verifier.check_many(&checker, &units).await;
    let summary = HealthVerifier::summarize(&results);

    assert_eq!(summary.healthy, 1);
    assert_eq!(summary.unhealthy, 1);
    assert_eq!(summary.issues.len(), 1);
    assert!(summary.issues[0].contains("api"));
}
