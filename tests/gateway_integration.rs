//! Integration tests for the upstream gateway.
//!
//! These tests drive the full logical-call path (proactive waits, the
//! per-credential slot, 429 retries) over a scripted transport.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use common::MockTransport;
use warden::WardenError;

#[tokio::test]
async fn test_one_request_in_flight_per_credential() {
    let transport = Arc::new(MockTransport::new().with_hold(Duration::from_millis(20)));
    let gateway = common::gateway_with(transport.clone());

    let mut handles = Vec::new();
    for _ in 0..5 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(
            async move { gateway.get_players("key-a").await },
        ));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(transport.call_count("/server/players"), 5);
    assert_eq!(transport.max_in_flight(), 1);
}

#[tokio::test]
async fn test_credentials_do_not_block_each_other() {
    let transport = Arc::new(MockTransport::new().with_hold(Duration::from_millis(50)));
    let gateway = common::gateway_with(transport.clone());

    let first = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.get_players("key-a").await })
    };
    let second = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.get_players("key-b").await })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(transport.max_in_flight(), 2);
}

#[tokio::test]
async fn test_429_retries_then_succeeds() {
    tokio::time::pause();
    let transport = Arc::new(MockTransport::new());
    transport.script("/server/players", Ok(common::too_many_requests(5)));
    transport.script("/server/players", Ok(common::too_many_requests(5)));
    transport.script(
        "/server/players",
        Ok(common::ok(&common::players_body(&[("JaneDoe", 555)]))),
    );
    let gateway = common::gateway_with(transport.clone());

    let started = Instant::now();
    let players = gateway.get_players("key-a").await.unwrap();

    assert_eq!(players.len(), 1);
    assert_eq!(transport.call_count("/server/players"), 3);
    // Each retry honors the advertised five second cooldown
    assert!(started.elapsed() >= Duration::from_secs(10));
}

#[tokio::test]
async fn test_429_attempts_are_bounded() {
    tokio::time::pause();
    let transport = Arc::new(MockTransport::new());
    for _ in 0..3 {
        transport.script("/server/players", Ok(common::too_many_requests(1)));
    }
    let gateway = common::gateway_with(transport.clone());

    let result = gateway.get_players("key-a").await;

    assert!(matches!(result, Err(WardenError::RateLimited(3))));
    assert_eq!(transport.call_count("/server/players"), 3);
}

#[tokio::test]
async fn test_same_credential_retries_stay_serialized() {
    tokio::time::pause();
    let transport = Arc::new(MockTransport::new().with_hold(Duration::from_millis(50)));
    transport.script("/server/players", Ok(common::too_many_requests(1)));
    let gateway = common::gateway_with(transport.clone());

    let first = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.get_players("key-a").await })
    };
    let second = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.get_players("key-a").await })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    // Three physical calls (one retry), never overlapping
    assert_eq!(transport.call_count("/server/players"), 3);
    assert_eq!(transport.max_in_flight(), 1);
}

#[tokio::test]
async fn test_403_means_invalid_credential() {
    let transport = Arc::new(MockTransport::new());
    transport.script("/server/players", Ok(common::status_only(403)));
    let gateway = common::gateway_with(transport.clone());

    let result = gateway.get_players("bad-key").await;

    assert!(matches!(result, Err(WardenError::InvalidCredential)));
    // 403 is not retried
    assert_eq!(transport.call_count("/server/players"), 1);
}

#[tokio::test]
async fn test_other_upstream_errors_pass_through() {
    let transport = Arc::new(MockTransport::new());
    transport.script("/server/players", Ok(common::status_only(502)));
    let gateway = common::gateway_with(transport.clone());

    let result = gateway.get_players("key-a").await;

    assert!(matches!(result, Err(WardenError::Upstream(502))));
}

#[tokio::test]
async fn test_transport_errors_are_not_retried() {
    let transport = Arc::new(MockTransport::new());
    transport.script("/server/players", Err(WardenError::Timeout(8)));
    let gateway = common::gateway_with(transport.clone());

    let result = gateway.get_players("key-a").await;

    assert!(matches!(result, Err(WardenError::Timeout(8))));
    assert_eq!(transport.call_count("/server/players"), 1);
}

#[tokio::test]
async fn test_exhausted_budget_waits_for_reset() {
    tokio::time::pause();
    let transport = Arc::new(MockTransport::new());
    let reset = warden::datetime::now_ms() / 1000 + 2;
    transport.script("/server/players", Ok(common::ok_with_rate("[]", 0, reset)));
    let gateway = common::gateway_with(transport.clone());

    // First call consumes the exhausted-budget headers.
    gateway.get_players("key-a").await.unwrap();

    let started = Instant::now();
    gateway.get_players("key-a").await.unwrap();

    // The second call slept out the advertised window before its attempt.
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(transport.call_count("/server/players"), 2);
}

#[tokio::test]
async fn test_empty_body_is_empty_success() {
    let transport = Arc::new(MockTransport::new());
    transport.script("/server/command", Ok(common::ok("")));
    let gateway = common::gateway_with(transport.clone());

    gateway
        .execute_command("key-a", ":pm JaneDoe hello")
        .await
        .unwrap();

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    let body = calls[0].body.as_ref().unwrap();
    assert_eq!(body["command"], ":pm JaneDoe hello");
}
