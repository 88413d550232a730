//! Tests for the session lifecycle manager.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinSet;
use turnstile_error::{SessionErrorKind, TurnstileErrorKind};
use turnstile_session::{Credentials, LoginGate, SessionManager, SessionState};
use turnstile_session::testing::MockExchangeClient;

fn manager(client: &Arc<MockExchangeClient>) -> SessionManager {
    SessionManager::new(
        client.clone(),
        Credentials::new("punter", "hunter2", "app-key"),
    )
}

#[tokio::test]
async fn test_starts_uninitialized() {
    let client = Arc::new(MockExchangeClient::new());
    let session = manager(&client);

    assert_eq!(session.state().await, SessionState::Uninitialized);
    assert!(!session.is_active().await);
    assert_eq!(client.login_calls(), 0);
}

#[tokio::test]
async fn test_ensure_active_logs_in_once() {
    let client = Arc::new(MockExchangeClient::new());
    let session = manager(&client);

    session.ensure_active().await.unwrap();
    session.ensure_active().await.unwrap();

    assert!(session.is_active().await);
    assert_eq!(client.login_calls(), 1);
}

#[tokio::test]
async fn test_concurrent_ensure_active_logs_in_once() {
    let client = Arc::new(MockExchangeClient::new().with_login_delay(Duration::from_millis(50)));
    let session = Arc::new(manager(&client));

    let mut tasks = JoinSet::new();
    for _ in 0..16 {
        let session = Arc::clone(&session);
        tasks.spawn(async move { session.ensure_active().await });
    }

    let mut successes = 0;
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
        successes += 1;
    }

    assert_eq!(successes, 16);
    assert_eq!(client.login_calls(), 1);
    assert!(session.is_active().await);
}

#[tokio::test]
async fn test_concurrent_callers_share_login_failure() {
    let client = Arc::new(
        MockExchangeClient::new()
            .with_login_delay(Duration::from_millis(50))
            .with_failing_login("INVALID_USERNAME_OR_PASSWORD"),
    );
    let session = Arc::new(manager(&client));

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let session = Arc::clone(&session);
        tasks.spawn(async move { session.ensure_active().await });
    }

    let mut messages = Vec::new();
    while let Some(result) = tasks.join_next().await {
        let err = result.unwrap().unwrap_err();
        match err.kind() {
            TurnstileErrorKind::Session(e) => {
                assert!(matches!(e.kind(), SessionErrorKind::LoginFailed(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        messages.push(err.to_string());
    }

    assert_eq!(messages.len(), 8);
    assert!(messages.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(client.login_calls(), 1);
    assert!(!session.is_active().await);

    // A caller arriving after the failure tries again.
    assert!(session.ensure_active().await.is_err());
    assert_eq!(client.login_calls(), 2);
}

#[tokio::test]
async fn test_login_recovers_after_single_failure() {
    let client = Arc::new(MockExchangeClient::new());
    client.fail_next_login("TEMPORARY_BAN_TOO_MANY_REQUESTS");
    let session = manager(&client);

    assert!(session.ensure_active().await.is_err());
    assert_eq!(session.state().await, SessionState::Uninitialized);

    session.ensure_active().await.unwrap();
    assert!(session.is_active().await);
    assert_eq!(client.login_calls(), 2);
    assert_eq!(session.login_count(), 2);
}

#[tokio::test]
async fn test_keep_alive_requires_active_session() {
    let client = Arc::new(MockExchangeClient::new());
    let session = manager(&client);

    assert!(!session.keep_alive().await);
    assert_eq!(client.keep_alive_calls(), 0);
}

#[tokio::test]
async fn test_failed_keep_alive_marks_inactive() {
    let client = Arc::new(MockExchangeClient::new());
    let session = manager(&client);
    session.ensure_active().await.unwrap();

    assert!(session.keep_alive().await);

    client.fail_next_keep_alive("NO_SESSION");
    assert!(!session.keep_alive().await);
    assert_eq!(session.state().await, SessionState::Inactive);

    session.ensure_active().await.unwrap();
    assert_eq!(client.login_calls(), 2);
    assert_eq!(client.keep_alive_calls(), 2);
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let client = Arc::new(MockExchangeClient::new());
    let session = manager(&client);

    session.logout().await;
    assert_eq!(client.logout_calls(), 0);

    session.ensure_active().await.unwrap();
    session.logout().await;
    session.logout().await;

    assert_eq!(client.logout_calls(), 1);
    assert_eq!(session.state().await, SessionState::Inactive);
}

#[tokio::test]
async fn test_failed_logout_still_marks_inactive() {
    let client = Arc::new(MockExchangeClient::new());
    let session = manager(&client);
    session.ensure_active().await.unwrap();

    client.fail_next_logout("SERVICE_BUSY");
    session.logout().await;

    assert_eq!(client.logout_calls(), 1);
    assert!(!session.is_active().await);
}

#[test]
fn test_credentials_debug_redacts_password() {
    let credentials = Credentials::new("punter", "hunter2", "app-key");
    let rendered = format!("{:?}", credentials);
    assert!(rendered.contains("punter"));
    assert!(!rendered.contains("hunter2"));
}

#[tokio::test]
async fn test_session_handle_is_the_client() {
    let client = Arc::new(MockExchangeClient::new());
    let session = manager(&client);

    let handle = session.session_handle();
    handle.query("listEventTypes", serde_json::json!({})).await.unwrap();
    assert_eq!(client.query_calls(), 1);
}

#[derive(Debug, Default)]
struct CountingGate {
    admitted: AtomicUsize,
}

#[async_trait]
impl LoginGate for CountingGate {
    async fn admit_login(&self) {
        self.admitted.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_refresh_replaces_stale_session() {
    let client = Arc::new(MockExchangeClient::new());
    let session = manager(&client);
    let stale = session.active_generation().await.unwrap();

    let fresh = session.refresh(stale).await.unwrap();

    assert!(fresh > stale);
    assert!(session.is_active().await);
    assert_eq!(client.logout_calls(), 1);
    assert_eq!(client.login_calls(), 2);
}

#[tokio::test]
async fn test_refresh_of_replaced_session_is_shared() {
    let client = Arc::new(MockExchangeClient::new());
    let session = manager(&client);
    let stale = session.active_generation().await.unwrap();

    let first = session.refresh(stale).await.unwrap();
    let second = session.refresh(stale).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(client.logout_calls(), 1);
    assert_eq!(client.login_calls(), 2);
}

#[tokio::test]
async fn test_concurrent_refreshes_replace_session_once() {
    let client = Arc::new(MockExchangeClient::new().with_login_delay(Duration::from_millis(20)));
    let session = Arc::new(manager(&client));
    let stale = session.active_generation().await.unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let session = Arc::clone(&session);
        tasks.spawn(async move { session.refresh(stale).await });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    assert_eq!(client.logout_calls(), 1);
    assert_eq!(client.login_calls(), 2);
    assert_eq!(session.generation(), stale + 1);
}

#[tokio::test]
async fn test_refresh_after_failed_replacement_shares_error() {
    let client = Arc::new(MockExchangeClient::new());
    let session = manager(&client);
    let stale = session.active_generation().await.unwrap();
    client.fail_next_login("INVALID_USERNAME_OR_PASSWORD");

    assert!(session.refresh(stale).await.is_err());
    let err = session.refresh(stale).await.unwrap_err();

    assert!(matches!(err.kind(), TurnstileErrorKind::Session(_)));
    assert_eq!(client.login_calls(), 2);
    assert_eq!(client.logout_calls(), 1);
}

#[tokio::test]
async fn test_every_login_passes_the_gate() {
    let client = Arc::new(MockExchangeClient::new());
    let gate = Arc::new(CountingGate::default());
    let session = manager(&client).with_login_gate(gate.clone());

    let stale = session.active_generation().await.unwrap();
    session.ensure_active().await.unwrap();
    session.refresh(stale).await.unwrap();
    session.logout().await;
    session.ensure_active().await.unwrap();

    assert_eq!(client.login_calls(), 3);
    assert_eq!(gate.admitted.load(Ordering::SeqCst), 3);
}
