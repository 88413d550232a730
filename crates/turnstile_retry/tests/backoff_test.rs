//! Tests for rate-limit backoff.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use turnstile_error::{
    Classification, RetryErrorKind, TurnstileError, TurnstileErrorKind, UpstreamError,
};
use turnstile_retry::{OperationContext, RetryConfig, backoff_schedule, with_backoff};

fn rate_limited() -> TurnstileError {
    UpstreamError::new("APINGException: TOO_MANY_REQUESTS").into()
}

#[test]
fn test_schedule_doubles_and_caps() {
    let config = RetryConfig {
        max_attempts: 7,
        ..RetryConfig::default()
    };
    let waits: Vec<Duration> = backoff_schedule(&config).collect();
    assert_eq!(waits, [1, 2, 4, 8, 10, 10].map(Duration::from_secs));
}

#[test]
fn test_schedule_length() {
    assert_eq!(backoff_schedule(&RetryConfig::default()).count(), 2);
    let single = RetryConfig {
        max_attempts: 1,
        ..RetryConfig::default()
    };
    assert_eq!(backoff_schedule(&single).count(), 0);
}

#[test]
fn test_config_validation() {
    assert!(RetryConfig::default().validate().is_ok());
    let zero = RetryConfig {
        max_attempts: 0,
        ..RetryConfig::default()
    };
    assert!(zero.validate().unwrap_err().is_config());
    let inverted = RetryConfig {
        initial_backoff_ms: 20_000,
        ..RetryConfig::default()
    };
    assert!(inverted.validate().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_two_rate_limits() {
    let calls = AtomicUsize::new(0);
    let context = OperationContext::new("listMarketBook");

    let result = with_backoff(&RetryConfig::default(), &context, || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 2 {
                Err(rate_limited())
            } else {
                Ok("book")
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), "book");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_rate_limit_exhausts_attempts() {
    let stamps = Mutex::new(Vec::new());
    let context = OperationContext::new("listMarketCatalogue").with_resources(&["1.1", "1.2"]);

    let result: Result<(), _> = with_backoff(&RetryConfig::default(), &context, || {
        stamps.lock().unwrap().push(Instant::now());
        async { Err(rate_limited()) }
    })
    .await;

    let stamps = stamps.into_inner().unwrap();
    assert_eq!(stamps.len(), 3);
    let gaps: Vec<Duration> = stamps.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(gaps[0] >= Duration::from_secs(1) && gaps[0] < Duration::from_millis(1_100));
    assert!(gaps[1] >= Duration::from_secs(2) && gaps[1] < Duration::from_millis(2_100));

    let err = result.unwrap_err();
    match err.kind() {
        TurnstileErrorKind::Retry(retry) => match retry.kind() {
            RetryErrorKind::Exhausted {
                operation,
                attempts,
                ..
            } => {
                assert_eq!(operation, "listMarketCatalogue");
                assert_eq!(*attempts, 3);
            }
            other => panic!("unexpected retry error: {other}"),
        },
        other => panic!("expected retry error, got {other}"),
    }
    assert_eq!(err.classification(), Classification::RateLimited);
    assert!(err.to_string().contains("listMarketCatalogue failed after 3 attempts"));
}

#[tokio::test(start_paused = true)]
async fn test_waits_follow_configured_schedule() {
    let stamps = Mutex::new(Vec::new());
    let config = RetryConfig {
        max_attempts: 5,
        initial_backoff_ms: 3_000,
        max_backoff_ms: 5_000,
    };

    let _ = with_backoff(&config, &OperationContext::new("listEvents"), || {
        stamps.lock().unwrap().push(Instant::now());
        async { Err::<(), _>(rate_limited()) }
    })
    .await;

    let stamps = stamps.into_inner().unwrap();
    let gaps: Vec<u64> = stamps
        .windows(2)
        .map(|w| (w[1] - w[0]).as_secs())
        .collect();
    assert_eq!(gaps, vec![3, 5, 5, 5]);
}

#[tokio::test(start_paused = true)]
async fn test_other_errors_abort_immediately() {
    for message in [
        "INVALID_SESSION_TOKEN",
        "TOO_MUCH_DATA",
        "TEMPORARY_BAN",
        "MARKET_NOT_FOUND",
    ] {
        let calls = AtomicUsize::new(0);
        let start = Instant::now();

        let result: Result<(), _> =
            with_backoff(&RetryConfig::default(), &OperationContext::new("op"), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(UpstreamError::new(message).into()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1, "{message}");
        assert_eq!(start.elapsed(), Duration::ZERO, "{message}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_unclassified_error_passes_through() {
    let result: Result<(), _> =
        with_backoff(&RetryConfig::default(), &OperationContext::new("op"), || async {
            Err(UpstreamError::new("MARKET_NOT_FOUND").into())
        })
        .await;

    match result.unwrap_err().kind() {
        TurnstileErrorKind::Upstream(e) => assert_eq!(e.message, "MARKET_NOT_FOUND"),
        other => panic!("expected upstream error, got {other}"),
    }
}
