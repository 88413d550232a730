//! Tests for upstream error classification.

use strum::IntoEnumIterator;
use turnstile_error::{ApiErrorKind, Classification, TurnstileErrorKind, UpstreamError};
use turnstile_retry::{classify, classify_error, classify_upstream};

fn classify_message(message: &str) -> Classification {
    classify(&UpstreamError::new(message))
}

#[test]
fn test_known_codes() {
    assert_eq!(
        classify_message("ANGX-0003 INVALID_SESSION_TOKEN"),
        Classification::SessionExpired
    );
    assert_eq!(
        classify_message("APINGException: TOO_MANY_REQUESTS"),
        Classification::RateLimited
    );
    assert_eq!(
        classify_message("APINGException: TOO_MUCH_DATA"),
        Classification::DataLimitExceeded
    );
    assert_eq!(classify_message("ACCOUNT THROTTLED"), Classification::Throttled);
    assert_eq!(
        classify_message("TEMPORARY_BAN_TOO_MANY_REQUESTS"),
        Classification::RateLimited
    );
}

#[test]
fn test_spaced_and_lowercase_forms() {
    assert_eq!(classify_message("session expired"), Classification::SessionExpired);
    assert_eq!(classify_message("Too many requests"), Classification::RateLimited);
    assert_eq!(
        classify_message("request has too much data"),
        Classification::DataLimitExceeded
    );
    assert_eq!(classify_message("temporary ban in place"), Classification::Throttled);
    assert_eq!(classify_message("throttled"), Classification::Throttled);
}

#[test]
fn test_precedence() {
    assert_eq!(
        classify_message("NO_SESSION: TOO_MANY_REQUESTS"),
        Classification::SessionExpired
    );
    assert_eq!(
        classify_message("TOO_MUCH_DATA and TOO_MANY_REQUESTS"),
        Classification::RateLimited
    );
    assert_eq!(
        classify_message("THROTTLED: TOO_MUCH_DATA"),
        Classification::DataLimitExceeded
    );
}

#[test]
fn test_unknown_is_unclassified() {
    assert_eq!(classify_message(""), Classification::Unclassified);
    assert_eq!(
        classify_message("MARKET_NOT_FOUND"),
        Classification::Unclassified
    );
    assert_eq!(
        classify_message("connection reset by peer"),
        Classification::Unclassified
    );
}

#[test]
fn test_deterministic() {
    for message in ["INVALID_SESSION_TOKEN", "TOO_MUCH_DATA", "weird", ""] {
        assert_eq!(classify_message(message), classify_message(message));
    }
}

#[test]
fn test_classified_error_reports_its_kind() {
    let samples = [
        "INVALID_SESSION_TOKEN",
        "TOO_MANY_REQUESTS",
        "TOO_MUCH_DATA",
        "TEMPORARY_BAN",
        "UNEXPECTED_ERROR",
    ];

    let classified: Vec<Classification> = samples
        .iter()
        .map(|m| classify_upstream(UpstreamError::new(*m)).classification())
        .collect();

    assert_eq!(classified, Classification::iter().collect::<Vec<_>>());
}

#[test]
fn test_classified_error_keeps_original_message() {
    let err = classify_upstream(UpstreamError::new("APINGException: TOO_MUCH_DATA"));
    match err.kind() {
        TurnstileErrorKind::Api(api) => {
            assert_eq!(
                api.kind(),
                &ApiErrorKind::DataLimitExceeded("APINGException: TOO_MUCH_DATA".into())
            );
        }
        other => panic!("expected api error, got {other}"),
    }
    assert!(err.to_string().contains("smaller chunks"));
}

#[test]
fn test_throttled_carries_guidance() {
    let err = classify_upstream(UpstreamError::new("TEMPORARY_BAN"));
    assert!(err.to_string().contains("back off"));
}

#[test]
fn test_classify_error_is_idempotent() {
    let once = classify_error(UpstreamError::new("TOO_MANY_REQUESTS").into());
    let twice = classify_error(once.clone());
    assert_eq!(once.classification(), Classification::RateLimited);
    assert_eq!(once.to_string(), twice.to_string());
}
