// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Assertions
//!
//! Assertions on consumer status codes, stored values and eventually
//! consistent state.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use uagate_core::error::ServiceError;
use uagate_core::status::StatusCode;
use uagate_core::types::Value;

/// Default tolerance for float comparisons.
pub const FLOAT_TOLERANCE: f64 = 1e-6;

/// Asserts that a service call failed with `expected`.
#[track_caller]
pub fn assert_status<T: Debug>(result: Result<T, ServiceError>, expected: StatusCode) {
    match result {
        Ok(value) => panic!("expected {}, got Ok({:?})", expected, value),
        Err(e) => assert_eq!(
            e.status_code(),
            expected,
            "expected {}, got {} ({})",
            expected,
            e.status_code(),
            e
        ),
    }
}

/// Asserts that a value is a float close to `expected`.
#[track_caller]
pub fn assert_float(value: &Value, expected: f64) {
    let actual = value
        .as_f64()
        .unwrap_or_else(|| panic!("expected a float, got {:?}", value));
    assert!(
        (actual - expected).abs() < FLOAT_TOLERANCE,
        "expected {}, got {}",
        expected,
        actual
    );
}

/// Polls `check` every 50 ms until it returns `true` or `timeout` elapses.
///
/// Returns whether the condition was met.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Like [`eventually`], panicking with `what` on timeout.
pub async fn assert_eventually<F, Fut>(timeout: Duration, what: &str, check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    assert!(eventually(timeout, check).await, "timed out waiting for {}", what);
}

#[cfg(test)]
mod tests {
    use super::*;
    use uagate_core::error::{GatewayError, RegistryError};

    #[test]
    fn test_assert_status_matches() {
        let result: Result<(), ServiceError> = Err(ServiceError::invalid_argument("description"));
        assert_status(result, StatusCode::BadInvalidArgument);

        let result: Result<(), ServiceError> = Err(ServiceError::Gateway(GatewayError::from(
            RegistryError::asset_not_found("x"),
        )));
        assert_status(result, StatusCode::BadNotFound);
    }

    #[test]
    #[should_panic(expected = "expected")]
    fn test_assert_status_rejects_ok() {
        assert_status(Ok::<u8, ServiceError>(1), StatusCode::BadNotFound);
    }

    #[test]
    fn test_assert_float() {
        assert_float(&Value::Float32(12.5), 12.5);
        assert_float(&Value::Float64(0.1 + 0.2), 0.3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventually() {
        let start = tokio::time::Instant::now();
        assert!(eventually(Duration::from_secs(1), || async { true }).await);
        assert!(!eventually(Duration::from_millis(200), || async { false }).await);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
