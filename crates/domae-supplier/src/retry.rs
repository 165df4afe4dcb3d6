//! Retry with exponential back-off and jitter for supplier API calls.
//!
//! [`retry_with_backoff`] wraps any fallible async operation and retries on
//! transient errors (network failures, 5xx, 429). Everything else — auth
//! rejections, envelope errors, malformed bodies — is returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::SupplierError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:**
/// - Network-level failures: timeout, connection reset.
/// - HTTP 5xx responses: transient server/infrastructure errors.
/// - [`SupplierError::RateLimited`] — the supplier asked us to back off.
///
/// **Not retriable (hard stop):**
/// - [`SupplierError::AuthRejected`] / [`SupplierError::MissingCredentials`]
///   — retrying with the same key cannot succeed.
/// - [`SupplierError::ApiError`] / [`SupplierError::NotFound`] — the request
///   itself is wrong.
/// - Parse failures — the body will not get better on a second read.
pub(crate) fn is_retriable(err: &SupplierError) -> bool {
    match err {
        SupplierError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        SupplierError::UnexpectedStatus { status, .. } => *status >= 500,
        SupplierError::RateLimited { .. } => true,
        _ => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors.
///
/// The wait before the n-th retry is `backoff_base_secs × 2^(n-1)` seconds
/// with ±25% jitter, capped at 60s. A 429's `Retry-After` value acts as a
/// floor on the computed delay so we never hammer a supplier that told us
/// how long to wait.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, SupplierError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SupplierError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let backoff_base_ms = backoff_base_secs.saturating_mul(1_000);
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let floor_ms = match &err {
                    SupplierError::RateLimited {
                        retry_after_secs, ..
                    } => retry_after_secs.saturating_mul(1_000).min(MAX_DELAY_MS),
                    _ => 0,
                };
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = ((capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64)
                    .max(floor_ms);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "supplier transient error — retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use domae_core::Supplier;

    use super::*;

    fn deserialize_err() -> SupplierError {
        let src = serde_json::from_str::<()>("invalid").unwrap_err();
        SupplierError::Deserialize {
            context: "test".to_owned(),
            source: src,
        }
    }

    #[test]
    fn rate_limited_is_retriable() {
        assert!(is_retriable(&SupplierError::RateLimited {
            supplier: Supplier::Domeme,
            retry_after_secs: 5,
        }));
    }

    #[test]
    fn server_errors_are_retriable_but_client_errors_are_not() {
        assert!(is_retriable(&SupplierError::UnexpectedStatus {
            status: 503,
            url: "https://x".to_owned(),
        }));
        assert!(!is_retriable(&SupplierError::UnexpectedStatus {
            status: 400,
            url: "https://x".to_owned(),
        }));
    }

    #[test]
    fn auth_rejected_is_not_retriable() {
        assert!(!is_retriable(&SupplierError::AuthRejected {
            url: "https://x".to_owned()
        }));
    }

    #[test]
    fn api_error_is_not_retriable() {
        assert!(!is_retriable(&SupplierError::ApiError("bad".to_owned())));
    }

    #[test]
    fn deserialize_error_is_not_retriable() {
        assert!(!is_retriable(&deserialize_err()));
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, SupplierError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_retry_invalid_items() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(SupplierError::InvalidItem {
                    supplier_product_id: "X-1".to_owned(),
                    reason: "missing name".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(SupplierError::InvalidItem { .. })));
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    // Simulate a retriable connect error.
                    let err = reqwest::Client::new()
                        .get("http://0.0.0.0:1")
                        .send()
                        .await
                        .unwrap_err();
                    Err::<u32, _>(SupplierError::Http(err))
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99, "should succeed after retries");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(1, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(SupplierError::RateLimited {
                    supplier: Supplier::Gentrade,
                    retry_after_secs: 0,
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2, "initial try + 1 retry");
        assert!(matches!(result, Err(SupplierError::RateLimited { .. })));
    }
}
