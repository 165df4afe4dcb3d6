//! Shared HTTP plumbing for the supplier clients: client construction,
//! base-URL normalization, and status-code mapping.

use std::time::Duration;

use domae_core::Supplier;
use reqwest::{header, Client, Response, StatusCode, Url};

use crate::error::SupplierError;

/// Builds the `reqwest` client all adapters share the settings for.
///
/// # Errors
///
/// Returns [`SupplierError::Http`] if the underlying `reqwest::Client`
/// cannot be constructed (e.g., invalid TLS config).
pub(crate) fn build_client(timeout_secs: u64, user_agent: &str) -> Result<Client, SupplierError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}

/// Normalizes a base URL so it ends with exactly one slash. `Url::join`
/// on a slash-terminated base appends path segments instead of replacing
/// the final one.
pub(crate) fn normalize_base_url(raw: &str) -> Result<Url, SupplierError> {
    let normalized = format!("{}/", raw.trim_end_matches('/'));
    Url::parse(&normalized).map_err(|e| SupplierError::InvalidBaseUrl {
        url: raw.to_owned(),
        reason: e.to_string(),
    })
}

/// Maps non-2xx responses to typed errors and passes 2xx through.
///
/// 429 surfaces as [`SupplierError::RateLimited`] honoring `Retry-After`
/// (default 60s), 404 as [`SupplierError::NotFound`], 401/403 as
/// [`SupplierError::AuthRejected`], anything else non-2xx as
/// [`SupplierError::UnexpectedStatus`].
pub(crate) fn check_status(
    supplier: Supplier,
    response: Response,
) -> Result<Response, SupplierError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(SupplierError::RateLimited {
            supplier,
            retry_after_secs,
        });
    }

    if status == StatusCode::NOT_FOUND {
        return Err(SupplierError::NotFound {
            url: display_url(response.url()),
        });
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SupplierError::AuthRejected {
            url: display_url(response.url()),
        });
    }

    if !status.is_success() {
        return Err(SupplierError::UnexpectedStatus {
            status: status.as_u16(),
            url: display_url(response.url()),
        });
    }

    Ok(response)
}

/// Origin + path form of a URL for error messages. The query string is
/// dropped because two of the three suppliers carry the API key there.
pub(crate) fn display_url(url: &Url) -> String {
    format!("{}{}", url.origin().ascii_serialization(), url.path())
}
