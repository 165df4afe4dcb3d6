//! Environment-driven configuration loading.
//!
//! All knobs are read through a lookup closure so tests can drive the
//! builder with a plain `HashMap` instead of mutating process state.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load configuration from a `.env` file (if present) and the process
/// environment.
///
/// # Errors
///
/// Returns [`ConfigError`] if a required variable is missing or a value
/// fails to parse.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load configuration from the process environment only.
///
/// # Errors
///
/// Returns [`ConfigError`] if a required variable is missing or a value
/// fails to parse.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(&|key| std::env::var(key).ok())
}

fn build_app_config(
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<AppConfig, ConfigError> {
    let database_url = required(lookup, "DATABASE_URL")?;
    let env = parse_environment(lookup("DOMAE_ENVIRONMENT").as_deref())?;
    let log_level = lookup("DOMAE_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
    let http_addr = parse_value::<SocketAddr>(lookup, "DOMAE_HTTP_ADDR", "127.0.0.1:8080")?;
    let category_table_path = PathBuf::from(
        lookup("DOMAE_CATEGORY_TABLE_PATH")
            .unwrap_or_else(|| "config/categories.yaml".to_string()),
    );

    Ok(AppConfig {
        database_url,
        env,
        http_addr,
        log_level,
        category_table_path,
        ownerclan_api_key: non_empty(lookup("DOMAE_OWNERCLAN_API_KEY")),
        domeme_api_key: non_empty(lookup("DOMAE_DOMEME_API_KEY")),
        gentrade_api_key: non_empty(lookup("DOMAE_GENTRADE_API_KEY")),
        ownerclan_base_url: non_empty(lookup("DOMAE_OWNERCLAN_BASE_URL")),
        domeme_base_url: non_empty(lookup("DOMAE_DOMEME_BASE_URL")),
        gentrade_base_url: non_empty(lookup("DOMAE_GENTRADE_BASE_URL")),
        db_max_connections: parse_value(lookup, "DATABASE_MAX_CONNECTIONS", "10")?,
        db_min_connections: parse_value(lookup, "DATABASE_MIN_CONNECTIONS", "2")?,
        db_acquire_timeout_secs: parse_value(lookup, "DATABASE_ACQUIRE_TIMEOUT_SECS", "30")?,
        http_timeout_secs: parse_value(lookup, "DOMAE_HTTP_TIMEOUT_SECS", "30")?,
        user_agent: lookup("DOMAE_USER_AGENT")
            .unwrap_or_else(|| "domae/0.1 (wholesale catalog sync)".to_string()),
        max_retries: parse_value(lookup, "DOMAE_MAX_RETRIES", "3")?,
        backoff_base_secs: parse_value(lookup, "DOMAE_BACKOFF_BASE_SECS", "2")?,
        inter_request_delay_ms: parse_value(lookup, "DOMAE_INTER_REQUEST_DELAY_MS", "250")?,
        refresh_after_hours: parse_value(lookup, "DOMAE_REFRESH_AFTER_HOURS", "24")?,
        retention_days: parse_value(lookup, "DOMAE_RETENTION_DAYS", "30")?,
        priority_check_secs: parse_value(lookup, "DOMAE_PRIORITY_CHECK_SECS", "60")?,
        regular_check_secs: parse_value(lookup, "DOMAE_REGULAR_CHECK_SECS", "300")?,
        full_sync_cron: lookup("DOMAE_FULL_SYNC_CRON")
            .unwrap_or_else(|| "0 0 3 * * *".to_string()),
        popular_refresh_cron: lookup("DOMAE_POPULAR_REFRESH_CRON")
            .unwrap_or_else(|| "0 0 */2 * * *".to_string()),
        new_products_cron: lookup("DOMAE_NEW_PRODUCTS_CRON")
            .unwrap_or_else(|| "0 0 */4 * * *".to_string()),
        expiry_cleanup_cron: lookup("DOMAE_EXPIRY_CLEANUP_CRON")
            .unwrap_or_else(|| "0 0 2 * * *".to_string()),
        price_sweep_cron: lookup("DOMAE_PRICE_SWEEP_CRON")
            .unwrap_or_else(|| "0 0 */6 * * *".to_string()),
        cache_warmup_cron: lookup("DOMAE_CACHE_WARMUP_CRON")
            .unwrap_or_else(|| "0 0 4 * * *".to_string()),
    })
}

fn required(
    lookup: &dyn Fn(&str) -> Option<String>,
    var: &str,
) -> Result<String, ConfigError> {
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnvVar(var.to_string())),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_value<T>(
    lookup: &dyn Fn(&str) -> Option<String>,
    var: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(var).unwrap_or_else(|| default.to_string());
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

fn parse_environment(raw: Option<&str>) -> Result<Environment, ConfigError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Environment::Development),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::InvalidEnvVar {
                var: "DOMAE_ENVIRONMENT".to_string(),
                reason: format!("unknown environment `{other}`"),
            }),
        },
    }
}
