use std::net::SocketAddr;
use std::path::PathBuf;

use crate::supplier::Supplier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub http_addr: SocketAddr,
    pub log_level: String,
    pub category_table_path: PathBuf,
    pub ownerclan_api_key: Option<String>,
    pub domeme_api_key: Option<String>,
    pub gentrade_api_key: Option<String>,
    /// Base URL overrides for supplier APIs; `None` uses each adapter's
    /// production default. Set in tests to point at a mock server.
    pub ownerclan_base_url: Option<String>,
    pub domeme_base_url: Option<String>,
    pub gentrade_base_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    pub inter_request_delay_ms: u64,
    /// Products untouched for longer than this are refreshed on the next
    /// sync pass even when no field appears to have changed.
    pub refresh_after_hours: i64,
    /// Products not observed for this many days are marked expired.
    pub retention_days: i64,
    pub priority_check_secs: u64,
    pub regular_check_secs: u64,
    pub full_sync_cron: String,
    pub popular_refresh_cron: String,
    pub new_products_cron: String,
    pub expiry_cleanup_cron: String,
    pub price_sweep_cron: String,
    pub cache_warmup_cron: String,
}

impl AppConfig {
    /// The configured API key for a supplier, if any. Suppliers without a
    /// key are skipped by scheduled jobs and rejected at client build time.
    #[must_use]
    pub fn supplier_api_key(&self, supplier: Supplier) -> Option<&str> {
        match supplier {
            Supplier::Ownerclan => self.ownerclan_api_key.as_deref(),
            Supplier::Domeme => self.domeme_api_key.as_deref(),
            Supplier::Gentrade => self.gentrade_api_key.as_deref(),
        }
    }

    #[must_use]
    pub fn supplier_base_url(&self, supplier: Supplier) -> Option<&str> {
        match supplier {
            Supplier::Ownerclan => self.ownerclan_base_url.as_deref(),
            Supplier::Domeme => self.domeme_base_url.as_deref(),
            Supplier::Gentrade => self.gentrade_base_url.as_deref(),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("http_addr", &self.http_addr)
            .field("log_level", &self.log_level)
            .field("category_table_path", &self.category_table_path)
            .field("database_url", &"[redacted]")
            .field(
                "ownerclan_api_key",
                &self.ownerclan_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "domeme_api_key",
                &self.domeme_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "gentrade_api_key",
                &self.gentrade_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("ownerclan_base_url", &self.ownerclan_base_url)
            .field("domeme_base_url", &self.domeme_base_url)
            .field("gentrade_base_url", &self.gentrade_base_url)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_secs", &self.backoff_base_secs)
            .field("inter_request_delay_ms", &self.inter_request_delay_ms)
            .field("refresh_after_hours", &self.refresh_after_hours)
            .field("retention_days", &self.retention_days)
            .field("priority_check_secs", &self.priority_check_secs)
            .field("regular_check_secs", &self.regular_check_secs)
            .field("full_sync_cron", &self.full_sync_cron)
            .field("popular_refresh_cron", &self.popular_refresh_cron)
            .field("new_products_cron", &self.new_products_cron)
            .field("expiry_cleanup_cron", &self.expiry_cleanup_cron)
            .field("price_sweep_cron", &self.price_sweep_cron)
            .field("cache_warmup_cron", &self.cache_warmup_cron)
            .finish()
    }
}
