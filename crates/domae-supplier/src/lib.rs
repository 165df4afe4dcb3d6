//! Supplier API clients for the wholesale catalog pipeline.
//!
//! Three deliberately heterogeneous adapters sit behind [`WholesalerClient`]:
//! OwnerClan (JSON, bearer token, cursor pages), Domeme (JSON open API,
//! key-as-param, numbered pages) and Gentrade (XML feed, key-as-param,
//! offset windows). They share retry, status mapping, and pagination
//! behavior; the rest of the system only sees [`ProductData`] streams and
//! [`StockInfo`] lookups.

mod domeme;
mod error;
mod gentrade;
mod http;
mod ownerclan;
mod pagination;
mod retry;

use domae_core::{AppConfig, CollectionType, ProductData, StockInfo, Supplier};
use futures::stream::BoxStream;

pub use domeme::DomemeClient;
pub use error::SupplierError;
pub use gentrade::GentradeClient;
pub use ownerclan::OwnerclanClient;

/// Connection settings for one supplier client.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: String,
    /// Override for the supplier's production endpoint; tests point this at
    /// a mock server.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    pub inter_request_delay_ms: u64,
}

impl ClientConfig {
    /// Pulls one supplier's connection settings out of the application
    /// config.
    ///
    /// # Errors
    ///
    /// Returns [`SupplierError::MissingCredentials`] when no API key is
    /// configured for `supplier` — scheduled jobs treat that as "skip this
    /// supplier".
    pub fn from_app_config(supplier: Supplier, config: &AppConfig) -> Result<Self, SupplierError> {
        let api_key = config
            .supplier_api_key(supplier)
            .ok_or(SupplierError::MissingCredentials { supplier })?
            .to_owned();
        Ok(Self {
            api_key,
            base_url: config.supplier_base_url(supplier).map(str::to_owned),
            timeout_secs: config.http_timeout_secs,
            user_agent: config.user_agent.clone(),
            max_retries: config.max_retries,
            backoff_base_secs: config.backoff_base_secs,
            inter_request_delay_ms: config.inter_request_delay_ms,
        })
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"[redacted]")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_secs", &self.backoff_base_secs)
            .field("inter_request_delay_ms", &self.inter_request_delay_ms)
            .finish()
    }
}

/// Outcome of a connectivity probe. Deliberately not a `Result`: callers
/// branch on `success` and record `message` either way.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    pub success: bool,
    pub message: String,
}

/// One supplier client behind a common calling surface.
///
/// The sync service and stock monitor work exclusively through this enum so
/// adding a supplier means adding an adapter and a variant, nothing else.
#[derive(Debug)]
pub enum WholesalerClient {
    Ownerclan(OwnerclanClient),
    Domeme(DomemeClient),
    Gentrade(GentradeClient),
}

impl WholesalerClient {
    /// Builds the client for `supplier` from application config.
    ///
    /// # Errors
    ///
    /// [`SupplierError::MissingCredentials`] when the supplier has no API
    /// key configured; otherwise client-construction errors.
    pub fn build(supplier: Supplier, config: &AppConfig) -> Result<Self, SupplierError> {
        let client_config = ClientConfig::from_app_config(supplier, config)?;
        let client = match supplier {
            Supplier::Ownerclan => {
                WholesalerClient::Ownerclan(OwnerclanClient::new(&client_config)?)
            }
            Supplier::Domeme => WholesalerClient::Domeme(DomemeClient::new(&client_config)?),
            Supplier::Gentrade => WholesalerClient::Gentrade(GentradeClient::new(&client_config)?),
        };
        Ok(client)
    }

    #[must_use]
    pub fn supplier(&self) -> Supplier {
        match self {
            WholesalerClient::Ownerclan(_) => Supplier::Ownerclan,
            WholesalerClient::Domeme(_) => Supplier::Domeme,
            WholesalerClient::Gentrade(_) => Supplier::Gentrade,
        }
    }

    /// Probes the supplier with a minimal catalog request. Failures are
    /// folded into the returned status, never an `Err`.
    pub async fn test_connection(&self) -> ConnectionStatus {
        let result = match self {
            WholesalerClient::Ownerclan(c) => c.ping().await,
            WholesalerClient::Domeme(c) => c.ping().await,
            WholesalerClient::Gentrade(c) => c.ping().await,
        };
        match result {
            Ok(()) => ConnectionStatus {
                success: true,
                message: format!("{} reachable", self.supplier()),
            },
            Err(err) => {
                tracing::warn!(
                    supplier = %self.supplier(),
                    error = %err,
                    "supplier connectivity test failed"
                );
                ConnectionStatus {
                    success: false,
                    message: err.to_string(),
                }
            }
        }
    }

    /// Streams the supplier's catalog. See the adapter methods for the
    /// per-item error semantics.
    pub fn collect_products(
        &self,
        collection_type: &CollectionType,
        max_products: usize,
    ) -> BoxStream<'_, Result<ProductData, SupplierError>> {
        match self {
            WholesalerClient::Ownerclan(c) => c.collect_products(collection_type, max_products),
            WholesalerClient::Domeme(c) => c.collect_products(collection_type, max_products),
            WholesalerClient::Gentrade(c) => c.collect_products(collection_type, max_products),
        }
    }

    /// Fetches current stock for one product.
    ///
    /// # Errors
    ///
    /// Propagates the adapter's typed error.
    pub async fn get_product_stock(
        &self,
        supplier_product_id: &str,
    ) -> Result<StockInfo, SupplierError> {
        match self {
            WholesalerClient::Ownerclan(c) => c.get_product_stock(supplier_product_id).await,
            WholesalerClient::Domeme(c) => c.get_product_stock(supplier_product_id).await,
            WholesalerClient::Gentrade(c) => c.get_product_stock(supplier_product_id).await,
        }
    }
}

/// Splits a supplier category string like `"패션의류 > 여성의류"` into
/// trimmed path segments.
pub(crate) fn split_category_path(raw: &str) -> Vec<String> {
    raw.split('>')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_path_splits_and_trims() {
        assert_eq!(
            split_category_path("패션의류 > 여성의류 >원피스"),
            vec!["패션의류", "여성의류", "원피스"]
        );
        assert_eq!(split_category_path("단일분류"), vec!["단일분류"]);
        assert!(split_category_path(" > > ").is_empty());
    }

    #[test]
    fn debug_redacts_the_api_key() {
        let config = ClientConfig {
            api_key: "super-secret".to_owned(),
            base_url: None,
            timeout_secs: 30,
            user_agent: "domae/0.1".to_owned(),
            max_retries: 3,
            backoff_base_secs: 2,
            inter_request_delay_ms: 250,
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[redacted]"));
    }
}
