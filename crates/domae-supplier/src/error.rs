use domae_core::Supplier;
use thiserror::Error;

/// Errors returned by the wholesale supplier clients.
#[derive(Debug, Error)]
pub enum SupplierError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("XML parse error for {context}: {reason}")]
    Xml { context: String, reason: String },

    #[error("rate limited by {supplier} (retry after {retry_after_secs}s)")]
    RateLimited {
        supplier: Supplier,
        retry_after_secs: u64,
    },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("credentials rejected at {url}")]
    AuthRejected { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The supplier accepted the request but answered with an
    /// application-level error envelope.
    #[error("supplier API error: {0}")]
    ApiError(String),

    #[error("no credentials configured for {supplier}")]
    MissingCredentials { supplier: Supplier },

    #[error("pagination limit reached for {supplier}: exceeded {max_pages} pages")]
    PaginationLimit { supplier: Supplier, max_pages: usize },

    /// A single catalog entry that cannot be turned into a product. Callers
    /// iterating a collection stream count these and keep going.
    #[error("invalid item {supplier_product_id}: {reason}")]
    InvalidItem {
        supplier_product_id: String,
        reason: String,
    },

    #[error("invalid base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
