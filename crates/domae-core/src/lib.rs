//! Shared domain types and configuration for the domae workspace.
//!
//! This crate has no I/O beyond reading environment variables and the
//! category table file; everything else is pure data and lookup logic so
//! the heavier crates (db, supplier, sync) can depend on it freely.

use thiserror::Error;

mod app_config;
mod category;
mod config;
mod product;
mod supplier;

pub use app_config::{AppConfig, Environment};
pub use category::{
    load_category_table, CategoryMapper, CategoryMatch, CategoryTable, StandardCategory,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use product::{
    ChangeType, CollectionType, ProductData, ProductOption, ProductStatus, ProductVariant,
    StockInfo, StockStatus,
};
pub use supplier::{Supplier, UnknownSupplier};

/// Errors raised while loading configuration or the category table.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read category table at {path}: {source}")]
    CategoryFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse category table: {0}")]
    CategoryFileParse(#[from] serde_yaml::Error),

    #[error("invalid category table: {0}")]
    Validation(String),
}
