//! One-shot collection runs driven from the command line.
//!
//! Does for a single supplier what the scheduler's `full_sync` job does for
//! all of them, then prints the batch counters instead of only logging them.

use std::sync::Arc;

use anyhow::Context;

use domae_core::{AppConfig, CategoryMapper, CollectionType, Supplier};
use domae_supplier::WholesalerClient;
use domae_sync::WholesalerSyncService;

/// Run one collection pass against `supplier` and print the resulting batch
/// counters as pretty JSON.
///
/// # Errors
///
/// Returns an error if the supplier or collection type is unknown, the
/// supplier credentials are missing, or the run fails before any product is
/// processed.
pub(crate) async fn run_collect(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    supplier_raw: &str,
    collection_type_raw: &str,
    max_products: usize,
) -> anyhow::Result<()> {
    let supplier: Supplier = supplier_raw.parse()?;
    let collection_type = parse_collection_type(collection_type_raw)?;

    let client = WholesalerClient::build(supplier, config)
        .with_context(|| format!("building {supplier} client"))?;
    let table = domae_core::load_category_table(&config.category_table_path)?;
    let service = WholesalerSyncService::new(
        pool.clone(),
        Arc::new(CategoryMapper::new(table)),
        config.refresh_after_hours,
        config.retention_days,
    );

    tracing::info!(
        supplier = %supplier,
        collection_type = collection_type.as_str(),
        max_products,
        "starting collection run"
    );
    let result = service
        .sync_wholesaler(&client, &collection_type, max_products)
        .await?;

    println!("{}", serde_json::to_string_pretty(&result.summary())?);
    Ok(())
}

/// Parse the `--collection-type` flag: `full`, `new`, or `keyword:<term>`.
fn parse_collection_type(raw: &str) -> anyhow::Result<CollectionType> {
    let trimmed = raw.trim();
    if let Some(keyword) = trimmed.strip_prefix("keyword:") {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            anyhow::bail!("keyword collection needs a term, e.g. keyword:가습기");
        }
        return Ok(CollectionType::Keyword(keyword.to_string()));
    }
    match trimmed {
        "full" => Ok(CollectionType::Full),
        "new" => Ok(CollectionType::NewArrivals),
        other => anyhow::bail!(
            "unknown collection type '{other}'; expected full, new, or keyword:<term>"
        ),
    }
}
