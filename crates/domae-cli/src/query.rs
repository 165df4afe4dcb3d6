//! Read-only and maintenance command handlers.
//!
//! These are called from `main` after the database pool and config are
//! established; `map-category` is the exception and never touches the pool.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use domae_core::{AppConfig, CategoryMapper, Supplier};
use domae_sync::WholesalerSyncService;

/// Show recent collection batches, newest first.
///
/// # Errors
///
/// Returns an error if the supplier filter is unknown or the database query
/// fails.
pub(crate) async fn run_status(
    pool: &sqlx::PgPool,
    supplier_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<()> {
    let supplier = supplier_filter
        .map(str::parse::<Supplier>)
        .transpose()?;
    let batches =
        domae_db::list_recent_batches(pool, supplier.map(Supplier::as_str), limit).await?;

    if batches.is_empty() {
        println!(
            "no collection batches found{}; run `collect` first",
            supplier
                .map(|s| format!(" for supplier {s}"))
                .unwrap_or_default()
        );
        return Ok(());
    }

    let header = format!(
        "{:<34}{:<11}{:<14}{:<11}{:<7}{:<7}{:<7}STARTED",
        "BATCH", "SOURCE", "TYPE", "STATUS", "FOUND", "OK", "FAIL"
    );
    println!("{header}");
    for batch in &batches {
        println!(
            "{:<34}{:<11}{:<14}{:<11}{:<7}{:<7}{:<7}{}",
            batch.batch_id,
            batch.source,
            batch.collection_type,
            batch.status,
            batch.total_found,
            batch.successful_collections,
            batch.failed_collections,
            fmt_ts(batch.started_at),
        );
    }

    Ok(())
}

/// Expire products whose last refresh is older than the retention window
/// and print what transitioned.
///
/// # Errors
///
/// Returns an error if the category table cannot be loaded or the expiry
/// transaction fails.
pub(crate) async fn run_cleanup(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    retention_override: Option<i64>,
) -> anyhow::Result<()> {
    let retention_days = retention_override.unwrap_or(config.retention_days);
    anyhow::ensure!(
        retention_days > 0,
        "retention window must be a positive number of days"
    );

    let table = domae_core::load_category_table(&config.category_table_path)?;
    let service = WholesalerSyncService::new(
        pool.clone(),
        Arc::new(CategoryMapper::new(table)),
        config.refresh_after_hours,
        retention_days,
    );

    let expired = service.expire_stale_products().await?;
    if expired.is_empty() {
        println!("no products stale for more than {retention_days} days; nothing expired");
        return Ok(());
    }

    println!("expired {} products:", expired.len());
    let header = format!(
        "{:<11}{:<18}{:<19}NAME",
        "SOURCE", "SUPPLIER ID", "COLLECTED"
    );
    println!("{header}");
    for row in &expired {
        let name_display = if row.name.chars().count() > 40 {
            format!("{}...", row.name.chars().take(40).collect::<String>())
        } else {
            row.name.clone()
        };
        let collected = row.collected_at.format("%Y-%m-%d %H:%M").to_string();
        println!(
            "{:<11}{:<18}{:<19}{}",
            row.source, row.supplier_id, collected, name_display,
        );
    }

    Ok(())
}

/// Probe the category mapper the way the collection pipeline would.
///
/// Prints the mapping verdict, the supplier dictionary size, and (when a
/// product name is given) the keyword suggestions, so dictionary gaps can
/// be curated without running a collection.
///
/// # Errors
///
/// Returns an error if the supplier is unknown or the category table cannot
/// be loaded.
pub(crate) fn run_map_category(
    config: &AppConfig,
    supplier_raw: &str,
    category: &str,
    name: Option<&str>,
) -> anyhow::Result<()> {
    let supplier: Supplier = supplier_raw.parse()?;
    let table = domae_core::load_category_table(&config.category_table_path)?;
    let dictionary_len = table.dictionary_len(supplier);
    let mapper = CategoryMapper::new(table);

    let verdict = mapper.map_category(supplier, category, name);
    println!("category:   {}", verdict.category);
    println!("confidence: {:.2}", verdict.confidence);
    println!("dictionary: {dictionary_len} entries for {supplier}");

    if let Some(name) = name {
        println!("suggestions from name:");
        for suggestion in mapper.suggest_categories(name, None) {
            println!(
                "  {:<22}{:.2}",
                suggestion.category.as_str(),
                suggestion.confidence
            );
        }
    }

    Ok(())
}

/// Format an optional timestamp for display, returning `"—"` when `None`.
fn fmt_ts(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(
        || "\u{2014}".to_string(),
        |t| t.format("%Y-%m-%d %H:%M").to_string(),
    )
}
