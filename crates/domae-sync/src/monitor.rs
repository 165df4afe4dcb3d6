//! Realtime stock monitoring.
//!
//! Two polling passes run as background tasks once started: a priority
//! pass over low-stock, alerted, or recently-changed products, and a
//! slower regular pass over anything not refreshed lately. Products are
//! checked one at a time with a polite delay between supplier calls.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use domae_core::{AppConfig, Supplier};
use domae_db::CollectedProductRow;
use domae_supplier::{SupplierError, WholesalerClient};

use crate::cache::CacheLayer;
use crate::stock::{self, StockObservation};
use crate::SyncError;

/// Products at or below this quantity qualify for the priority pass.
const LOW_STOCK_THRESHOLD: i32 = 10;
const PRIORITY_PASS_LIMIT: i64 = 50;
const REGULAR_PASS_LIMIT: i64 = 100;
/// The regular pass targets products not refreshed for this many hours.
const REGULAR_STALE_HOURS: i64 = 6;
/// Pause after a pass-level failure before trying again.
const PASS_ERROR_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Priority,
    Regular,
}

impl Pass {
    fn name(self) -> &'static str {
        match self {
            Pass::Priority => "priority",
            Pass::Regular => "regular",
        }
    }

    fn is_priority(self) -> bool {
        matches!(self, Pass::Priority)
    }

    fn inter_check_delay(self) -> Duration {
        match self {
            Pass::Priority => Duration::from_millis(500),
            Pass::Regular => Duration::from_secs(1),
        }
    }
}

struct MonitorShared {
    pool: PgPool,
    config: Arc<AppConfig>,
    cache: Arc<CacheLayer>,
    /// Products currently being checked, so the two passes never poll
    /// the same product concurrently.
    in_flight: Mutex<HashSet<i64>>,
}

struct MonitorRuntime {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

/// Handle to the background stock monitor.
pub struct RealtimeStockMonitor {
    shared: Arc<MonitorShared>,
    runtime: Mutex<Option<MonitorRuntime>>,
}

impl RealtimeStockMonitor {
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<AppConfig>, cache: Arc<CacheLayer>) -> Self {
        Self {
            shared: Arc::new(MonitorShared {
                pool,
                config,
                cache,
                in_flight: Mutex::new(HashSet::new()),
            }),
            runtime: Mutex::new(None),
        }
    }

    /// Spawns the priority and regular polling tasks. Calling this while
    /// the monitor is already running is a logged no-op.
    pub async fn start(&self) {
        let mut runtime = self.runtime.lock().await;
        if runtime.is_some() {
            tracing::warn!("stock monitor already running");
            return;
        }

        let (shutdown, receiver) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(run_pass_loop(
                Arc::clone(&self.shared),
                receiver.clone(),
                Pass::Priority,
            )),
            tokio::spawn(run_pass_loop(
                Arc::clone(&self.shared),
                receiver,
                Pass::Regular,
            )),
        ];
        *runtime = Some(MonitorRuntime { shutdown, tasks });

        tracing::info!(
            priority_interval_secs = self.shared.config.priority_check_secs,
            regular_interval_secs = self.shared.config.regular_check_secs,
            "stock monitor started"
        );
    }

    /// Signals both tasks to stop and waits for them to finish.
    pub async fn stop(&self) {
        let Some(runtime) = self.runtime.lock().await.take() else {
            return;
        };
        let _ = runtime.shutdown.send(true);
        for task in runtime.tasks {
            if let Err(err) = task.await {
                tracing::error!(error = %err, "stock monitor task panicked");
            }
        }
        tracing::info!("stock monitor stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.runtime.lock().await.is_some()
    }
}

async fn run_pass_loop(shared: Arc<MonitorShared>, mut shutdown: watch::Receiver<bool>, pass: Pass) {
    let period = Duration::from_secs(match pass {
        Pass::Priority => shared.config.priority_check_secs,
        Pass::Regular => shared.config.regular_check_secs,
    });
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        if let Err(err) = run_pass(&shared, &mut shutdown, pass).await {
            tracing::error!(pass = pass.name(), error = %err, "stock pass failed; backing off");
            tokio::select! {
                () = tokio::time::sleep(PASS_ERROR_BACKOFF) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if *shutdown.borrow() {
            break;
        }
    }

    tracing::debug!(pass = pass.name(), "stock pass loop exited");
}

async fn run_pass(
    shared: &Arc<MonitorShared>,
    shutdown: &mut watch::Receiver<bool>,
    pass: Pass,
) -> Result<(), SyncError> {
    let candidates = match pass {
        Pass::Priority => {
            domae_db::list_priority_products(&shared.pool, LOW_STOCK_THRESHOLD, PRIORITY_PASS_LIMIT)
                .await?
        }
        Pass::Regular => {
            domae_db::list_stale_products(&shared.pool, REGULAR_STALE_HOURS, REGULAR_PASS_LIMIT)
                .await?
        }
    };
    if candidates.is_empty() {
        return Ok(());
    }

    // Claim ids the other pass is not already working on.
    let claimed: Vec<CollectedProductRow> = {
        let mut in_flight = shared.in_flight.lock().await;
        candidates
            .into_iter()
            .filter(|product| in_flight.insert(product.id))
            .collect()
    };
    if claimed.is_empty() {
        return Ok(());
    }

    tracing::debug!(pass = pass.name(), count = claimed.len(), "starting stock pass");

    let claimed_ids: Vec<i64> = claimed.iter().map(|product| product.id).collect();
    check_products(shared, shutdown, pass, claimed).await;

    let mut in_flight = shared.in_flight.lock().await;
    for id in claimed_ids {
        in_flight.remove(&id);
    }
    Ok(())
}

/// Checks each claimed product, containing every per-product and
/// per-supplier failure so one bad apple never ends the pass.
async fn check_products(
    shared: &Arc<MonitorShared>,
    shutdown: &mut watch::Receiver<bool>,
    pass: Pass,
    products: Vec<CollectedProductRow>,
) {
    let mut groups: HashMap<Supplier, Vec<CollectedProductRow>> = HashMap::new();
    for product in products {
        match Supplier::from_str(&product.source) {
            Ok(supplier) => groups.entry(supplier).or_default().push(product),
            Err(err) => {
                tracing::warn!(product_id = product.id, error = %err, "product has unknown source; skipping");
            }
        }
    }

    let mut checked = 0usize;
    let mut changed = 0usize;

    for (supplier, group) in groups {
        let client = match WholesalerClient::build(supplier, &shared.config) {
            Ok(client) => client,
            Err(SupplierError::MissingCredentials { .. }) => {
                tracing::debug!(supplier = %supplier, "no credentials configured; skipping stock checks");
                continue;
            }
            Err(err) => {
                tracing::warn!(supplier = %supplier, error = %err, "could not build supplier client; skipping group");
                continue;
            }
        };

        for product in &group {
            if *shutdown.borrow() {
                return;
            }

            match stock::refresh_product_stock(
                &shared.pool,
                &shared.cache,
                &client,
                product,
                pass.is_priority(),
            )
            .await
            {
                Ok(StockObservation::Changed) => {
                    checked += 1;
                    changed += 1;
                }
                Ok(_) => checked += 1,
                Err(err) => {
                    tracing::warn!(
                        product_id = product.id,
                        supplier = %supplier,
                        error = %err,
                        "stock check failed; skipping product"
                    );
                }
            }

            tokio::select! {
                () = tokio::time::sleep(pass.inter_check_delay()) => {}
                signal = shutdown.changed() => {
                    if signal.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    if checked > 0 {
        tracing::info!(pass = pass.name(), checked, changed, "stock pass complete");
    }
}
