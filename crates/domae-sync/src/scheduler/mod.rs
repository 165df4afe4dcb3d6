//! Cron-driven collection jobs.
//!
//! Wires the recurring jobs onto a [`JobScheduler`], keeps each job's
//! runner around so operators can trigger it off-schedule, and owns the
//! realtime stock monitor's lifecycle.

mod jobs;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use domae_core::{AppConfig, CategoryMapper};

use crate::cache::CacheLayer;
use crate::monitor::RealtimeStockMonitor;
use crate::service::WholesalerSyncService;
use crate::SyncError;

/// Everything a job body needs, cloned into the cron closures.
#[derive(Clone)]
pub(crate) struct JobContext {
    pub(crate) pool: PgPool,
    pub(crate) config: Arc<AppConfig>,
    pub(crate) service: Arc<WholesalerSyncService>,
    pub(crate) cache: Arc<CacheLayer>,
}

type JobRunner = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct RegisteredJob {
    id: &'static str,
    name: &'static str,
    schedule: String,
    uuid: Uuid,
    runner: JobRunner,
}

/// A registered job's schedule, as reported to operators.
#[derive(Debug, Clone, Serialize)]
pub struct JobScheduleInfo {
    pub job_id: String,
    pub name: String,
    /// Six-field cron expression the job fires on.
    pub schedule: String,
    pub next_run: Option<DateTime<Utc>>,
}

/// Owns the cron scheduler, the registered collection jobs, and the
/// stock monitor.
pub struct CollectionScheduler {
    scheduler: JobScheduler,
    monitor: Arc<RealtimeStockMonitor>,
    jobs: Vec<RegisteredJob>,
}

impl CollectionScheduler {
    /// Builds the scheduler and registers every recurring job without
    /// starting anything.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Schedule`] if the scheduler cannot be
    /// initialised or a cron expression in the configuration does not
    /// parse.
    pub async fn new(
        pool: PgPool,
        config: Arc<AppConfig>,
        mapper: Arc<CategoryMapper>,
        cache: Arc<CacheLayer>,
    ) -> Result<Self, SyncError> {
        let scheduler = JobScheduler::new().await?;
        let monitor = Arc::new(RealtimeStockMonitor::new(
            pool.clone(),
            Arc::clone(&config),
            Arc::clone(&cache),
        ));
        let service = Arc::new(WholesalerSyncService::new(
            pool.clone(),
            mapper,
            config.refresh_after_hours,
            config.retention_days,
        ));
        let ctx = JobContext {
            pool,
            config: Arc::clone(&config),
            service,
            cache,
        };

        let mut this = Self {
            scheduler,
            monitor,
            jobs: Vec::new(),
        };
        this.register(&ctx, "full_sync", "Daily full catalog sync", &config.full_sync_cron, |ctx| {
            Box::pin(jobs::run_full_sync(ctx))
        })
        .await?;
        this.register(
            &ctx,
            "popular_refresh",
            "Popular product stock refresh",
            &config.popular_refresh_cron,
            |ctx| Box::pin(jobs::run_popular_refresh(ctx)),
        )
        .await?;
        this.register(
            &ctx,
            "new_products",
            "New arrivals collection",
            &config.new_products_cron,
            |ctx| Box::pin(jobs::run_new_products(ctx)),
        )
        .await?;
        this.register(
            &ctx,
            "expiry_cleanup",
            "Expired product cleanup",
            &config.expiry_cleanup_cron,
            |ctx| Box::pin(jobs::run_expiry_cleanup(ctx)),
        )
        .await?;
        this.register(
            &ctx,
            "price_sweep",
            "Price and alert sweep",
            &config.price_sweep_cron,
            |ctx| Box::pin(jobs::run_price_sweep(ctx)),
        )
        .await?;
        this.register(
            &ctx,
            "cache_warmup",
            "Popular product cache warmup",
            &config.cache_warmup_cron,
            |ctx| Box::pin(jobs::run_cache_warmup(ctx)),
        )
        .await?;

        Ok(this)
    }

    async fn register(
        &mut self,
        ctx: &JobContext,
        id: &'static str,
        name: &'static str,
        schedule: &str,
        body: fn(JobContext) -> BoxFuture<'static, ()>,
    ) -> Result<(), SyncError> {
        let runner: JobRunner = {
            let ctx = ctx.clone();
            Arc::new(move || body(ctx.clone()))
        };

        let job = Job::new_async(schedule, {
            let runner = Arc::clone(&runner);
            move |_uuid, _lock| {
                let run = runner();
                Box::pin(async move {
                    tracing::info!(job = id, "scheduler: job starting");
                    run.await;
                    tracing::info!(job = id, "scheduler: job complete");
                })
            }
        })?;
        let uuid = self.scheduler.add(job).await?;

        self.jobs.push(RegisteredJob {
            id,
            name,
            schedule: schedule.to_string(),
            uuid,
            runner,
        });
        Ok(())
    }

    /// Starts cron processing and the stock monitor.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Schedule`] if the scheduler fails to start.
    pub async fn start(&self) -> Result<(), SyncError> {
        self.scheduler.start().await?;
        self.monitor.start().await;
        tracing::info!(jobs = self.jobs.len(), "collection scheduler started");
        Ok(())
    }

    /// Stops the stock monitor, then shuts the cron scheduler down.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Schedule`] if the scheduler refuses to shut
    /// down; the monitor is stopped regardless.
    pub async fn stop(&self) -> Result<(), SyncError> {
        self.monitor.stop().await;
        let mut scheduler = self.scheduler.clone();
        scheduler.shutdown().await?;
        tracing::info!("collection scheduler stopped");
        Ok(())
    }

    /// Spawns `job_id`'s runner immediately, off-schedule.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownJob`] for an unregistered id.
    pub fn trigger_job(&self, job_id: &str) -> Result<(), SyncError> {
        let job = self
            .jobs
            .iter()
            .find(|job| job.id == job_id)
            .ok_or_else(|| SyncError::UnknownJob {
                job_id: job_id.to_string(),
            })?;

        tracing::info!(job = job.id, "manually triggering job");
        let run = (job.runner)();
        let id = job.id;
        tokio::spawn(async move {
            run.await;
            tracing::info!(job = id, "manual run complete");
        });
        Ok(())
    }

    /// Current schedule and next fire time for every registered job.
    pub async fn get_schedule_info(&self) -> Vec<JobScheduleInfo> {
        let mut scheduler = self.scheduler.clone();
        let mut info = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            let next_run = match scheduler.next_tick_for_job(job.uuid).await {
                Ok(next) => next,
                Err(err) => {
                    tracing::debug!(job = job.id, error = %err, "no next tick available");
                    None
                }
            };
            info.push(JobScheduleInfo {
                job_id: job.id.to_string(),
                name: job.name.to_string(),
                schedule: job.schedule.clone(),
                next_run,
            });
        }
        info
    }

    /// The monitor handle, for health reporting.
    #[must_use]
    pub fn monitor(&self) -> &RealtimeStockMonitor {
        &self.monitor
    }
}
