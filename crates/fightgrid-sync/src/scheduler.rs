//! Owned scheduler handle around `tokio-cron-scheduler`.
//!
//! One handle is constructed per process and passed to whatever invokes it;
//! whether it is running is a queryable property of the handle, not ambient
//! module state. Production deployments are expected to leave this disabled
//! and drive the cron HTTP endpoint externally instead, so duplicate
//! schedulers never race across process instances.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::pipeline::SyncEngine;

/// Advisory timestamps gating the immediate-run-on-start behavior. Not a
/// correctness mechanism; the storage uniqueness keys are the real defense
/// against overlapping runs.
#[derive(Debug, Default)]
struct LastRuns {
    sync: Option<DateTime<Utc>>,
    rankings: Option<DateTime<Utc>>,
}

pub struct SchedulerHandle {
    engine: Arc<SyncEngine>,
    sync_cron: String,
    rankings_cron: String,
    scheduler: Option<JobScheduler>,
    last_runs: Arc<Mutex<LastRuns>>,
}

impl SchedulerHandle {
    pub fn new(engine: Arc<SyncEngine>, sync_cron: String, rankings_cron: String) -> Self {
        Self {
            engine,
            sync_cron,
            rankings_cron,
            scheduler: None,
            last_runs: Arc::new(Mutex::new(LastRuns::default())),
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Start the periodic jobs. A second `start` on a running handle is a
    /// warned no-op. Fires an immediate incremental run when the advisory
    /// last-sync timestamp is absent or older than an hour, and an immediate
    /// rankings run when older than a day.
    pub async fn start(&mut self) -> Result<()> {
        if self.scheduler.is_some() {
            warn!("scheduler already running");
            return Ok(());
        }

        let scheduler = JobScheduler::new().await.context("creating scheduler")?;

        let engine = self.engine.clone();
        let last_runs = self.last_runs.clone();
        let sync_job = Job::new_async(self.sync_cron.as_str(), move |_uuid, _lock| {
            let engine = engine.clone();
            let last_runs = last_runs.clone();
            Box::pin(async move {
                run_scheduled_sync(engine, last_runs).await;
            })
        })
        .with_context(|| format!("creating sync job for cron {}", self.sync_cron))?;
        scheduler.add(sync_job).await.context("adding sync job")?;

        let engine = self.engine.clone();
        let last_runs = self.last_runs.clone();
        let rankings_job = Job::new_async(self.rankings_cron.as_str(), move |_uuid, _lock| {
            let engine = engine.clone();
            let last_runs = last_runs.clone();
            Box::pin(async move {
                run_scheduled_rankings(engine, last_runs).await;
            })
        })
        .with_context(|| format!("creating rankings job for cron {}", self.rankings_cron))?;
        scheduler
            .add(rankings_job)
            .await
            .context("adding rankings job")?;

        scheduler.start().await.context("starting scheduler")?;
        self.scheduler = Some(scheduler);

        let (stale_sync, stale_rankings) = {
            let guard = self.last_runs.lock().expect("scheduler mutex poisoned");
            (
                guard
                    .sync
                    .map_or(true, |at| Utc::now() - at > Duration::hours(1)),
                guard
                    .rankings
                    .map_or(true, |at| Utc::now() - at > Duration::hours(24)),
            )
        };
        if stale_sync {
            tokio::spawn(run_scheduled_sync(self.engine.clone(), self.last_runs.clone()));
        }
        if stale_rankings {
            tokio::spawn(run_scheduled_rankings(
                self.engine.clone(),
                self.last_runs.clone(),
            ));
        }

        info!(
            sync_cron = self.sync_cron.as_str(),
            rankings_cron = self.rankings_cron.as_str(),
            "scheduler started"
        );
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.shutdown().await.context("stopping scheduler")?;
            info!("scheduler stopped");
        }
        Ok(())
    }
}

async fn run_scheduled_sync(engine: Arc<SyncEngine>, last_runs: Arc<Mutex<LastRuns>>) {
    last_runs.lock().expect("scheduler mutex poisoned").sync = Some(Utc::now());
    match engine.run_incremental().await {
        Ok(stats) => info!(
            events = stats.events,
            fights = stats.fights,
            fighters = stats.fighters,
            errors = stats.errors,
            "scheduled sync finished"
        ),
        Err(err) => warn!(error = %err, "scheduled sync failed"),
    }
}

async fn run_scheduled_rankings(engine: Arc<SyncEngine>, last_runs: Arc<Mutex<LastRuns>>) {
    last_runs.lock().expect("scheduler mutex poisoned").rankings = Some(Utc::now());
    match engine.run_rankings().await {
        Ok(report) => info!(
            processed = report.rankings_processed,
            not_found = report.not_found,
            "scheduled rankings sync finished"
        ),
        Err(err) => warn!(error = %err, "scheduled rankings sync failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fightgrid_client::{AthleteDoc, DateRange, EventDoc, FetchError, FightSource, RecordsDoc};
    use fightgrid_storage::MemoryStore;
    use crate::SyncConfig;

    struct EmptySource;

    #[async_trait]
    impl FightSource for EmptySource {
        async fn event_ids(&self, _range: DateRange) -> Result<Vec<String>, FetchError> {
            Ok(vec![])
        }

        async fn event(&self, event_id: &str) -> Result<EventDoc, FetchError> {
            Err(FetchError::HttpStatus {
                status: 404,
                url: event_id.to_string(),
            })
        }

        async fn athlete(&self, href: &str) -> Result<AthleteDoc, FetchError> {
            Err(FetchError::HttpStatus {
                status: 404,
                url: href.to_string(),
            })
        }

        async fn athlete_records(&self, athlete_id: &str) -> Result<RecordsDoc, FetchError> {
            Err(FetchError::HttpStatus {
                status: 404,
                url: athlete_id.to_string(),
            })
        }

        async fn rankings_page(&self) -> Result<String, FetchError> {
            Ok(String::new())
        }
    }

    fn test_engine() -> Arc<SyncEngine> {
        let mut config = SyncConfig::from_env();
        config.organization_short_name = "NONE".to_string();
        Arc::new(SyncEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(EmptySource),
            config,
        ))
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_clears_running_state() {
        let mut handle = SchedulerHandle::new(
            test_engine(),
            "0 0 */6 * * *".to_string(),
            "0 0 4 * * Mon".to_string(),
        );
        assert!(!handle.is_running());

        handle.start().await.expect("start");
        assert!(handle.is_running());

        // Second start is a no-op, not an error.
        handle.start().await.expect("double start");
        assert!(handle.is_running());

        handle.stop().await.expect("stop");
        assert!(!handle.is_running());
    }
}
