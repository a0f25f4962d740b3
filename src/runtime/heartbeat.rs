/// Worker liveness heartbeat
///
/// Registers this process in `worker_process` and refreshes its update time
/// on a fixed interval through tokio-cron-scheduler.

use crate::{
    config::WorkerConfig,
    model::{WorkerProcess, WorkerProcessStore},
};
use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

pub struct HeartbeatService {
    scheduler: Arc<RwLock<JobScheduler>>,
    job_id: Arc<RwLock<Option<Uuid>>>,
    workers: WorkerProcessStore,
    server_name: String,
    hostname: String,
    interval: Duration,
}

impl HeartbeatService {
    pub async fn new(workers: WorkerProcessStore, config: &WorkerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            job_id: Arc::new(RwLock::new(None)),
            workers,
            server_name: config.server_name.clone(),
            hostname: config.hostname.clone(),
            interval: Duration::from_secs(config.heartbeat_secs.max(1)),
        })
    }

    /// Record one heartbeat now
    pub async fn beat(&self) -> Result<WorkerProcess> {
        self.workers.heartbeat(&self.server_name, &self.hostname).await
    }

    /// Beat once, then keep beating every interval
    pub async fn start(&self) -> Result<()> {
        let worker = self.beat().await?;
        tracing::info!(
            "💓 Worker {}@{} registered as #{} (every {:?})",
            self.server_name,
            self.hostname,
            worker.id,
            self.interval
        );

        let workers = self.workers.clone();
        let server_name = self.server_name.clone();
        let hostname = self.hostname.clone();

        let job = Job::new_repeated_async(self.interval, move |_uuid, _l| {
            let workers = workers.clone();
            let server_name = server_name.clone();
            let hostname = hostname.clone();

            Box::pin(async move {
                match workers.heartbeat(&server_name, &hostname).await {
                    Ok(_) => tracing::debug!("💓 Heartbeat {}@{}", server_name, hostname),
                    Err(e) => tracing::error!("❌ Heartbeat for {}@{} failed: {}", server_name, hostname, e),
                }
            })
        })?;

        {
            let scheduler = self.scheduler.read().await;
            let job_id = scheduler.add(job).await?;
            *self.job_id.write().await = Some(job_id);
            scheduler.start().await?;
        }

        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        if let Some(job_id) = self.job_id.write().await.take() {
            let scheduler = self.scheduler.read().await;
            if let Err(e) = scheduler.remove(&job_id).await {
                tracing::warn!("⚠️ Failed to remove heartbeat job: {}", e);
            }
        }

        let mut scheduler = self.scheduler.write().await;
        scheduler.shutdown().await?;

        tracing::info!("⏹️ Heartbeat stopped for {}@{}", self.server_name, self.hostname);
        Ok(())
    }
}
