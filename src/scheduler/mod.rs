pub mod cleanup;
pub mod reports;

use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};
use uuid::Uuid;

/// The future a scheduled job produces on each tick
pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Cron jobs for the scheduled reports and media cleanup
pub struct Scheduler {
    inner: JobScheduler,
}

impl Scheduler {
    pub async fn new() -> Result<Self> {
        let inner = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;
        Ok(Self { inner })
    }

    /// Add a recurring job. `cron_expr` has a leading seconds field,
    /// e.g. `0 30 7 * * *` for 07:30 every day.
    pub async fn add_cron_job<F>(&self, cron_expr: &str, name: &str, task: F) -> Result<Uuid>
    where
        F: Fn() -> JobFuture + Send + Sync + 'static,
    {
        let label = name.to_string();
        let job = Job::new_async(cron_expr, move |id, _lock| {
            let label = label.clone();
            let run = task();
            Box::pin(async move {
                info!("Running '{}' ({})", label, id);
                run.await;
                debug!("'{}' finished", label);
            })
        })
        .with_context(|| format!("Invalid cron expression for '{}': {}", name, cron_expr))?;

        let id = self
            .inner
            .add(job)
            .await
            .with_context(|| format!("Failed to schedule '{}'", name))?;

        info!("Scheduled '{}' at '{}'", name, cron_expr);
        Ok(id)
    }

    pub async fn start(&self) -> Result<()> {
        self.inner
            .start()
            .await
            .context("Failed to start scheduler")?;
        info!("Scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .context("Failed to stop scheduler")?;
        info!("Scheduler stopped");
        Ok(())
    }
}
