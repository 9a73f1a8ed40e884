//! Periodic removal of old downloaded and generated media.

use anyhow::Result;
use std::time::Duration;
use tracing::{error, info};

use super::Scheduler;
use crate::config::StorageConfig;
use crate::providers::MediaStore;

/// Schedule pruning of `media` per the storage settings. A retention of 0
/// hours disables it.
pub async fn register(scheduler: &Scheduler, media: MediaStore, config: &StorageConfig) -> Result<()> {
    if config.retention_hours == 0 {
        info!("Media retention disabled");
        return Ok(());
    }
    let max_age = Duration::from_secs(config.retention_hours * 3600);
    scheduler
        .add_cron_job(&config.cleanup_cron, "media cleanup", move || {
            let media = media.clone();
            Box::pin(async move {
                if let Err(e) = media.prune(max_age).await {
                    error!("Media cleanup failed: {:#}", e);
                }
            })
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(retention_hours: u64, cleanup_cron: &str) -> StorageConfig {
        StorageConfig {
            retention_hours,
            cleanup_cron: cleanup_cron.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_zero_retention_schedules_nothing() {
        let scheduler = Scheduler::new().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        // An invalid cron would fail if a job were added
        register(&scheduler, MediaStore::new(dir.path()), &storage(0, "never"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bad_cleanup_cron_is_rejected() {
        let scheduler = Scheduler::new().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(register(&scheduler, MediaStore::new(dir.path()), &storage(24, "never"))
            .await
            .is_err());
        register(&scheduler, MediaStore::new(dir.path()), &storage(24, "0 0 * * * *"))
            .await
            .unwrap();
    }
}
