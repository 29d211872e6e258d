use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::DifficultyStrategy;
use crate::error::{Error, Result};
use crate::services::difficulty_service::DifficultyService;

/// Register the periodic difficulty recalculation and start the scheduler.
/// `cron` uses the six-field form with seconds, e.g. `0 0 3 * * *`.
pub async fn start_difficulty_job(
    service: DifficultyService,
    cron: &str,
    strategy: DifficultyStrategy,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| Error::Scheduler(format!("{:?}", e)))?;

    let job = Job::new_async(cron, move |_id, _scheduler| {
        let service = service.clone();
        Box::pin(async move {
            tracing::info!(?strategy, "Running scheduled difficulty recalculation");
            service.run_scheduled(strategy).await;
        })
    })
    .map_err(|e| Error::Scheduler(format!("Invalid schedule '{}': {:?}", cron, e)))?;

    scheduler
        .add(job)
        .await
        .map_err(|e| Error::Scheduler(format!("{:?}", e)))?;
    scheduler
        .start()
        .await
        .map_err(|e| Error::Scheduler(format!("{:?}", e)))?;

    tracing::info!(cron, ?strategy, "Difficulty scheduler started");
    Ok(scheduler)
}
