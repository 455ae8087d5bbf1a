use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use super::rule_engine::AlertEngine;

/// Start the periodic alert scan. A tick that fires while a scan is still
/// running joins it via the engine's single-flight guard instead of piling
/// up a second scan.
pub async fn start_alert_scheduler(
    engine: Arc<AlertEngine>,
    cron: &str,
) -> Result<JobScheduler, Box<dyn std::error::Error>> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_uuid, _l| {
        let engine = engine.clone();

        Box::pin(async move {
            let summary = engine.run_scan().await;
            info!(
                created = summary.created,
                candidates = summary.candidates,
                "Periodic alert scan finished"
            );
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Alert scheduler started");
    Ok(scheduler)
}
