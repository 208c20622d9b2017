//! Background job scheduler.
//!
//! Registers the recurring monitoring job at server startup: every active
//! monitoring profile gets a pipeline run once a day, highest priority
//! first. A profile's failure is logged and never stops the sweep.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    pipeline: Arc<mktmon_pipeline::PipelineContext>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_monitoring_job(&scheduler, pool, pipeline).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the daily monitoring sweep (05:30 UTC).
async fn register_monitoring_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    pipeline: Arc<mktmon_pipeline::PipelineContext>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async("0 30 5 * * *", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let pipeline = Arc::clone(&pipeline);

        Box::pin(async move {
            tracing::info!("scheduler: starting daily monitoring sweep");
            run_monitoring_sweep(&pool, &pipeline).await;
            tracing::info!("scheduler: daily monitoring sweep complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Run the pipeline for every active profile, highest priority first.
async fn run_monitoring_sweep(pool: &PgPool, pipeline: &mktmon_pipeline::PipelineContext) {
    let profiles = match mktmon_db::list_active_monitoring_profiles(pool).await {
        Ok(profiles) => profiles,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to load monitoring profiles");
            return;
        }
    };

    if profiles.is_empty() {
        tracing::info!("scheduler: no active monitoring profiles; skipping");
        return;
    }

    for profile in &profiles {
        match mktmon_pipeline::run_search(pool, pipeline, profile.public_id).await {
            Ok(summary) if summary.status == "completed" => {
                tracing::info!(
                    profile = %profile.name,
                    run = %summary.search_run_id,
                    documents = summary.documents_created,
                    events = summary.events_created,
                    "scheduler: profile run completed"
                );
            }
            Ok(summary) => {
                tracing::warn!(
                    profile = %profile.name,
                    run = %summary.search_run_id,
                    error = summary.error.as_deref().unwrap_or("unknown"),
                    "scheduler: profile run failed"
                );
            }
            Err(e) => {
                tracing::error!(
                    profile = %profile.name,
                    error = %e,
                    "scheduler: profile run could not be recorded"
                );
            }
        }
    }
}
