//! The orchestrator: one run, three stages, every transition persisted.

use std::time::Instant;

use mktmon_db::{search_runs, SearchRunRow};
use sqlx::PgPool;
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::stages;

/// The fixed stage sequence. Stage rows are created and completed in this
/// order; a failure stops the sequence where it happened.
pub const STAGE_ORDER: [&str; 3] = ["source_hunter", "content_fetcher", "document_processor"];

/// Terminal description of one run, successful or not.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub search_run_id: Uuid,
    pub run_id: i64,
    pub status: String,
    pub documents_created: i32,
    pub events_created: i32,
    pub execution_time_ms: i64,
    pub error: Option<String>,
}

impl RunSummary {
    fn from_row(row: &SearchRunRow, execution_time_ms: i64) -> Self {
        Self {
            search_run_id: row.public_id,
            run_id: row.id,
            status: row.status.clone(),
            documents_created: row.documents_created,
            events_created: row.events_created,
            execution_time_ms,
            error: row.error_message.clone(),
        }
    }
}

/// Executes the full pipeline for one monitoring profile.
///
/// The run row is created first (status `running`), then the profile and
/// its prompt are loaded — a missing lookup fails the run fast. Each stage
/// gets a `running` stage row before it executes and a terminal update
/// after; a stage error marks the stage and the run `failed` and aborts the
/// remaining stages. Pipeline failures are reported in the returned
/// summary, not as `Err`.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] only when the bookkeeping itself fails —
/// at that point there is no trustworthy run row to report.
pub async fn run_search(
    pool: &PgPool,
    ctx: &PipelineContext,
    monitoring_profile_id: Uuid,
) -> Result<RunSummary, PipelineError> {
    let started = Instant::now();

    let run = search_runs::create_search_run(pool, "monitoring", Some(monitoring_profile_id))
        .await?;
    tracing::info!(run = %run.public_id, profile = %monitoring_profile_id, "search run started");

    // Fail fast on a missing profile or prompt.
    let profile = match mktmon_db::get_monitoring_profile(pool, monitoring_profile_id).await {
        Ok(profile) => profile,
        Err(mktmon_db::DbError::NotFound) => {
            let message = format!("monitoring profile {monitoring_profile_id} not found");
            return abort_run(pool, run.id, started, &message).await;
        }
        Err(e) => return Err(e.into()),
    };

    let prompt = match mktmon_db::get_prompt_by_id(pool, profile.prompt_id).await {
        Ok(prompt) => prompt,
        Err(mktmon_db::DbError::NotFound) => {
            let message = format!("prompt {} not found for profile {}", profile.prompt_id, profile.name);
            return abort_run(pool, run.id, started, &message).await;
        }
        Err(e) => return Err(e.into()),
    };

    let filters = mktmon_db::get_profile_filters(pool, profile.id).await?;
    let sources = mktmon_db::list_active_sources(pool).await?;

    // Stage 1: source hunter.
    let hunt_input = stages::HuntInput {
        prompt_template: prompt.template.clone(),
        date_range_days: profile.date_range_days,
        search_run_id: run.id,
        segment_names: filters.segments.iter().map(|s| s.name.clone()).collect(),
        geography_names: filters.geographies.iter().map(|g| g.name.clone()).collect(),
        sources,
    };

    let stage = search_runs::create_run_stage(pool, run.id, "source_hunter").await?;
    let hunt = match stages::source_hunter::run(pool, ctx, &hunt_input).await {
        Ok(outcome) => {
            let processed = i32::try_from(outcome.documents_created).unwrap_or(i32::MAX);
            search_runs::complete_run_stage(pool, stage.id, processed, &outcome.metadata())
                .await?;
            search_runs::add_run_totals(pool, run.id, processed, 0).await?;
            outcome
        }
        Err(e) => {
            let message = e.to_string();
            search_runs::fail_run_stage(pool, stage.id, &message).await?;
            return abort_run(pool, run.id, started, &message).await;
        }
    };

    // Stage 2: content fetcher.
    let stage = search_runs::create_run_stage(pool, run.id, "content_fetcher").await?;
    match stages::content_fetcher::run(pool, ctx, &hunt.document_ids).await {
        Ok(outcome) => {
            search_runs::complete_run_stage(
                pool,
                stage.id,
                outcome.documents_processed(),
                &outcome.metadata(),
            )
            .await?;
        }
        Err(e) => {
            let message = e.to_string();
            search_runs::fail_run_stage(pool, stage.id, &message).await?;
            return abort_run(pool, run.id, started, &message).await;
        }
    }

    // Stage 3: document processor. It receives every hunted id and skips the
    // ones whose fetch failed, so fetch failures stay visible in its metadata.
    let stage = search_runs::create_run_stage(pool, run.id, "document_processor").await?;
    match stages::document_processor::run(pool, ctx, &hunt.document_ids, run.id).await {
        Ok(outcome) => {
            search_runs::complete_run_stage(
                pool,
                stage.id,
                outcome.documents_processed(),
                &outcome.metadata(),
            )
            .await?;
            let events = i32::try_from(outcome.events_created).unwrap_or(i32::MAX);
            search_runs::add_run_totals(pool, run.id, 0, events).await?;
        }
        Err(e) => {
            let message = e.to_string();
            search_runs::fail_run_stage(pool, stage.id, &message).await?;
            return abort_run(pool, run.id, started, &message).await;
        }
    }

    let execution_time_ms = elapsed_ms(started);
    search_runs::complete_search_run(pool, run.id, execution_time_ms).await?;

    let row = search_runs::get_search_run_by_id(pool, run.id).await?;
    tracing::info!(
        run = %row.public_id,
        documents = row.documents_created,
        events = row.events_created,
        execution_time_ms,
        "search run completed"
    );

    Ok(RunSummary::from_row(&row, execution_time_ms))
}

async fn abort_run(
    pool: &PgPool,
    run_id: i64,
    started: Instant,
    message: &str,
) -> Result<RunSummary, PipelineError> {
    tracing::error!(run_id, error = %message, "search run failed");
    search_runs::fail_search_run(pool, run_id, message).await?;
    let row = search_runs::get_search_run_by_id(pool, run_id).await?;
    Ok(RunSummary::from_row(&row, elapsed_ms(started)))
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}
