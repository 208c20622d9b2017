use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "mktmon-cli")]
#[command(about = "Market monitoring command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sync the reference seed file into the database.
    Seed {
        /// Seed file path; defaults to MKTMON_SEED_PATH.
        path: Option<PathBuf>,
    },
    /// Execute the document pipeline for one monitoring profile.
    Run {
        /// Monitoring profile UUID.
        profile: Uuid,
    },
    /// Rank stored documents by semantic similarity to a query.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: i64,
        #[arg(long, default_value_t = 0.7)]
        threshold: f64,
    },
    /// List recent search runs.
    Runs {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = mktmon_core::load_app_config()?;
    let pool = mktmon_db::connect_pool(
        &config.database_url,
        mktmon_db::PoolConfig::from_app_config(&config),
    )
    .await?;
    mktmon_db::run_migrations(&pool).await?;

    match cli.command {
        Commands::Seed { path } => {
            let path = path.unwrap_or_else(|| config.seed_path.clone());
            let seed = mktmon_core::load_seed(&path)?;
            let summary = mktmon_db::sync_seed(&pool, &seed).await?;
            println!(
                "seeded {} brands, {} segments, {} geographies, {} event types",
                summary.brands, summary.segments, summary.geographies, summary.event_types
            );
        }
        Commands::Run { profile } => {
            let ctx = mktmon_pipeline::PipelineContext::from_config(&config)
                .map_err(|e| anyhow::anyhow!("pipeline setup failed: {e}"))?;
            let summary = mktmon_pipeline::run_search(&pool, &ctx, profile)
                .await
                .map_err(|e| anyhow::anyhow!("run bookkeeping failed: {e}"))?;

            println!("run {} finished: {}", summary.search_run_id, summary.status);
            println!(
                "  documents_created={} events_created={} execution_time_ms={}",
                summary.documents_created, summary.events_created, summary.execution_time_ms
            );
            if let Some(error) = summary.error {
                println!("  error: {error}");
            }
        }
        Commands::Search {
            query,
            limit,
            threshold,
        } => {
            let ai = mktmon_ai::AiClient::new(&mktmon_ai::AiConfig {
                api_key: config.ai_api_key.clone(),
                base_url: config.ai_base_url.clone(),
                chat_model: config.ai_chat_model.clone(),
                embed_model: config.ai_embed_model.clone(),
                timeout_secs: config.ai_timeout_secs,
            })?;

            let embedding = pgvector::Vector::from(ai.embed_one(&query).await?);
            let hits = mktmon_db::semantic_search(
                &pool,
                &embedding,
                threshold,
                limit.clamp(1, 50),
            )
            .await?;

            if hits.is_empty() {
                println!("no documents at or above similarity {threshold}");
            }
            for hit in hits {
                println!("{:.3}  {}  {}", hit.similarity, hit.title, hit.source_url);
            }
        }
        Commands::Runs { limit } => {
            let runs = mktmon_db::list_search_runs(&pool, limit.clamp(1, 200)).await?;
            for run in runs {
                println!(
                    "{}  {:<9}  docs={:<4} events={:<4} {}",
                    run.public_id,
                    run.status,
                    run.documents_created,
                    run.events_created,
                    run.error_message.unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
