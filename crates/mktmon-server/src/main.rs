mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(mktmon_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = mktmon_db::PoolConfig::from_app_config(&config);
    let pool = mktmon_db::connect_pool(&config.database_url, pool_config).await?;
    mktmon_db::run_migrations(&pool).await?;

    let pipeline = Arc::new(
        mktmon_pipeline::PipelineContext::from_config(&config)
            .map_err(|e| anyhow::anyhow!("pipeline setup failed: {e}"))?,
    );

    let ai = match mktmon_ai::AiClient::new(&mktmon_ai::AiConfig {
        api_key: config.ai_api_key.clone(),
        base_url: config.ai_base_url.clone(),
        chat_model: config.ai_chat_model.clone(),
        embed_model: config.ai_embed_model.clone(),
        timeout_secs: config.ai_timeout_secs,
    }) {
        Ok(client) => Some(Arc::new(client)),
        Err(mktmon_ai::AiError::MissingCredentials) => {
            tracing::warn!("MKTMON_AI_API_KEY not set; semantic search and extraction disabled");
            None
        }
        Err(e) => return Err(e.into()),
    };

    let _scheduler = scheduler::build_scheduler(pool.clone(), Arc::clone(&pipeline)).await?;

    let auth = AuthState::from_env(matches!(config.env, mktmon_core::Environment::Development))?;
    let app = build_app(
        AppState {
            pool,
            pipeline,
            ai,
        },
        auth,
        default_rate_limit_state(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
