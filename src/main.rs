use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use learning_backend::{
    config::{Config, LogFormat},
    database::{
        pool::{create_pool, run_migrations},
        postgres::PgStore,
    },
    routes,
    services::{classifier_service::HttpClassifier, scheduler_service::start_difficulty_job},
    AppState,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("learning_backend=info,tower_http=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = ?e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let pool = create_pool(&config).await?;
    run_migrations(&pool).await?;
    info!("Database ready");

    let store = Arc::new(PgStore::new(pool));
    let classifier = Arc::new(HttpClassifier::new(
        config.classifier_url.clone(),
        Duration::from_secs(config.classifier_timeout_secs),
    )?);

    let cron = config.difficulty_cron.clone();
    let strategy = config.difficulty_strategy;
    let app_state = AppState::new(config, store, classifier);

    let mut scheduler =
        start_difficulty_job(app_state.difficulty_service.clone(), &cron, strategy).await?;

    let addr: SocketAddr = app_state.config.server_address.parse()?;
    let app = routes::router(app_state);

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = ?e, "Scheduler did not shut down cleanly");
    }
    Ok(())
}
