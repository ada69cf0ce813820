use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use sheetapi::config::Config;
use sheetapi::quota::{QuotaResetJob, SystemClock};
use sheetapi::sheets::GoogleSheetsConnector;
use sheetapi::store::{PgStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(&config.log_level)
        }))
        .init();

    tracing::info!("Starting sheetapi");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Migrations applied");

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let sheets = Arc::new(GoogleSheetsConnector::new(
        &config.sheets_base_url,
        config.google.clone(),
    )?);

    if config.google.is_none() {
        tracing::warn!("GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET not set, expired access tokens cannot be refreshed");
    }

    let addr = SocketAddr::new(config.host, config.port);
    let sweep_interval = config.quota_sweep_interval;
    let (app, state) = sheetapi::build_app(store.clone(), sheets, config);

    let quota_job = QuotaResetJob::new(store, Arc::new(SystemClock), sweep_interval).start();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let housekeeping =
        sheetapi::worker::spawn_housekeeping(state, shutdown_rx, Duration::from_secs(60));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let _ = shutdown_tx.send(true);
    let _ = housekeeping.await;
    quota_job.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
