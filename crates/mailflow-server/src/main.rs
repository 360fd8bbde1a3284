//! Mailflow - mailing list service entry point

use anyhow::Result;
use mailflow_api::auth::AppState;
use mailflow_common::config::Config;
use mailflow_core::{MailingDispatcher, SmtpRelayTransport, StatsService};
use mailflow_storage::db::DatabasePool;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting Mailflow...");

    // Load configuration
    let config = Config::load()?;

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;
    info!("Database connection established");

    // Run migrations
    db_pool.migrate().await?;
    info!("Database migrations completed");

    // Outbound SMTP relay
    let transport: Arc<dyn mailflow_core::MailTransport> =
        Arc::new(SmtpRelayTransport::from_config(&config.smtp)?);
    info!("SMTP relay configured for {}:{}", config.smtp.host, config.smtp.port);

    let state = Arc::new(AppState {
        db_pool: db_pool.clone(),
        transport: transport.clone(),
        dispatcher: MailingDispatcher::new(db_pool.clone(), transport),
        stats: StatsService::new(db_pool),
        secret_key: config.server.secret_key.clone(),
        hostname: config.server.hostname.clone(),
        from_address: config.smtp.from_address.clone(),
        stats_cache_secs: config.api.stats_cache_secs,
    });

    let app = mailflow_api::create_router(state);

    let addr = format!("{}:{}", config.server.bind_address, config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Mailflow shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    } else {
        info!("Shutdown signal received");
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mailflow=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .init();
}
