/// Barangay event registration service
///
/// Residents register for barangay events, confirm their contact number
/// with an SMS one-time code, and receive a QR credential that staff scan
/// at the venue after approving the registration.

mod api;
mod auth;
mod config;
mod context;
mod credentials;
mod db;
mod error;
mod events;
mod jobs;
mod metrics;
mod notify;
mod otp;
mod qr;
mod rate_limit;
mod registration;
mod revocation;
mod server;
mod storage;
#[cfg(test)]
mod test_support;

use config::ServerConfig;
use context::AppContext;
use error::AppResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration (reads .env first)
    let config = ServerConfig::from_env()?;

    // Initialize logging
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| "barangay_events=debug,tower_http=debug".into());
    let json = config.logging.json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.service.environment,
        "starting barangay event registration service"
    );

    error::set_expose_internal_details(!config.service.is_production());

    // Pool, migrations and directories; any failure here is fatal
    let ctx = Arc::new(AppContext::new(config).await.map_err(|e| {
        tracing::error!("Failed to initialize application: {}", e);
        e
    })?);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}
