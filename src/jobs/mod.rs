use std::{sync::Arc, time::Instant};
use tokio::time::{interval, Duration};
use tracing::{error, info};

use crate::{context::AppContext, metrics};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::revoked_token_cleanup_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Drop revocation entries for tokens past their expiry (runs every hour)
    async fn revoked_token_cleanup_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600));

        loop {
            interval.tick().await;
            let start = Instant::now();

            match tasks::cleanup_revoked_tokens(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired revocation entries", count);
                    }
                    metrics::record_background_job(
                        "revoked_token_cleanup",
                        "success",
                        start.elapsed().as_secs_f64(),
                    );
                }
                Err(e) => {
                    error!("Failed to clean up revoked tokens: {}", e);
                    metrics::record_background_job(
                        "revoked_token_cleanup",
                        "failure",
                        start.elapsed().as_secs_f64(),
                    );
                }
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;
            let start = Instant::now();

            let status = match tasks::health_check(&scheduler.context).await {
                Ok(()) => "success",
                Err(e) => {
                    error!("Health check failed: {}", e);
                    "failure"
                }
            };
            metrics::record_background_job("health_check", status, start.elapsed().as_secs_f64());
        }
    }
}
