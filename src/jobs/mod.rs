use crate::{context::AppContext, metrics};
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

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

        tokio::spawn(Self::warning_expiry_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Expire old warnings (runs every hour)
    async fn warning_expiry_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600));

        loop {
            interval.tick().await;
            info!("Running warning expiry");

            match tasks::expire_warnings(&scheduler.context).await {
                Ok(count) => {
                    metrics::record_background_job("warning_expiry", true);
                    if count > 0 {
                        info!("Expired {} warnings", count);
                    }
                }
                Err(e) => {
                    metrics::record_background_job("warning_expiry", false);
                    error!("Failed to expire warnings: {}", e);
                }
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            match tasks::health_check(&scheduler.context).await {
                Ok(_) => metrics::record_background_job("health_check", true),
                Err(e) => {
                    metrics::record_background_job("health_check", false);
                    error!("Health check failed: {}", e);
                }
            }
        }
    }
}
