/// Application context and dependency injection
use crate::{
    account::AccountManager,
    admin::{AuditLog, ModerationManager, ReportManager, TargetResolver, WarningManager},
    config::ServerConfig,
    db,
    error::{KoiError, KoiResult},
    events::{CategoryManager, EventManager, RegistrationManager},
    rate_limit::RateLimiter,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    // Events
    pub event_manager: Arc<EventManager>,
    pub category_manager: Arc<CategoryManager>,
    pub registration_manager: Arc<RegistrationManager>,
    // Admin & Moderation
    pub report_manager: Arc<ReportManager>,
    pub warning_manager: Arc<WarningManager>,
    pub audit_log: Arc<AuditLog>,
    pub moderation_manager: Arc<ModerationManager>,
    pub target_resolver: Arc<TargetResolver>,
    // Rate limiter
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> KoiResult<Self> {
        config.validate()?;

        if !config.storage.data_directory.exists() {
            tokio::fs::create_dir_all(&config.storage.data_directory)
                .await
                .map_err(|e| {
                    KoiError::Internal(format!(
                        "Failed to create directory {:?}: {}",
                        config.storage.data_directory, e
                    ))
                })?;
        }

        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        Ok(Self::with_pool(config, pool))
    }

    /// Build the context around an already migrated pool
    pub fn with_pool(config: ServerConfig, db: SqlitePool) -> Self {
        let account_manager = AccountManager::new(db.clone());
        let event_manager = EventManager::new(db.clone());
        let category_manager = CategoryManager::new(db.clone());
        let report_manager = ReportManager::new(db.clone());
        let warning_manager = WarningManager::new(db.clone());

        let target_resolver = TargetResolver::new(
            account_manager.clone(),
            event_manager.clone(),
            category_manager.clone(),
            report_manager.clone(),
            warning_manager.clone(),
        );

        Self {
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            config: Arc::new(config),
            account_manager: Arc::new(account_manager),
            event_manager: Arc::new(event_manager),
            category_manager: Arc::new(category_manager),
            registration_manager: Arc::new(RegistrationManager::new(db.clone())),
            report_manager: Arc::new(report_manager),
            warning_manager: Arc::new(warning_manager),
            audit_log: Arc::new(AuditLog::new(db.clone())),
            moderation_manager: Arc::new(ModerationManager::new(db.clone())),
            target_resolver: Arc::new(target_resolver),
            db,
        }
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
