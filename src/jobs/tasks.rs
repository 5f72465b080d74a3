/// Background task implementations
use crate::{
    admin::{AdminAction, LogSeverity, NewAdminLog, TargetRef},
    context::AppContext,
    db,
    error::{KoiError, KoiResult},
    metrics,
};
use chrono::{Duration, Utc};
use serde_json::json;

/// Expire active warnings older than the configured TTL
///
/// Each expiry is recorded as a system action with no admin attached.
pub async fn expire_warnings(ctx: &AppContext) -> KoiResult<usize> {
    let ttl_days = ctx.config.moderation.warning_ttl_days;
    let cutoff = Duration::try_days(ttl_days)
        .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        .ok_or_else(|| {
            KoiError::Validation(format!("Warning TTL of {} days is out of range", ttl_days))
        })?;

    let expired = ctx.warning_manager.expire_older_than(cutoff).await?;

    for warning_id in &expired {
        let entry = NewAdminLog {
            admin: None,
            action: AdminAction::WarningExpired,
            target: TargetRef::Warning(warning_id.clone()),
            reason: Some(format!("Expired after {} days", ttl_days)),
            details: Some(json!({ "ttlDays": ttl_days })),
            severity: LogSeverity::Low,
        };
        if let Err(e) = ctx.audit_log.append(entry).await {
            tracing::error!(
                warning_id = %warning_id,
                "Failed to write audit log entry for expired warning: {}",
                e
            );
            metrics::record_audit_failure();
        }
    }

    Ok(expired.len())
}

/// Health check - verify the database answers
pub async fn health_check(ctx: &AppContext) -> KoiResult<()> {
    db::test_connection(&ctx.db).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::Role,
        admin::{AuditLogFilter, NewWarning, WarningCategory, WarningSeverity, WarningStatus},
        config::{
            AuthConfig, LoggingConfig, ModerationConfig, RateLimitConfig, ServerConfig,
            ServiceConfig, StorageConfig,
        },
    };

    async fn context() -> AppContext {
        let config = ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 0,
                version: "test".to_string(),
            },
            storage: StorageConfig {
                data_directory: "./data".into(),
                database: ":memory:".into(),
            },
            authentication: AuthConfig {
                jwt_secret: "x".repeat(32),
                session_ttl_hours: 1,
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                requests_per_second: 50,
            },
            moderation: ModerationConfig {
                warning_ttl_days: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        };
        AppContext::with_pool(config, db::create_memory_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_expire_warnings_logs_system_action() {
        let ctx = context().await;
        let admin = ctx
            .account_manager
            .create_account("Admin", "admin@example.edu", "password123", Role::Admin)
            .await
            .unwrap();
        let user = ctx
            .account_manager
            .create_account("User", "user@example.edu", "password123", Role::User)
            .await
            .unwrap();

        let warning = ctx
            .warning_manager
            .create(
                &user.id,
                &admin.id,
                NewWarning {
                    reason: "Late cancellation".to_string(),
                    description: "Cancelled three events last minute".to_string(),
                    severity: WarningSeverity::Minor,
                    category: WarningCategory::PolicyViolation,
                    report_id: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(expire_warnings(&ctx).await.unwrap(), 0);

        sqlx::query("UPDATE warnings SET created_at = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::days(31))
            .bind(&warning.id)
            .execute(&ctx.db)
            .await
            .unwrap();

        assert_eq!(expire_warnings(&ctx).await.unwrap(), 1);
        assert_eq!(
            ctx.warning_manager.get_warning(&warning.id).await.unwrap().status,
            WarningStatus::Expired
        );

        let logs = ctx
            .audit_log
            .list(
                &AuditLogFilter {
                    action: Some(AdminAction::WarningExpired),
                    ..Default::default()
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].admin_id, None);
        assert_eq!(logs[0].target, TargetRef::Warning(warning.id));
    }

    #[tokio::test]
    async fn test_expire_warnings_rejects_out_of_range_ttl() {
        let mut ctx = context().await;
        let mut config = (*ctx.config).clone();
        config.moderation.warning_ttl_days = i64::MAX;
        ctx.config = std::sync::Arc::new(config);

        let err = expire_warnings(&ctx).await.unwrap_err();
        assert!(matches!(err, KoiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let ctx = context().await;
        health_check(&ctx).await.unwrap();
    }
}
