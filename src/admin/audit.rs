/// Append-only audit log of admin actions
use crate::{
    admin::TargetRef,
    error::{KoiError, KoiResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

const LOG_COLUMNS: &str = "id, admin_id, action, target_type, target_id, reason, details, \
                           severity, ip_address, user_agent, created_at";

/// Logged admin actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    EventApproved,
    EventRejected,
    EventChangesRequested,
    UserBanned,
    UserSuspended,
    UserActivated,
    UserWarned,
    UserRoleChanged,
    ReportInvestigating,
    ReportResolved,
    ReportDismissed,
    CategoryApproved,
    CategoryRejected,
    WarningExpired,
}

impl AdminAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::EventApproved => "event_approved",
            AdminAction::EventRejected => "event_rejected",
            AdminAction::EventChangesRequested => "event_changes_requested",
            AdminAction::UserBanned => "user_banned",
            AdminAction::UserSuspended => "user_suspended",
            AdminAction::UserActivated => "user_activated",
            AdminAction::UserWarned => "user_warned",
            AdminAction::UserRoleChanged => "user_role_changed",
            AdminAction::ReportInvestigating => "report_investigating",
            AdminAction::ReportResolved => "report_resolved",
            AdminAction::ReportDismissed => "report_dismissed",
            AdminAction::CategoryApproved => "category_approved",
            AdminAction::CategoryRejected => "category_rejected",
            AdminAction::WarningExpired => "warning_expired",
        }
    }

    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "event_approved" => Ok(AdminAction::EventApproved),
            "event_rejected" => Ok(AdminAction::EventRejected),
            "event_changes_requested" => Ok(AdminAction::EventChangesRequested),
            "user_banned" => Ok(AdminAction::UserBanned),
            "user_suspended" => Ok(AdminAction::UserSuspended),
            "user_activated" => Ok(AdminAction::UserActivated),
            "user_warned" => Ok(AdminAction::UserWarned),
            "user_role_changed" => Ok(AdminAction::UserRoleChanged),
            "report_investigating" => Ok(AdminAction::ReportInvestigating),
            "report_resolved" => Ok(AdminAction::ReportResolved),
            "report_dismissed" => Ok(AdminAction::ReportDismissed),
            "category_approved" => Ok(AdminAction::CategoryApproved),
            "category_rejected" => Ok(AdminAction::CategoryRejected),
            "warning_expired" => Ok(AdminAction::WarningExpired),
            _ => Err(KoiError::Validation(format!("Invalid admin action: {}", s))),
        }
    }
}

/// Audit entry severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl LogSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSeverity::Low => "low",
            LogSeverity::Medium => "medium",
            LogSeverity::High => "high",
            LogSeverity::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(LogSeverity::Low),
            "medium" => Ok(LogSeverity::Medium),
            "high" => Ok(LogSeverity::High),
            "critical" => Ok(LogSeverity::Critical),
            _ => Err(KoiError::Validation(format!("Invalid severity: {}", s))),
        }
    }
}

/// Who performed an action and from where
#[derive(Debug, Clone, Default)]
pub struct Actor {
    pub id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ip_address: None,
            user_agent: None,
        }
    }
}

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLog {
    pub id: String,
    /// None for system-originated actions
    pub admin_id: Option<String>,
    pub action: AdminAction,
    #[serde(flatten)]
    pub target: TargetRef,
    pub reason: Option<String>,
    pub details: Option<serde_json::Value>,
    pub severity: LogSeverity,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entry to append
#[derive(Debug, Clone)]
pub struct NewAdminLog {
    pub admin: Option<Actor>,
    pub action: AdminAction,
    pub target: TargetRef,
    pub reason: Option<String>,
    pub details: Option<serde_json::Value>,
    pub severity: LogSeverity,
}

/// Listing filter
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub action: Option<AdminAction>,
    pub admin_id: Option<String>,
    pub target: Option<TargetRef>,
}

/// Audit log store; entries are never updated or deleted
#[derive(Clone)]
pub struct AuditLog {
    db: SqlitePool,
}

impl AuditLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append an entry
    pub async fn append(&self, entry: NewAdminLog) -> KoiResult<AdminLog> {
        let (admin_id, ip_address, user_agent) = match entry.admin {
            Some(actor) => (Some(actor.id), actor.ip_address, actor.user_agent),
            None => (None, None, None),
        };

        let log = AdminLog {
            id: Uuid::new_v4().to_string(),
            admin_id,
            action: entry.action,
            target: entry.target,
            reason: entry.reason,
            details: entry.details,
            severity: entry.severity,
            ip_address,
            user_agent,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO admin_logs (id, admin_id, action, target_type, target_id, reason, details,
                                     severity, ip_address, user_agent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&log.id)
        .bind(&log.admin_id)
        .bind(log.action.as_str())
        .bind(log.target.target_type())
        .bind(log.target.id())
        .bind(&log.reason)
        .bind(log.details.as_ref().map(|d| d.to_string()))
        .bind(log.severity.as_str())
        .bind(&log.ip_address)
        .bind(&log.user_agent)
        .bind(log.created_at)
        .execute(&self.db)
        .await?;

        Ok(log)
    }

    /// Newest-first listing
    pub async fn list(&self, filter: &AuditLogFilter, limit: i64) -> KoiResult<Vec<AdminLog>> {
        let sql = format!(
            "SELECT {} FROM admin_logs
             WHERE (?1 IS NULL OR action = ?1)
               AND (?2 IS NULL OR admin_id = ?2)
               AND (?3 IS NULL OR (target_type = ?3 AND target_id = ?4))
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?5",
            LOG_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(filter.action.map(|a| a.as_str()))
            .bind(&filter.admin_id)
            .bind(filter.target.as_ref().map(|t| t.target_type()))
            .bind(filter.target.as_ref().map(|t| t.id().to_string()))
            .bind(limit)
            .fetch_all(&self.db)
            .await?;

        rows.iter().map(parse_log).collect()
    }

    /// Every entry recorded against one target
    pub async fn for_target(&self, target: &TargetRef) -> KoiResult<Vec<AdminLog>> {
        let filter = AuditLogFilter {
            target: Some(target.clone()),
            ..Default::default()
        };
        self.list(&filter, i64::MAX).await
    }
}

fn parse_log(row: &SqliteRow) -> KoiResult<AdminLog> {
    let action: String = row.try_get("action")?;
    let target_type: String = row.try_get("target_type")?;
    let target_id: String = row.try_get("target_id")?;
    let severity: String = row.try_get("severity")?;
    let details: Option<String> = row.try_get("details")?;

    Ok(AdminLog {
        id: row.try_get("id")?,
        admin_id: row.try_get("admin_id")?,
        action: AdminAction::from_str(&action)?,
        target: TargetRef::from_parts(&target_type, &target_id)?,
        reason: row.try_get("reason")?,
        details: details.and_then(|d| serde_json::from_str(&d).ok()),
        severity: LogSeverity::from_str(&severity)?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_and_filter() {
        let log = AuditLog::new(db::create_memory_pool().await.unwrap());

        let actor = Actor {
            id: "admin-1".to_string(),
            ip_address: Some("10.0.0.7".to_string()),
            user_agent: None,
        };
        log.append(NewAdminLog {
            admin: Some(actor.clone()),
            action: AdminAction::EventApproved,
            target: TargetRef::Event("evt-1".to_string()),
            reason: None,
            details: Some(json!({"previousStatus": "pending"})),
            severity: LogSeverity::Low,
        })
        .await
        .unwrap();
        log.append(NewAdminLog {
            admin: Some(actor),
            action: AdminAction::UserBanned,
            target: TargetRef::User("user-1".to_string()),
            reason: Some("spam".to_string()),
            details: None,
            severity: LogSeverity::Critical,
        })
        .await
        .unwrap();
        log.append(NewAdminLog {
            admin: None,
            action: AdminAction::WarningExpired,
            target: TargetRef::Warning("w-1".to_string()),
            reason: None,
            details: None,
            severity: LogSeverity::Low,
        })
        .await
        .unwrap();

        let all = log.list(&AuditLogFilter::default(), 50).await.unwrap();
        assert_eq!(all.len(), 3);

        let bans = log
            .list(
                &AuditLogFilter {
                    action: Some(AdminAction::UserBanned),
                    ..Default::default()
                },
                50,
            )
            .await
            .unwrap();
        assert_eq!(bans.len(), 1);
        assert_eq!(bans[0].severity, LogSeverity::Critical);
        assert_eq!(bans[0].reason.as_deref(), Some("spam"));

        let event_entries = log
            .for_target(&TargetRef::Event("evt-1".to_string()))
            .await
            .unwrap();
        assert_eq!(event_entries.len(), 1);
        assert_eq!(event_entries[0].ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(event_entries[0].details.as_ref().unwrap()["previousStatus"], "pending");

        let by_admin = log
            .list(
                &AuditLogFilter {
                    admin_id: Some("admin-1".to_string()),
                    ..Default::default()
                },
                50,
            )
            .await
            .unwrap();
        assert_eq!(by_admin.len(), 2);
    }

    #[test]
    fn test_action_names() {
        assert_eq!(AdminAction::EventChangesRequested.as_str(), "event_changes_requested");
        assert_eq!(
            AdminAction::from_str("report_dismissed").unwrap(),
            AdminAction::ReportDismissed
        );
        assert!(AdminAction::from_str("event_deleted").is_err());
    }

    #[test]
    fn test_log_serializes_flat_target() {
        let entry = AdminLog {
            id: "l1".to_string(),
            admin_id: None,
            action: AdminAction::ReportResolved,
            target: TargetRef::Report("r1".to_string()),
            reason: None,
            details: None,
            severity: LogSeverity::Medium,
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["targetType"], "report");
        assert_eq!(json["targetId"], "r1");
        assert_eq!(json["action"], "report_resolved");
    }
}
