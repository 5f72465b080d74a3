/// Report Management System
use crate::{
    admin::TargetRef,
    error::{KoiError, KoiResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

const REPORT_COLUMNS: &str = "id, reporter_id, reported_entity_id, reported_entity_model, category, \
                              description, status, priority, admin_notes, resolution_action, \
                              resolved_by, resolved_at, created_at, updated_at";

/// Report categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportCategory {
    Spam,
    Inappropriate,
    Harassment,
    Misleading,
    Fraud,
    Other,
}

impl ReportCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportCategory::Spam => "spam",
            ReportCategory::Inappropriate => "inappropriate",
            ReportCategory::Harassment => "harassment",
            ReportCategory::Misleading => "misleading",
            ReportCategory::Fraud => "fraud",
            ReportCategory::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "spam" => Ok(ReportCategory::Spam),
            "inappropriate" => Ok(ReportCategory::Inappropriate),
            "harassment" => Ok(ReportCategory::Harassment),
            "misleading" => Ok(ReportCategory::Misleading),
            "fraud" => Ok(ReportCategory::Fraud),
            "other" => Ok(ReportCategory::Other),
            _ => Err(KoiError::Validation(format!("Invalid report category: {}", s))),
        }
    }
}

/// Report priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl ReportPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPriority::Low => "low",
            ReportPriority::Medium => "medium",
            ReportPriority::High => "high",
            ReportPriority::Urgent => "urgent",
        }
    }

    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(ReportPriority::Low),
            "medium" => Ok(ReportPriority::Medium),
            "high" => Ok(ReportPriority::High),
            "urgent" => Ok(ReportPriority::Urgent),
            _ => Err(KoiError::Validation(format!("Invalid report priority: {}", s))),
        }
    }

    /// Priority assigned when the reporter does not pick one
    pub fn default_for(category: ReportCategory) -> Self {
        match category {
            ReportCategory::Harassment | ReportCategory::Fraud => ReportPriority::High,
            ReportCategory::Spam => ReportPriority::Low,
            _ => ReportPriority::Medium,
        }
    }
}

/// Report status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Investigating,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Investigating => "investigating",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Dismissed => "dismissed",
        }
    }

    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ReportStatus::Pending),
            "investigating" => Ok(ReportStatus::Investigating),
            "resolved" => Ok(ReportStatus::Resolved),
            "dismissed" => Ok(ReportStatus::Dismissed),
            _ => Err(KoiError::Validation(format!("Invalid report status: {}", s))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Resolved | ReportStatus::Dismissed)
    }
}

/// What was done about a resolved report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    NoAction,
    WarningIssued,
    ContentRemoved,
    UserSuspended,
    UserBanned,
}

impl ResolutionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionAction::NoAction => "no_action",
            ResolutionAction::WarningIssued => "warning_issued",
            ResolutionAction::ContentRemoved => "content_removed",
            ResolutionAction::UserSuspended => "user_suspended",
            ResolutionAction::UserBanned => "user_banned",
        }
    }

    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "no_action" => Ok(ResolutionAction::NoAction),
            "warning_issued" => Ok(ResolutionAction::WarningIssued),
            "content_removed" => Ok(ResolutionAction::ContentRemoved),
            "user_suspended" => Ok(ResolutionAction::UserSuspended),
            "user_banned" => Ok(ResolutionAction::UserBanned),
            _ => Err(KoiError::Validation(format!(
                "Invalid resolution action: {}",
                s
            ))),
        }
    }
}

/// Report record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub reporter_id: String,
    pub reported: TargetRef,
    pub category: ReportCategory,
    pub description: String,
    pub status: ReportStatus,
    pub priority: ReportPriority,
    pub admin_notes: Option<String>,
    pub resolution_action: Option<ResolutionAction>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Only events and other users can be reported
pub fn ensure_reportable(reporter_id: &str, reported: &TargetRef) -> KoiResult<()> {
    match reported {
        TargetRef::Event(_) => Ok(()),
        TargetRef::User(id) if id == reporter_id => Err(KoiError::Validation(
            "You cannot report yourself".to_string(),
        )),
        TargetRef::User(_) => Ok(()),
        other => Err(KoiError::Validation(format!(
            "Reports can only target events or users, not {}",
            other.target_type()
        ))),
    }
}

/// Report manager
#[derive(Clone)]
pub struct ReportManager {
    db: SqlitePool,
}

impl ReportManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// File a report against an event or a user
    ///
    /// The caller is responsible for checking that the target exists.
    pub async fn submit(
        &self,
        reporter_id: &str,
        reported: TargetRef,
        category: ReportCategory,
        description: &str,
        priority: Option<ReportPriority>,
    ) -> KoiResult<Report> {
        ensure_reportable(reporter_id, &reported)?;

        let description = description.trim();
        if description.is_empty() {
            return Err(KoiError::Validation(
                "Report description is required".to_string(),
            ));
        }

        let now = Utc::now();
        let report = Report {
            id: Uuid::new_v4().to_string(),
            reporter_id: reporter_id.to_string(),
            reported,
            category,
            description: description.to_string(),
            status: ReportStatus::Pending,
            priority: priority.unwrap_or_else(|| ReportPriority::default_for(category)),
            admin_notes: None,
            resolution_action: None,
            resolved_by: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO reports (id, reporter_id, reported_entity_id, reported_entity_model,
                                  category, description, status, priority, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&report.id)
        .bind(&report.reporter_id)
        .bind(report.reported.id())
        .bind(report.reported.target_type())
        .bind(report.category.as_str())
        .bind(&report.description)
        .bind(report.status.as_str())
        .bind(report.priority.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(report)
    }

    /// Get a report by id
    pub async fn get_report(&self, id: &str) -> KoiResult<Report> {
        self.find_report(id)
            .await?
            .ok_or_else(|| KoiError::NotFound(format!("Report {} not found", id)))
    }

    pub async fn find_report(&self, id: &str) -> KoiResult<Option<Report>> {
        let sql = format!("SELECT {} FROM reports WHERE id = ?1", REPORT_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.db).await?;
        row.as_ref().map(parse_report).transpose()
    }

    /// List reports, newest first
    pub async fn list_reports(
        &self,
        status: Option<ReportStatus>,
        limit: i64,
    ) -> KoiResult<Vec<Report>> {
        let sql = format!(
            "SELECT {} FROM reports
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC
             LIMIT ?2",
            REPORT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .fetch_all(&self.db)
            .await?;

        rows.iter().map(parse_report).collect()
    }

    /// Reports not yet resolved or dismissed
    pub async fn count_open(&self) -> KoiResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reports WHERE status IN ('pending', 'investigating')",
        )
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    /// Move a pending report to investigating
    pub async fn mark_investigating(&self, report: &Report) -> KoiResult<Report> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE reports SET status = 'investigating', updated_at = ?1
             WHERE id = ?2 AND status = 'pending'",
        )
        .bind(now)
        .bind(&report.id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(KoiError::Conflict(format!(
                "Report {} is no longer pending",
                report.id
            )));
        }

        let mut updated = report.clone();
        updated.status = ReportStatus::Investigating;
        updated.updated_at = now;
        Ok(updated)
    }

    /// Close an open report as resolved or dismissed
    ///
    /// The update only applies while the report is still open, so a
    /// concurrent close loses with `Conflict` instead of overwriting.
    pub async fn close(
        &self,
        report: &Report,
        status: ReportStatus,
        admin_notes: Option<&str>,
        resolution_action: Option<ResolutionAction>,
        resolved_by: &str,
    ) -> KoiResult<Report> {
        if !status.is_terminal() {
            return Err(KoiError::Validation(format!(
                "Cannot close a report as {}",
                status.as_str()
            )));
        }

        // Only resolved reports carry a resolution action
        let resolution_action = match status {
            ReportStatus::Resolved => Some(resolution_action.unwrap_or(ResolutionAction::NoAction)),
            _ => None,
        };

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE reports
             SET status = ?1, admin_notes = ?2, resolution_action = ?3,
                 resolved_by = ?4, resolved_at = ?5, updated_at = ?5
             WHERE id = ?6 AND status IN ('pending', 'investigating')",
        )
        .bind(status.as_str())
        .bind(admin_notes)
        .bind(resolution_action.map(|a| a.as_str()))
        .bind(resolved_by)
        .bind(now)
        .bind(&report.id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(KoiError::Conflict(format!(
                "Report {} has already been closed",
                report.id
            )));
        }

        let mut updated = report.clone();
        updated.status = status;
        updated.admin_notes = admin_notes.map(String::from);
        updated.resolution_action = resolution_action;
        updated.resolved_by = Some(resolved_by.to_string());
        updated.resolved_at = Some(now);
        updated.updated_at = now;
        Ok(updated)
    }
}

fn parse_report(row: &SqliteRow) -> KoiResult<Report> {
    let entity_id: String = row.try_get("reported_entity_id")?;
    let entity_model: String = row.try_get("reported_entity_model")?;
    let category: String = row.try_get("category")?;
    let status: String = row.try_get("status")?;
    let priority: String = row.try_get("priority")?;
    let resolution_action: Option<String> = row.try_get("resolution_action")?;

    Ok(Report {
        id: row.try_get("id")?,
        reporter_id: row.try_get("reporter_id")?,
        reported: TargetRef::from_parts(&entity_model, &entity_id)?,
        category: ReportCategory::from_str(&category)?,
        description: row.try_get("description")?,
        status: ReportStatus::from_str(&status)?,
        priority: ReportPriority::from_str(&priority)?,
        admin_notes: row.try_get("admin_notes")?,
        resolution_action: resolution_action
            .as_deref()
            .map(ResolutionAction::from_str)
            .transpose()?,
        resolved_by: row.try_get("resolved_by")?,
        resolved_at: row.try_get("resolved_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::{AccountManager, Role},
        db,
    };

    async fn setup() -> (ReportManager, String, String) {
        let pool = db::create_memory_pool().await.unwrap();
        let accounts = AccountManager::new(pool.clone());
        let reporter = accounts
            .create_account("Reporter", "reporter@example.edu", "password123", Role::User)
            .await
            .unwrap();
        let other = accounts
            .create_account("Other", "other@example.edu", "password123", Role::User)
            .await
            .unwrap();
        (ReportManager::new(pool), reporter.id, other.id)
    }

    #[test]
    fn test_default_priority() {
        assert_eq!(
            ReportPriority::default_for(ReportCategory::Harassment),
            ReportPriority::High
        );
        assert_eq!(
            ReportPriority::default_for(ReportCategory::Fraud),
            ReportPriority::High
        );
        assert_eq!(
            ReportPriority::default_for(ReportCategory::Spam),
            ReportPriority::Low
        );
        assert_eq!(
            ReportPriority::default_for(ReportCategory::Misleading),
            ReportPriority::Medium
        );
    }

    #[test]
    fn test_ensure_reportable() {
        assert!(ensure_reportable("u1", &TargetRef::Event("e1".to_string())).is_ok());
        assert!(ensure_reportable("u1", &TargetRef::User("u2".to_string())).is_ok());
        for target in [
            TargetRef::User("u1".to_string()),
            TargetRef::Category("missing".to_string()),
            TargetRef::Warning("missing".to_string()),
        ] {
            assert!(matches!(
                ensure_reportable("u1", &target),
                Err(KoiError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let (reports, reporter, _) = setup().await;

        let self_report = reports
            .submit(
                &reporter,
                TargetRef::User(reporter.clone()),
                ReportCategory::Other,
                "me",
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(self_report, KoiError::Validation(_)));

        let bad_target = reports
            .submit(
                &reporter,
                TargetRef::Category("cat-1".to_string()),
                ReportCategory::Other,
                "bad category",
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(bad_target, KoiError::Validation(_)));

        let empty = reports
            .submit(
                &reporter,
                TargetRef::Event("evt-1".to_string()),
                ReportCategory::Spam,
                "   ",
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(empty, KoiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_report_lifecycle() {
        let (reports, reporter, other) = setup().await;

        let report = reports
            .submit(
                &reporter,
                TargetRef::User(other.clone()),
                ReportCategory::Harassment,
                "Rude comments at the meetup",
                None,
            )
            .await
            .unwrap();
        assert_eq!(report.status, ReportStatus::Pending);
        assert_eq!(report.priority, ReportPriority::High);
        assert_eq!(reports.count_open().await.unwrap(), 1);

        let report = reports.mark_investigating(&report).await.unwrap();
        assert_eq!(report.status, ReportStatus::Investigating);
        assert!(matches!(
            reports.mark_investigating(&report).await.unwrap_err(),
            KoiError::Conflict(_)
        ));

        let closed = reports
            .close(
                &report,
                ReportStatus::Resolved,
                Some("Warned the user"),
                Some(ResolutionAction::WarningIssued),
                "admin-1",
            )
            .await
            .unwrap();
        assert_eq!(closed.resolved_by.as_deref(), Some("admin-1"));
        assert!(closed.resolved_at.is_some());

        let stored = reports.get_report(&report.id).await.unwrap();
        assert_eq!(stored.status, ReportStatus::Resolved);
        assert_eq!(stored.reported, TargetRef::User(other));
        assert_eq!(stored.resolution_action, Some(ResolutionAction::WarningIssued));
        assert_eq!(reports.count_open().await.unwrap(), 0);

        let again = reports
            .close(&stored, ReportStatus::Dismissed, None, None, "admin-2")
            .await
            .unwrap_err();
        assert!(matches!(again, KoiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_dismiss_drops_resolution_action() {
        let (reports, reporter, _) = setup().await;
        let report = reports
            .submit(
                &reporter,
                TargetRef::Event("evt-1".to_string()),
                ReportCategory::Spam,
                "Duplicate listing",
                Some(ReportPriority::Urgent),
            )
            .await
            .unwrap();
        assert_eq!(report.priority, ReportPriority::Urgent);

        reports
            .close(
                &report,
                ReportStatus::Dismissed,
                Some("no violation found"),
                Some(ResolutionAction::ContentRemoved),
                "admin-1",
            )
            .await
            .unwrap();

        let stored = reports.get_report(&report.id).await.unwrap();
        assert_eq!(stored.status, ReportStatus::Dismissed);
        assert_eq!(stored.resolution_action, None);
        assert_eq!(stored.admin_notes.as_deref(), Some("no violation found"));

        let dismissed = reports
            .list_reports(Some(ReportStatus::Dismissed), 10)
            .await
            .unwrap();
        assert_eq!(dismissed.len(), 1);
    }
}
