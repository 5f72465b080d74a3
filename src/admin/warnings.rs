/// Warnings issued to users
use crate::{
    admin::audit::LogSeverity,
    error::{KoiError, KoiResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

const WARNING_COLUMNS: &str = "id, user_id, issued_by, reason, description, severity, category, \
                               status, report_id, acknowledged_at, created_at";

/// Warning severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningSeverity {
    Minor,
    Major,
    Severe,
}

impl WarningSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningSeverity::Minor => "minor",
            WarningSeverity::Major => "major",
            WarningSeverity::Severe => "severe",
        }
    }

    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "minor" => Ok(WarningSeverity::Minor),
            "major" => Ok(WarningSeverity::Major),
            "severe" => Ok(WarningSeverity::Severe),
            _ => Err(KoiError::Validation(format!("Invalid warning severity: {}", s))),
        }
    }

    /// Severity of the audit entry recorded for this warning
    pub fn audit_severity(&self) -> LogSeverity {
        match self {
            WarningSeverity::Minor => LogSeverity::Low,
            WarningSeverity::Major => LogSeverity::Medium,
            WarningSeverity::Severe => LogSeverity::High,
        }
    }
}

/// Warning category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCategory {
    Spam,
    Harassment,
    InappropriateContent,
    PolicyViolation,
    Other,
}

impl WarningCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCategory::Spam => "spam",
            WarningCategory::Harassment => "harassment",
            WarningCategory::InappropriateContent => "inappropriate_content",
            WarningCategory::PolicyViolation => "policy_violation",
            WarningCategory::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "spam" => Ok(WarningCategory::Spam),
            "harassment" => Ok(WarningCategory::Harassment),
            "inappropriate_content" => Ok(WarningCategory::InappropriateContent),
            "policy_violation" => Ok(WarningCategory::PolicyViolation),
            "other" => Ok(WarningCategory::Other),
            _ => Err(KoiError::Validation(format!("Invalid warning category: {}", s))),
        }
    }
}

/// Warning status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningStatus {
    Active,
    Acknowledged,
    Expired,
}

impl WarningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningStatus::Active => "active",
            WarningStatus::Acknowledged => "acknowledged",
            WarningStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "active" => Ok(WarningStatus::Active),
            "acknowledged" => Ok(WarningStatus::Acknowledged),
            "expired" => Ok(WarningStatus::Expired),
            _ => Err(KoiError::Validation(format!("Invalid warning status: {}", s))),
        }
    }
}

/// Warning record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub id: String,
    pub user_id: String,
    pub issued_by: String,
    pub reason: String,
    pub description: String,
    pub severity: WarningSeverity,
    pub category: WarningCategory,
    pub status: WarningStatus,
    pub report_id: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields of a warning being issued
#[derive(Debug, Clone)]
pub struct NewWarning {
    pub reason: String,
    pub description: String,
    pub severity: WarningSeverity,
    pub category: WarningCategory,
    pub report_id: Option<String>,
}

/// Warning manager
#[derive(Clone)]
pub struct WarningManager {
    db: SqlitePool,
}

impl WarningManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Store a new active warning
    pub async fn create(
        &self,
        user_id: &str,
        issued_by: &str,
        new: NewWarning,
    ) -> KoiResult<Warning> {
        let warning = Warning {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            issued_by: issued_by.to_string(),
            reason: new.reason.trim().to_string(),
            description: new.description.trim().to_string(),
            severity: new.severity,
            category: new.category,
            status: WarningStatus::Active,
            report_id: new.report_id,
            acknowledged_at: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO warnings (id, user_id, issued_by, reason, description, severity,
                                   category, status, report_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&warning.id)
        .bind(&warning.user_id)
        .bind(&warning.issued_by)
        .bind(&warning.reason)
        .bind(&warning.description)
        .bind(warning.severity.as_str())
        .bind(warning.category.as_str())
        .bind(warning.status.as_str())
        .bind(&warning.report_id)
        .bind(warning.created_at)
        .execute(&self.db)
        .await?;

        Ok(warning)
    }

    pub async fn get_warning(&self, id: &str) -> KoiResult<Warning> {
        let sql = format!("SELECT {} FROM warnings WHERE id = ?1", WARNING_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.db).await?;
        match row {
            Some(row) => parse_warning(&row),
            None => Err(KoiError::NotFound(format!("Warning {} not found", id))),
        }
    }

    /// All warnings for a user, newest first
    pub async fn list_for_user(&self, user_id: &str) -> KoiResult<Vec<Warning>> {
        let sql = format!(
            "SELECT {} FROM warnings WHERE user_id = ?1 ORDER BY created_at DESC",
            WARNING_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&self.db).await?;
        rows.iter().map(parse_warning).collect()
    }

    /// Acknowledge an active warning on behalf of its recipient
    pub async fn acknowledge(&self, warning_id: &str, user_id: &str) -> KoiResult<Warning> {
        let warning = self.get_warning(warning_id).await?;

        if warning.user_id != user_id {
            return Err(KoiError::Forbidden(
                "You can only acknowledge your own warnings".to_string(),
            ));
        }
        if warning.status != WarningStatus::Active {
            return Err(KoiError::Conflict(format!(
                "Warning is already {}",
                warning.status.as_str()
            )));
        }

        let now = Utc::now();
        self.mark_acknowledged(warning_id, now).await?;

        Ok(Warning {
            status: WarningStatus::Acknowledged,
            acknowledged_at: Some(now),
            ..warning
        })
    }

    /// Flip an active warning to acknowledged; `Conflict` if it is no longer active
    async fn mark_acknowledged(&self, warning_id: &str, now: DateTime<Utc>) -> KoiResult<()> {
        let result = sqlx::query(
            "UPDATE warnings SET status = 'acknowledged', acknowledged_at = ?1
             WHERE id = ?2 AND status = 'active'",
        )
        .bind(now)
        .bind(warning_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(KoiError::Conflict(format!(
                "Warning {} is no longer active",
                warning_id
            )));
        }
        Ok(())
    }

    /// Expire active warnings issued before `cutoff`, returning their ids
    pub async fn expire_older_than(&self, cutoff: DateTime<Utc>) -> KoiResult<Vec<String>> {
        let mut tx = self.db.begin().await?;

        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM warnings WHERE status = 'active' AND created_at < ?1",
        )
        .bind(cutoff)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE warnings SET status = 'expired' WHERE status = 'active' AND created_at < ?1",
        )
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ids)
    }

    pub async fn count_active(&self) -> KoiResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM warnings WHERE status = 'active'")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}

fn parse_warning(row: &SqliteRow) -> KoiResult<Warning> {
    let severity: String = row.try_get("severity")?;
    let category: String = row.try_get("category")?;
    let status: String = row.try_get("status")?;

    Ok(Warning {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        issued_by: row.try_get("issued_by")?,
        reason: row.try_get("reason")?,
        description: row.try_get("description")?,
        severity: WarningSeverity::from_str(&severity)?,
        category: WarningCategory::from_str(&category)?,
        status: WarningStatus::from_str(&status)?,
        report_id: row.try_get("report_id")?,
        acknowledged_at: row.try_get("acknowledged_at")?,
        created_at: row.try_get("created_at")?,
    })
}
