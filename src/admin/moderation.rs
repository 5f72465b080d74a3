/// Moderation service
///
/// Every admin state transition goes through `ModerationManager`. Each
/// operation is two-phase: the primary record is mutated first and must
/// succeed, then one audit entry is appended. A failed append is logged and
/// counted but never turns a successful mutation into an error; the outcome
/// is reported through `AuditOutcome`.
use crate::{
    account::{AccountManager, AccountStatus, Role, User},
    admin::{
        audit::{Actor, AdminAction, AuditLog, LogSeverity, NewAdminLog},
        reports::{Report, ReportManager, ReportStatus, ResolutionAction},
        warnings::{NewWarning, Warning, WarningManager},
        TargetRef,
    },
    error::{KoiError, KoiResult},
    events::{
        ApprovalStatus, Category, CategoryManager, CategoryStatus, Event, EventManager,
        RequestedChange,
    },
    metrics,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{error, info};

const DEFAULT_REACTIVATION_REASON: &str = "Reactivated by admin";

/// Event moderation actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Approve,
    Reject,
    RequestChanges,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Approve => "approve",
            EventAction::Reject => "reject",
            EventAction::RequestChanges => "request_changes",
        }
    }

    /// Accepts both the verb and the resulting approval status
    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "approve" | "approved" => Ok(EventAction::Approve),
            "reject" | "rejected" => Ok(EventAction::Reject),
            "request_changes" | "changes_requested" => Ok(EventAction::RequestChanges),
            _ => Err(KoiError::Validation(format!("Invalid event action: {}", s))),
        }
    }
}

/// Payload accompanying an event moderation action
#[derive(Debug, Clone, Default)]
pub struct EventModeration {
    pub reason: Option<String>,
    pub requested_changes: Vec<RequestedChange>,
}

/// Report closing decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportDecision {
    Resolved,
    Dismissed,
}

impl ReportDecision {
    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "resolved" | "resolve" => Ok(ReportDecision::Resolved),
            "dismissed" | "dismiss" => Ok(ReportDecision::Dismissed),
            _ => Err(KoiError::Validation(format!("Invalid report action: {}", s))),
        }
    }

    fn status(&self) -> ReportStatus {
        match self {
            ReportDecision::Resolved => ReportStatus::Resolved,
            ReportDecision::Dismissed => ReportStatus::Dismissed,
        }
    }
}

/// Category review decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryDecision {
    Approve,
    Reject,
}

impl CategoryDecision {
    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "approve" | "approved" => Ok(CategoryDecision::Approve),
            "reject" | "rejected" => Ok(CategoryDecision::Reject),
            _ => Err(KoiError::Validation(format!("Invalid category action: {}", s))),
        }
    }
}

/// Result of the audit append that follows a primary mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum AuditOutcome {
    /// Entry written, carries the log id
    Recorded(String),
    /// Entry lost, carries the error message
    Failed(String),
}

impl AuditOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, AuditOutcome::Recorded(_))
    }
}

/// A successfully moderated record together with its audit outcome
#[derive(Debug, Clone)]
pub struct Moderated<T> {
    pub record: T,
    pub audit: AuditOutcome,
}

/// Moderation manager
#[derive(Clone)]
pub struct ModerationManager {
    accounts: AccountManager,
    events: EventManager,
    categories: CategoryManager,
    reports: ReportManager,
    warnings: WarningManager,
    audit: AuditLog,
}

impl ModerationManager {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            accounts: AccountManager::new(db.clone()),
            events: EventManager::new(db.clone()),
            categories: CategoryManager::new(db.clone()),
            reports: ReportManager::new(db.clone()),
            warnings: WarningManager::new(db.clone()),
            audit: AuditLog::new(db),
        }
    }

    /// Approve, reject or request changes on a submitted event
    pub async fn moderate_event(
        &self,
        actor: &Actor,
        event_id: &str,
        action: EventAction,
        payload: EventModeration,
    ) -> KoiResult<Moderated<Event>> {
        let reason = non_empty(payload.reason.as_deref());

        match action {
            EventAction::Approve => {}
            EventAction::Reject => {
                if reason.is_none() {
                    return Err(KoiError::Validation(
                        "A reason is required to reject an event".to_string(),
                    ));
                }
            }
            EventAction::RequestChanges => {
                if reason.is_none() {
                    return Err(KoiError::Validation(
                        "A reason is required to request changes".to_string(),
                    ));
                }
                if payload.requested_changes.is_empty() {
                    return Err(KoiError::Validation(
                        "At least one requested change is required".to_string(),
                    ));
                }
                if payload
                    .requested_changes
                    .iter()
                    .any(|c| c.field.trim().is_empty() || c.comment.trim().is_empty())
                {
                    return Err(KoiError::Validation(
                        "Requested changes need a field and a comment".to_string(),
                    ));
                }
            }
        }

        let event = self.events.get_event(event_id).await?;
        let previous = event.approval_status;

        // Re-approving an approved event is accepted and logged again
        let allowed = match action {
            EventAction::Approve => matches!(
                previous,
                ApprovalStatus::Pending
                    | ApprovalStatus::ChangesRequested
                    | ApprovalStatus::Approved
            ),
            EventAction::Reject | EventAction::RequestChanges => matches!(
                previous,
                ApprovalStatus::Pending | ApprovalStatus::ChangesRequested
            ),
        };
        if !allowed {
            return Err(KoiError::Conflict(format!(
                "Cannot {} an event that is {}",
                action.as_str().replace('_', " "),
                previous.as_str()
            )));
        }

        let (status, audit_action, severity, new_changes) = match action {
            EventAction::Approve => (
                ApprovalStatus::Approved,
                AdminAction::EventApproved,
                LogSeverity::Low,
                Vec::new(),
            ),
            EventAction::Reject => (
                ApprovalStatus::Rejected,
                AdminAction::EventRejected,
                LogSeverity::Medium,
                Vec::new(),
            ),
            EventAction::RequestChanges => (
                ApprovalStatus::ChangesRequested,
                AdminAction::EventChangesRequested,
                LogSeverity::Low,
                payload
                    .requested_changes
                    .into_iter()
                    .map(|c| RequestedChange {
                        field: c.field.trim().to_string(),
                        comment: c.comment.trim().to_string(),
                        resolved: false,
                    })
                    .collect(),
            ),
        };

        let stored_reason = match action {
            EventAction::Approve => None,
            _ => reason.as_deref(),
        };
        let updated = self
            .events
            .set_approval(&event, status, stored_reason, &new_changes)
            .await?;

        info!(
            "Event {} moved from {} to {} by {}",
            updated.id,
            previous.as_str(),
            status.as_str(),
            actor.id
        );

        let details = json!({
            "previousStatus": previous.as_str(),
            "newStatus": status.as_str(),
            "requestedChanges": new_changes,
        });
        let target = TargetRef::Event(updated.id.clone());
        Ok(self
            .record(actor, updated, audit_action, target, reason, severity, details)
            .await)
    }

    /// Activate, suspend or ban a user
    pub async fn set_user_status(
        &self,
        actor: &Actor,
        user_id: &str,
        status: AccountStatus,
        reason: Option<&str>,
    ) -> KoiResult<Moderated<User>> {
        let reason = non_empty(reason);

        let (audit_action, severity, reason) = match status {
            AccountStatus::Banned | AccountStatus::Suspended => {
                let Some(reason) = reason else {
                    return Err(KoiError::Validation(format!(
                        "A reason is required to set status {}",
                        status.as_str()
                    )));
                };
                if status == AccountStatus::Banned {
                    (AdminAction::UserBanned, LogSeverity::Critical, reason)
                } else {
                    (AdminAction::UserSuspended, LogSeverity::High, reason)
                }
            }
            AccountStatus::Active => (
                AdminAction::UserActivated,
                LogSeverity::Low,
                reason.unwrap_or_else(|| DEFAULT_REACTIVATION_REASON.to_string()),
            ),
            AccountStatus::Restricted => {
                return Err(KoiError::Validation(
                    "Status restricted cannot be set by an admin".to_string(),
                ));
            }
        };

        if user_id == actor.id {
            return Err(KoiError::Forbidden(
                "You cannot change your own account status".to_string(),
            ));
        }

        let user = self.accounts.get_user(user_id).await?;
        if user.is_admin() && status != AccountStatus::Active {
            return Err(KoiError::Forbidden(
                "Admin accounts cannot be suspended or banned".to_string(),
            ));
        }

        let previous = user.account_status;
        let updated = self
            .accounts
            .update_status(&user, status, Some(reason.as_str()), &actor.id)
            .await?;

        info!(
            "User {} status changed from {} to {} by {}",
            updated.id,
            previous.as_str(),
            status.as_str(),
            actor.id
        );

        let details = json!({
            "previousStatus": previous.as_str(),
            "newStatus": status.as_str(),
        });
        let target = TargetRef::User(updated.id.clone());
        Ok(self
            .record(actor, updated, audit_action, target, Some(reason), severity, details)
            .await)
    }

    /// Change a user's role; the last admin can never be demoted
    pub async fn set_user_role(
        &self,
        actor: &Actor,
        user_id: &str,
        role: Role,
    ) -> KoiResult<Moderated<User>> {
        if user_id == actor.id {
            return Err(KoiError::Forbidden(
                "You cannot change your own role".to_string(),
            ));
        }

        let previous = self.accounts.get_user(user_id).await?.role;
        let updated = self.accounts.update_role(user_id, role).await?;

        info!(
            "User {} role changed from {} to {} by {}",
            updated.id,
            previous.as_str(),
            role.as_str(),
            actor.id
        );

        let details = json!({
            "previousRole": previous.as_str(),
            "newRole": role.as_str(),
        });
        let target = TargetRef::User(updated.id.clone());
        Ok(self
            .record(
                actor,
                updated,
                AdminAction::UserRoleChanged,
                target,
                None,
                LogSeverity::High,
                details,
            )
            .await)
    }

    /// Issue a warning; the account status is left untouched
    pub async fn warn_user(
        &self,
        actor: &Actor,
        user_id: &str,
        warning: NewWarning,
    ) -> KoiResult<Moderated<Warning>> {
        if warning.reason.trim().is_empty() {
            return Err(KoiError::Validation(
                "A reason is required to warn a user".to_string(),
            ));
        }
        if warning.description.trim().is_empty() {
            return Err(KoiError::Validation(
                "A description is required to warn a user".to_string(),
            ));
        }
        if user_id == actor.id {
            return Err(KoiError::Forbidden("You cannot warn yourself".to_string()));
        }

        let user = self.accounts.get_user(user_id).await?;
        if let Some(report_id) = &warning.report_id {
            self.reports.get_report(report_id).await?;
        }

        let created = self.warnings.create(&user.id, &actor.id, warning).await?;

        info!(
            "User {} warned ({}) by {}",
            user.id,
            created.severity.as_str(),
            actor.id
        );

        let details = json!({
            "warningId": created.id,
            "severity": created.severity.as_str(),
            "category": created.category.as_str(),
            "reportId": created.report_id,
        });
        let severity = created.severity.audit_severity();
        let reason = Some(created.reason.clone());
        Ok(self
            .record(
                actor,
                created,
                AdminAction::UserWarned,
                TargetRef::User(user.id),
                reason,
                severity,
                details,
            )
            .await)
    }

    /// Start investigating a pending report
    pub async fn investigate_report(
        &self,
        actor: &Actor,
        report_id: &str,
    ) -> KoiResult<Moderated<Report>> {
        let report = self.reports.get_report(report_id).await?;
        if report.status != ReportStatus::Pending {
            return Err(KoiError::Conflict(format!(
                "Report {} is {}, only pending reports can be investigated",
                report.id,
                report.status.as_str()
            )));
        }

        let updated = self.reports.mark_investigating(&report).await?;
        let target = TargetRef::Report(updated.id.clone());
        let details = json!({ "reported": updated.reported });
        Ok(self
            .record(
                actor,
                updated,
                AdminAction::ReportInvestigating,
                target,
                None,
                LogSeverity::Low,
                details,
            )
            .await)
    }

    /// Resolve or dismiss an open report
    pub async fn resolve_report(
        &self,
        actor: &Actor,
        report_id: &str,
        decision: ReportDecision,
        admin_notes: Option<&str>,
        resolution_action: Option<ResolutionAction>,
    ) -> KoiResult<Moderated<Report>> {
        let report = self.reports.get_report(report_id).await?;
        if report.status.is_terminal() {
            return Err(KoiError::Conflict(format!(
                "Report {} has already been {}",
                report.id,
                report.status.as_str()
            )));
        }

        let admin_notes = non_empty(admin_notes);
        let updated = self
            .reports
            .close(
                &report,
                decision.status(),
                admin_notes.as_deref(),
                resolution_action,
                &actor.id,
            )
            .await?;

        info!(
            "Report {} {} by {}",
            updated.id,
            updated.status.as_str(),
            actor.id
        );

        let (audit_action, severity) = match decision {
            ReportDecision::Resolved => (AdminAction::ReportResolved, LogSeverity::Medium),
            ReportDecision::Dismissed => (AdminAction::ReportDismissed, LogSeverity::Low),
        };
        let details = json!({
            "previousStatus": report.status.as_str(),
            "resolutionAction": updated.resolution_action.map(|a| a.as_str()),
            "reported": updated.reported,
        });
        let target = TargetRef::Report(updated.id.clone());
        Ok(self
            .record(actor, updated, audit_action, target, admin_notes, severity, details)
            .await)
    }

    /// Approve or reject a proposed category
    pub async fn moderate_category(
        &self,
        actor: &Actor,
        category_id: &str,
        decision: CategoryDecision,
        rejection_reason: Option<&str>,
    ) -> KoiResult<Moderated<Category>> {
        let category = self.categories.get_category(category_id).await?;
        if category.status != CategoryStatus::Pending {
            return Err(KoiError::Conflict(format!(
                "Category {} has already been {}",
                category.name,
                category.status.as_str()
            )));
        }

        let (status, audit_action, reason) = match decision {
            CategoryDecision::Approve => {
                (CategoryStatus::Approved, AdminAction::CategoryApproved, None)
            }
            CategoryDecision::Reject => (
                CategoryStatus::Rejected,
                AdminAction::CategoryRejected,
                non_empty(rejection_reason),
            ),
        };

        let updated = self
            .categories
            .set_review(&category, status, reason.as_deref(), &actor.id)
            .await?;

        info!(
            "Category {} {} by {}",
            updated.name,
            status.as_str(),
            actor.id
        );

        let details = json!({ "name": updated.name });
        let target = TargetRef::Category(updated.id.clone());
        Ok(self
            .record(actor, updated, audit_action, target, reason, LogSeverity::Low, details)
            .await)
    }

    /// Phase two: append the audit entry, never failing the operation
    #[allow(clippy::too_many_arguments)]
    async fn record<T>(
        &self,
        actor: &Actor,
        record: T,
        action: AdminAction,
        target: TargetRef,
        reason: Option<String>,
        severity: LogSeverity,
        details: serde_json::Value,
    ) -> Moderated<T> {
        metrics::record_moderation_action(action.as_str());

        let entry = NewAdminLog {
            admin: Some(actor.clone()),
            action,
            target: target.clone(),
            reason,
            details: Some(details),
            severity,
        };

        let audit = match self.audit.append(entry).await {
            Ok(log) => AuditOutcome::Recorded(log.id),
            Err(e) => {
                error!(
                    action = action.as_str(),
                    target_type = target.target_type(),
                    target_id = target.id(),
                    "Failed to write audit log entry: {}",
                    e
                );
                metrics::record_audit_failure();
                AuditOutcome::Failed(e.to_string())
            }
        };

        Moderated { record, audit }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
