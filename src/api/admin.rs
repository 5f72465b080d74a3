/// Admin API Endpoints
///
/// Every route requires an authenticated admin (`AdminAuthContext`). State
/// changes go through the moderation service; the responses carry the
/// updated record only, the audit outcome is not part of the contract.
use crate::{
    account::{AccountStatus, Role, User},
    admin::{
        AdminAction, AdminLog, AuditLogFilter, CategoryDecision, EventAction, EventModeration,
        NewWarning, Report, ReportDecision, ReportStatus, ResolutionAction, TargetRef, Warning,
        WarningCategory, WarningSeverity,
    },
    auth::AdminAuthContext,
    context::AppContext,
    error::KoiResult,
    events::{ApprovalStatus, Category, CategoryStatus, Event, RequestedChange},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;

fn list_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

/// Build admin API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        // Stats and listings
        .route("/admin/stats", get(get_stats))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/warnings", get(list_user_warnings))
        .route("/admin/events/pending", get(list_pending_events))
        .route("/admin/reports", get(list_reports))
        .route("/admin/categories/pending", get(list_pending_categories))
        .route("/admin/logs", get(list_logs))
        // Moderation
        .route("/admin/events/:id/approval", put(moderate_event))
        .route("/admin/users/:id/status", put(set_user_status))
        .route("/admin/users/:id/role", put(set_user_role))
        .route("/admin/users/:id/warn", post(warn_user))
        .route("/admin/reports/:id/investigate", put(investigate_report))
        .route("/admin/reports/:id/resolve", put(resolve_report))
        .route("/admin/categories/:id/moderate", put(moderate_category))
}

// ============================================================================
// Moderation
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventApprovalRequest {
    approval_status: String,
    rejection_reason: Option<String>,
    #[serde(default)]
    requested_changes: Vec<RequestedChange>,
}

async fn moderate_event(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(id): Path<String>,
    Json(req): Json<EventApprovalRequest>,
) -> KoiResult<Json<Event>> {
    let action = EventAction::from_str(&req.approval_status)?;
    let moderated = ctx
        .moderation_manager
        .moderate_event(
            &auth.actor,
            &id,
            action,
            EventModeration {
                reason: req.rejection_reason,
                requested_changes: req.requested_changes,
            },
        )
        .await?;
    Ok(Json(moderated.record))
}

#[derive(Debug, Deserialize)]
struct UserStatusRequest {
    status: String,
    reason: Option<String>,
}

async fn set_user_status(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(id): Path<String>,
    Json(req): Json<UserStatusRequest>,
) -> KoiResult<Json<User>> {
    let status = AccountStatus::from_str(&req.status)?;
    let moderated = ctx
        .moderation_manager
        .set_user_status(&auth.actor, &id, status, req.reason.as_deref())
        .await?;
    Ok(Json(moderated.record))
}

#[derive(Debug, Deserialize)]
struct UserRoleRequest {
    role: String,
}

async fn set_user_role(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(id): Path<String>,
    Json(req): Json<UserRoleRequest>,
) -> KoiResult<Json<User>> {
    let role = Role::from_str(&req.role)?;
    let moderated = ctx
        .moderation_manager
        .set_user_role(&auth.actor, &id, role)
        .await?;
    Ok(Json(moderated.record))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WarnUserRequest {
    reason: String,
    description: String,
    severity: String,
    category: String,
    report_id: Option<String>,
}

async fn warn_user(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(id): Path<String>,
    Json(req): Json<WarnUserRequest>,
) -> KoiResult<(StatusCode, Json<Warning>)> {
    let warning = NewWarning {
        reason: req.reason,
        description: req.description,
        severity: WarningSeverity::from_str(&req.severity)?,
        category: WarningCategory::from_str(&req.category)?,
        report_id: req.report_id,
    };
    let moderated = ctx
        .moderation_manager
        .warn_user(&auth.actor, &id, warning)
        .await?;
    Ok((StatusCode::CREATED, Json(moderated.record)))
}

async fn investigate_report(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(id): Path<String>,
) -> KoiResult<Json<Report>> {
    let moderated = ctx
        .moderation_manager
        .investigate_report(&auth.actor, &id)
        .await?;
    Ok(Json(moderated.record))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveReportRequest {
    action: String,
    admin_notes: Option<String>,
    resolution_action: Option<String>,
}

async fn resolve_report(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(id): Path<String>,
    Json(req): Json<ResolveReportRequest>,
) -> KoiResult<Json<Report>> {
    let decision = ReportDecision::from_str(&req.action)?;
    let resolution_action = req
        .resolution_action
        .as_deref()
        .map(ResolutionAction::from_str)
        .transpose()?;
    let moderated = ctx
        .moderation_manager
        .resolve_report(
            &auth.actor,
            &id,
            decision,
            req.admin_notes.as_deref(),
            resolution_action,
        )
        .await?;
    Ok(Json(moderated.record))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModerateCategoryRequest {
    action: String,
    rejection_reason: Option<String>,
}

async fn moderate_category(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(id): Path<String>,
    Json(req): Json<ModerateCategoryRequest>,
) -> KoiResult<Json<Category>> {
    let decision = CategoryDecision::from_str(&req.action)?;
    let moderated = ctx
        .moderation_manager
        .moderate_category(&auth.actor, &id, decision, req.rejection_reason.as_deref())
        .await?;
    Ok(Json(moderated.record))
}

// ============================================================================
// Listings
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    total_users: i64,
    pending_events: i64,
    open_reports: i64,
    active_warnings: i64,
}

async fn get_stats(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
) -> KoiResult<Json<StatsResponse>> {
    Ok(Json(StatsResponse {
        total_users: ctx.account_manager.count_users().await?,
        pending_events: ctx
            .event_manager
            .count_by_status(ApprovalStatus::Pending)
            .await?,
        open_reports: ctx.report_manager.count_open().await?,
        active_warnings: ctx.warning_manager.count_active().await?,
    }))
}

#[derive(Debug, Deserialize)]
struct ListUsersQuery {
    role: Option<String>,
    status: Option<String>,
    limit: Option<i64>,
}

async fn list_users(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Query(query): Query<ListUsersQuery>,
) -> KoiResult<Json<Vec<User>>> {
    let role = query.role.as_deref().map(Role::from_str).transpose()?;
    let status = query
        .status
        .as_deref()
        .map(AccountStatus::from_str)
        .transpose()?;
    let users = ctx
        .account_manager
        .list_users(role, status, list_limit(query.limit))
        .await?;
    Ok(Json(users))
}

async fn list_user_warnings(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Path(id): Path<String>,
) -> KoiResult<Json<Vec<Warning>>> {
    ctx.account_manager.get_user(&id).await?;
    Ok(Json(ctx.warning_manager.list_for_user(&id).await?))
}

async fn list_pending_events(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
) -> KoiResult<Json<Vec<Event>>> {
    let events = ctx
        .event_manager
        .list_events(ApprovalStatus::Pending, None, MAX_LIST_LIMIT)
        .await?;
    Ok(Json(events))
}

#[derive(Debug, Deserialize)]
struct ListReportsQuery {
    status: Option<String>,
    limit: Option<i64>,
}

async fn list_reports(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Query(query): Query<ListReportsQuery>,
) -> KoiResult<Json<Vec<Report>>> {
    let status = query
        .status
        .as_deref()
        .map(ReportStatus::from_str)
        .transpose()?;
    let reports = ctx
        .report_manager
        .list_reports(status, list_limit(query.limit))
        .await?;
    Ok(Json(reports))
}

async fn list_pending_categories(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
) -> KoiResult<Json<Vec<Category>>> {
    Ok(Json(
        ctx.category_manager
            .list_by_status(CategoryStatus::Pending)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListLogsQuery {
    action: Option<String>,
    admin_id: Option<String>,
    target_type: Option<String>,
    target_id: Option<String>,
    limit: Option<i64>,
}

/// Audit log, newest first
async fn list_logs(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Query(query): Query<ListLogsQuery>,
) -> KoiResult<Json<Vec<AdminLog>>> {
    let target = match (&query.target_type, &query.target_id) {
        (Some(target_type), Some(target_id)) => {
            Some(TargetRef::from_parts(target_type, target_id)?)
        }
        _ => None,
    };
    let filter = AuditLogFilter {
        action: query
            .action
            .as_deref()
            .map(AdminAction::from_str)
            .transpose()?,
        admin_id: query.admin_id,
        target,
    };

    let logs = ctx
        .audit_log
        .list(&filter, list_limit(query.limit))
        .await?;
    Ok(Json(logs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_limit_bounds() {
        assert_eq!(list_limit(None), 50);
        assert_eq!(list_limit(Some(0)), 1);
        assert_eq!(list_limit(Some(10)), 10);
        assert_eq!(list_limit(Some(5000)), 200);
    }
}
