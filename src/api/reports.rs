/// User-facing report and warning endpoints
use crate::{
    admin::{ensure_reportable, Report, ReportCategory, ReportPriority, TargetRef, Warning},
    auth::AuthContext,
    context::AppContext,
    error::{KoiError, KoiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

/// Build report and warning routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/reports", post(submit_report))
        .route("/api/warnings", get(my_warnings))
        .route("/api/warnings/:id/acknowledge", put(acknowledge_warning))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitReportRequest {
    reported_entity_id: String,
    /// `event` or `user`
    reported_entity_model: String,
    category: String,
    description: String,
    priority: Option<String>,
}

/// File a report against an event or a user
async fn submit_report(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<SubmitReportRequest>,
) -> KoiResult<(StatusCode, Json<Report>)> {
    let reported = TargetRef::from_parts(&req.reported_entity_model, &req.reported_entity_id)?;
    let category = ReportCategory::from_str(&req.category)?;
    let priority = req
        .priority
        .as_deref()
        .map(ReportPriority::from_str)
        .transpose()?;

    ensure_reportable(auth.user_id(), &reported)?;
    if !ctx.target_resolver.exists(&reported).await? {
        return Err(KoiError::NotFound(format!(
            "Reported {} {} not found",
            reported.target_type(),
            reported.id()
        )));
    }

    let report = ctx
        .report_manager
        .submit(auth.user_id(), reported, category, &req.description, priority)
        .await?;
    tracing::info!(
        "Report {} filed by {} against {} {}",
        report.id,
        report.reporter_id,
        report.reported.target_type(),
        report.reported.id()
    );

    Ok((StatusCode::CREATED, Json(report)))
}

async fn my_warnings(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> KoiResult<Json<Vec<Warning>>> {
    Ok(Json(ctx.warning_manager.list_for_user(auth.user_id()).await?))
}

async fn acknowledge_warning(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> KoiResult<Json<Warning>> {
    let warning = ctx
        .warning_manager
        .acknowledge(&id, auth.user_id())
        .await?;
    Ok(Json(warning))
}
