/// Event, registration, favorite and category endpoints
use crate::{
    auth::{AuthContext, OptionalAuthContext},
    context::AppContext,
    error::{KoiError, KoiResult},
    events::{ApprovalStatus, Category, Event, EventUpdate, NewEvent, Registration},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

const DEFAULT_EVENT_LIMIT: i64 = 50;
const MAX_EVENT_LIMIT: i64 = 200;

/// Build event routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/events", get(list_events).post(create_event))
        .route("/api/events/mine", get(my_events))
        .route("/api/events/:id", get(get_event))
        .route("/api/events/:id/resubmit", put(resubmit_event))
        .route(
            "/api/events/:id/register",
            post(register).delete(unregister),
        )
        .route("/api/registrations", get(my_registrations))
        .route(
            "/api/events/:id/favorite",
            post(add_favorite).delete(remove_favorite),
        )
        .route("/api/favorites", get(my_favorites))
        .route("/api/categories", get(list_categories).post(propose_category))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListEventsQuery {
    category_id: Option<String>,
    limit: Option<i64>,
}

/// Event with its registration count
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventView {
    #[serde(flatten)]
    event: Event,
    registration_count: i64,
}

/// Approved events, soonest first
async fn list_events(
    State(ctx): State<AppContext>,
    Query(query): Query<ListEventsQuery>,
) -> KoiResult<Json<Vec<Event>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .clamp(1, MAX_EVENT_LIMIT);
    let events = ctx
        .event_manager
        .list_events(ApprovalStatus::Approved, query.category_id.as_deref(), limit)
        .await?;
    Ok(Json(events))
}

/// Submit an event for review
async fn create_event(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<NewEvent>,
) -> KoiResult<(StatusCode, Json<Event>)> {
    if !auth.user.role.can_organize() {
        return Err(KoiError::Forbidden(
            "Only organizers can submit events".to_string(),
        ));
    }

    let event = ctx.event_manager.submit_event(auth.user_id(), req).await?;
    tracing::info!("Event {} submitted by {}", event.id, auth.user_id());
    Ok((StatusCode::CREATED, Json(event)))
}

async fn my_events(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> KoiResult<Json<Vec<Event>>> {
    Ok(Json(ctx.event_manager.list_by_organizer(auth.user_id()).await?))
}

/// Get one event
///
/// Events that are not approved are only visible to their organizer and to
/// admins; everyone else gets `NotFound`.
async fn get_event(
    State(ctx): State<AppContext>,
    auth: OptionalAuthContext,
    Path(id): Path<String>,
) -> KoiResult<Json<EventView>> {
    let event = ctx.event_manager.get_event(&id).await?;

    if !event.is_public() {
        let visible = auth
            .auth
            .as_ref()
            .map(|a| a.user.is_admin() || a.user.id == event.organizer_id)
            .unwrap_or(false);
        if !visible {
            return Err(KoiError::NotFound(format!("Event {} not found", id)));
        }
    }

    let registration_count = ctx.registration_manager.count_registrations(&event.id).await?;
    Ok(Json(EventView {
        event,
        registration_count,
    }))
}

/// Resubmit after changes were requested
async fn resubmit_event(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(update): Json<EventUpdate>,
) -> KoiResult<Json<Event>> {
    let event = ctx
        .event_manager
        .resubmit(auth.user_id(), &id, update)
        .await?;
    Ok(Json(event))
}

async fn register(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> KoiResult<(StatusCode, Json<Registration>)> {
    let event = ctx.event_manager.get_event(&id).await?;
    let registration = ctx
        .registration_manager
        .register(&event, auth.user_id())
        .await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

async fn unregister(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> KoiResult<StatusCode> {
    ctx.registration_manager
        .unregister(&id, auth.user_id())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn my_registrations(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> KoiResult<Json<Vec<Event>>> {
    Ok(Json(
        ctx.registration_manager
            .registered_events(auth.user_id())
            .await?,
    ))
}

async fn add_favorite(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> KoiResult<StatusCode> {
    let event = ctx.event_manager.get_event(&id).await?;
    ctx.registration_manager
        .add_favorite(&event, auth.user_id())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_favorite(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> KoiResult<StatusCode> {
    ctx.registration_manager
        .remove_favorite(&id, auth.user_id())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn my_favorites(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> KoiResult<Json<Vec<Event>>> {
    Ok(Json(
        ctx.registration_manager
            .favorite_events(auth.user_id())
            .await?,
    ))
}

/// Active categories
async fn list_categories(State(ctx): State<AppContext>) -> KoiResult<Json<Vec<Category>>> {
    Ok(Json(ctx.category_manager.list_active().await?))
}

#[derive(Debug, Deserialize)]
struct ProposeCategoryRequest {
    name: String,
    description: Option<String>,
}

/// Propose a category; it stays inactive until reviewed
async fn propose_category(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<ProposeCategoryRequest>,
) -> KoiResult<(StatusCode, Json<Category>)> {
    if !auth.user.role.can_organize() {
        return Err(KoiError::Forbidden(
            "Only organizers can propose categories".to_string(),
        ));
    }

    let category = ctx
        .category_manager
        .propose(&req.name, req.description.as_deref(), auth.user_id())
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}
