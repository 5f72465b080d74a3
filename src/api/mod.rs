/// API routes and handlers
pub mod admin;
pub mod auth;
pub mod events;
pub mod health;
pub mod middleware;
pub mod reports;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(events::routes())
        .merge(reports::routes())
        .merge(admin::routes())
}
