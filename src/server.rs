/// Router assembly and the listening loop
use crate::{
    api::middleware::{check_account_status, track_metrics},
    context::AppContext,
    error::{KoiError, KoiResult},
    rate_limit::rate_limit_middleware,
};
use axum::{
    http::{header, Method},
    middleware, Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the full application with state and middleware applied
///
/// Layers run outside-in: tracing, compression, CORS, request metrics,
/// rate limiting, then the account lockout check closest to the handlers.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(crate::api::routes())
        .fallback(unknown_route)
        .with_state(ctx.clone())
        .layer(middleware::from_fn_with_state(ctx.clone(), check_account_status))
        .layer(middleware::from_fn_with_state(ctx, rate_limit_middleware))
        .layer(middleware::from_fn(track_metrics))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

async fn unknown_route() -> KoiError {
    KoiError::NotFound("Endpoint not found".to_string())
}

/// Bind and serve until ctrl-c
pub async fn serve(ctx: AppContext) -> KoiResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);
    let service_url = ctx.service_url();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| KoiError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;
    info!("Event Koi listening on {} ({})", addr, service_url);

    axum::serve(listener, build_router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| KoiError::Internal(format!("Server error: {}", e)))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
