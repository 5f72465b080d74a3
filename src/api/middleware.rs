/// Authentication and account status middleware
use crate::{
    auth::authenticate_token, context::AppContext, error::KoiError, metrics,
};
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Account status enforcement middleware
///
/// Banned and suspended accounts are blocked on every authenticated request,
/// with the stored reason in the error, whatever their role. The loaded user
/// is stashed in the request extensions for the extractors.
pub async fn check_account_status(
    State(ctx): State<AppContext>,
    mut req: Request,
    next: Next,
) -> Result<Response, KoiError> {
    if let Some(token) = extract_bearer_token(req.headers()) {
        if let Ok(user) = authenticate_token(&ctx, &token).await {
            user.ensure_usable()?;
            req.extensions_mut().insert(user);
        }
    }

    Ok(next.run(req).await)
}

/// Count requests and their latency
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    metrics::record_http_request(
        &method,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}
