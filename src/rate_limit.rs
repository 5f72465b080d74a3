/// Rate Limiting System
use crate::{
    config::RateLimitConfig,
    context::AppContext,
    error::{KoiError, KoiResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc};

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiter manager
///
/// Anonymous traffic gets a fifth of the authenticated quota.
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    authenticated: Arc<DirectLimiter>,
    unauthenticated: Arc<DirectLimiter>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let auth_rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let unauth_rps =
            NonZeroU32::new(config.requests_per_second / 5).unwrap_or(NonZeroU32::MIN);

        Self {
            enabled: config.enabled,
            authenticated: Arc::new(GovernorLimiter::direct(
                Quota::per_second(auth_rps).allow_burst(auth_rps),
            )),
            unauthenticated: Arc::new(GovernorLimiter::direct(
                Quota::per_second(unauth_rps).allow_burst(unauth_rps),
            )),
        }
    }

    /// Check rate limit for a request
    pub fn check(&self, authenticated: bool) -> KoiResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let limiter = if authenticated {
            &self.authenticated
        } else {
            &self.unauthenticated
        };
        limiter.check().map_err(|_| KoiError::RateLimitExceeded)
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, KoiError> {
    let has_auth_header = request.headers().contains_key("authorization");

    if let Err(e) = ctx.rate_limiter.check(has_auth_header) {
        tracing::warn!(
            "Rate limit exceeded for {} {}",
            request.method(),
            request.uri().path()
        );
        return Err(e);
    }

    Ok(next.run(request).await)
}
