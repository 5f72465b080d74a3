/// Authentication extractors and utilities
///
/// Sessions are HS256 JWTs. The token only carries the user id; role and
/// account status are re-read from the database on every request so a ban
/// or demotion takes effect immediately.
use crate::{
    account::{AccountStatus, User},
    admin::Actor,
    api::middleware::extract_bearer_token,
    context::AppContext,
    error::{KoiError, KoiResult},
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issue a session token for a user
pub fn issue_token(
    user: &User,
    jwt_secret: &str,
    ttl_hours: i64,
) -> KoiResult<(String, DateTime<Utc>)> {
    let now = Utc::now();
    let expires_at = Duration::try_hours(ttl_hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| KoiError::Internal(format!("Session TTL {}h is out of range", ttl_hours)))?;
    let claims = Claims {
        sub: user.id.clone(),
        role: user.role.as_str().to_string(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| KoiError::Internal(format!("Failed to sign token: {}", e)))?;

    Ok((token, expires_at))
}

/// Verify a JWT token with full validation
pub fn verify_jwt_token(token: &str, jwt_secret: &str) -> KoiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Allow some clock skew (1 minute)
    validation.leeway = 60;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!("JWT verification failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    KoiError::Authentication("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    KoiError::Authentication("Invalid token signature".to_string())
                }
                _ => KoiError::Authentication(format!("Invalid token: {}", e)),
            }
        })
}

/// Resolve the user behind a bearer token
pub async fn authenticate_token(ctx: &AppContext, token: &str) -> KoiResult<User> {
    let claims = verify_jwt_token(token, &ctx.config.authentication.jwt_secret)?;
    ctx.account_manager
        .find_user(&claims.sub)
        .await?
        .ok_or_else(|| KoiError::Authentication("Account no longer exists".to_string()))
}

/// Authenticated context - extracts and validates session from request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
}

impl AuthContext {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = KoiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        // Already loaded by the account status middleware
        if let Some(user) = parts.extensions.get::<User>() {
            return Ok(AuthContext { user: user.clone() });
        }

        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| KoiError::Authentication("Missing authorization header".to_string()))?;

        let user = authenticate_token(state, &token).await?;
        user.ensure_usable()?;

        Ok(AuthContext { user })
    }
}

/// Optional authenticated context - does not fail if no auth provided
#[derive(Debug, Clone)]
pub struct OptionalAuthContext {
    pub auth: Option<AuthContext>,
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalAuthContext {
    type Rejection = KoiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await.ok();
        Ok(OptionalAuthContext { auth })
    }
}

/// Admin authentication context - requires admin role
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub user: User,
    pub actor: Actor,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = KoiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let AuthContext { user } = AuthContext::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            tracing::warn!("AdminAuthContext: User {} is not an admin", user.id);
            return Err(KoiError::Forbidden("Admin role required".to_string()));
        }
        if user.account_status != AccountStatus::Active {
            tracing::warn!(
                "AdminAuthContext: admin {} is {}",
                user.id,
                user.account_status.as_str()
            );
            return Err(KoiError::Forbidden(
                "Admin actions require an active account".to_string(),
            ));
        }

        let actor = Actor {
            id: user.id.clone(),
            ip_address: client_ip(&parts.headers),
            user_agent: parts
                .headers
                .get("user-agent")
                .and_then(|h| h.to_str().ok())
                .map(String::from),
        };

        Ok(AdminAuthContext { user, actor })
    }
}

/// Client address as reported by the fronting proxy
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|h| h.to_str().ok()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
