/// Signup, login and session endpoints
use crate::{
    account::{LoginRequest, Role, SessionResponse, SignupRequest, User},
    auth::{issue_token, AuthContext},
    context::AppContext,
    error::{KoiError, KoiResult},
};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
}

fn session_for(ctx: &AppContext, user: User) -> KoiResult<SessionResponse> {
    let (token, expires_at) = issue_token(
        &user,
        &ctx.config.authentication.jwt_secret,
        ctx.config.authentication.session_ttl_hours,
    )?;
    Ok(SessionResponse {
        token,
        expires_at,
        user,
    })
}

/// Create an account and open a session
async fn signup(
    State(ctx): State<AppContext>,
    Json(req): Json<SignupRequest>,
) -> KoiResult<(StatusCode, Json<SessionResponse>)> {
    req.validate()?;

    let role = match req.role.as_deref() {
        None => Role::User,
        Some(role) => Role::from_str(role)?,
    };
    if role == Role::Admin {
        return Err(KoiError::Validation(
            "Admin accounts cannot be self-registered".to_string(),
        ));
    }

    let user = ctx
        .account_manager
        .create_account(&req.name, &req.email, &req.password, role)
        .await?;
    tracing::info!("signup: created {} account {}", user.role.as_str(), user.id);

    Ok((StatusCode::CREATED, Json(session_for(&ctx, user)?)))
}

/// Log in with email and password
///
/// Banned and suspended accounts are refused with the stored reason.
async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> KoiResult<Json<SessionResponse>> {
    req.validate()?;

    let user = ctx.account_manager.login(&req.email, &req.password).await?;
    Ok(Json(session_for(&ctx, user)?))
}

/// Current user
async fn me(auth: AuthContext) -> Json<User> {
    Json(auth.user)
}
