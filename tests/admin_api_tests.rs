/// HTTP tests for the admin and user-facing API
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use event_koi::{
    account::{AccountStatus, Role, User},
    auth::issue_token,
    config::{
        AuthConfig, LoggingConfig, ModerationConfig, RateLimitConfig, ServerConfig,
        ServiceConfig, StorageConfig,
    },
    context::AppContext,
    db, server,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "integration-secret-that-is-long-enough";

struct TestApp {
    ctx: AppContext,
    router: Router,
    admin_token: String,
}

impl TestApp {
    async fn new() -> Self {
        let config = ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 0,
                version: "test".to_string(),
            },
            storage: StorageConfig {
                data_directory: "./data".into(),
                database: ":memory:".into(),
            },
            authentication: AuthConfig {
                jwt_secret: SECRET.to_string(),
                session_ttl_hours: 1,
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                requests_per_second: 50,
            },
            moderation: ModerationConfig {
                warning_ttl_days: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        };
        let ctx = AppContext::with_pool(config, db::create_memory_pool().await.unwrap());
        let admin = ctx
            .account_manager
            .create_account("Ada Admin", "ada@campus.edu", "password123", Role::Admin)
            .await
            .unwrap();
        let admin_token = token_for(&admin);

        Self {
            router: server::build_router(ctx.clone()),
            ctx,
            admin_token,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn signup(&self, name: &str, role: &str) -> (String, String) {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({
                    "name": name,
                    "email": format!("{}@campus.edu", name.to_lowercase()),
                    "password": "password123",
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn submit_event(&self, organizer_token: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/events",
                Some(organizer_token),
                Some(json!({
                    "title": "Koi Pond Cleanup",
                    "description": "Volunteers welcome",
                    "venue": "East Garden",
                    "startsAt": "2030-04-01T10:00:00Z",
                    "capacity": 30,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "event submit failed: {}", body);
        assert_eq!(body["approvalStatus"], "pending");
        body["id"].as_str().unwrap().to_string()
    }
}

fn token_for(user: &User) -> String {
    issue_token(user, SECRET, 1).unwrap().0
}

#[tokio::test]
async fn approve_event_over_http() {
    let app = TestApp::new().await;
    let (organizer, _) = app.signup("Olive", "organizer").await;
    let event_id = app.submit_event(&organizer).await;

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/admin/events/{}/approval", event_id),
            Some(&app.admin_token),
            Some(json!({ "approvalStatus": "approved" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["approvalStatus"], "approved");

    let (status, logs) = app
        .send(
            Method::GET,
            "/admin/logs?action=event_approved",
            Some(&app.admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["targetType"], "event");
    assert_eq!(logs[0]["targetId"], event_id.as_str());

    // Approved events become visible to anonymous visitors
    let (status, _) = app
        .send(Method::GET, &format!("/api/events/{}", event_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reject_without_reason_is_refused() {
    let app = TestApp::new().await;
    let (organizer, _) = app.signup("Olive", "organizer").await;
    let event_id = app.submit_event(&organizer).await;

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/admin/events/{}/approval", event_id),
            Some(&app.admin_token),
            Some(json!({ "approvalStatus": "rejected" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");

    let event = app.ctx.event_manager.get_event(&event_id).await.unwrap();
    assert_eq!(event.approval_status.as_str(), "pending");

    // Pending events stay hidden from the public
    let (status, _) = app
        .send(Method::GET, &format!("/api/events/{}", event_id), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn banned_user_is_locked_out() {
    let app = TestApp::new().await;
    let (token, user_id) = app.signup("Uma", "user").await;

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/admin/users/{}/status", user_id),
            Some(&app.admin_token),
            Some(json!({ "status": "banned", "reason": "harassment" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["accountStatus"], "banned");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "uma@campus.edu", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].as_str().unwrap().contains("harassment"));

    // An existing session is cut off as well
    let (status, _) = app
        .send(Method::GET, "/api/auth/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_accounts_cannot_be_banned() {
    let app = TestApp::new().await;
    let other = app
        .ctx
        .account_manager
        .create_account("Bea", "bea@campus.edu", "password123", Role::Admin)
        .await
        .unwrap();

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/admin/users/{}/status", other.id),
            Some(&app.admin_token),
            Some(json!({ "status": "banned", "reason": "test" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, logs) = app
        .send(Method::GET, "/admin/logs", Some(&app.admin_token), None)
        .await;
    assert!(logs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn banned_user_cannot_be_promoted_to_admin() {
    let app = TestApp::new().await;
    let (mallory_token, mallory_id) = app.signup("Mallory", "user").await;

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/admin/users/{}/status", mallory_id),
            Some(&app.admin_token),
            Some(json!({ "status": "banned", "reason": "fraud" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/admin/users/{}/role", mallory_id),
            Some(&app.admin_token),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let stored = app.ctx.account_manager.get_user(&mallory_id).await.unwrap();
    assert_eq!(stored.role, Role::User);

    let (status, _) = app
        .send(Method::GET, "/admin/stats", Some(&mallory_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn inactive_admin_is_locked_out_of_admin_routes() {
    let app = TestApp::new().await;
    let root = app
        .ctx
        .account_manager
        .find_by_email("ada@campus.edu")
        .await
        .unwrap()
        .unwrap();
    let other = app
        .ctx
        .account_manager
        .create_account("Bea", "bea@campus.edu", "password123", Role::Admin)
        .await
        .unwrap();
    let token = token_for(&other);

    // Status written straight to the store, bypassing the admin guard
    app.ctx
        .account_manager
        .update_status(&other, AccountStatus::Suspended, Some("on leave"), &root.id)
        .await
        .unwrap();

    let (status, body) = app
        .send(Method::GET, "/admin/stats", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "AccountSuspended");
}

#[tokio::test]
async fn admin_routes_require_admin() {
    let app = TestApp::new().await;
    let (user_token, _) = app.signup("Uma", "user").await;

    let (status, _) = app.send(Method::GET, "/admin/stats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(Method::GET, "/admin/stats", Some(&user_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");

    let (status, body) = app
        .send(Method::GET, "/admin/stats", Some(&app.admin_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalUsers"], 2);
    assert_eq!(body["pendingEvents"], 0);
}

#[tokio::test]
async fn report_is_dismissed_once() {
    let app = TestApp::new().await;
    let (organizer, _) = app.signup("Olive", "organizer").await;
    let (reporter, _) = app.signup("Uma", "user").await;
    let event_id = app.submit_event(&organizer).await;

    let (status, report) = app
        .send(
            Method::POST,
            "/api/reports",
            Some(&reporter),
            Some(json!({
                "reportedEntityId": event_id,
                "reportedEntityModel": "event",
                "category": "spam",
                "description": "Same event posted repeatedly",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", report);
    assert_eq!(report["status"], "pending");
    let report_id = report["id"].as_str().unwrap().to_string();

    let resolve = |action: &'static str| {
        json!({
            "action": action,
            "adminNotes": "no violation found",
            "resolutionAction": "no_action",
        })
    };

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/admin/reports/{}/resolve", report_id),
            Some(&app.admin_token),
            Some(resolve("dismissed")),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "dismissed");
    assert!(body["resolutionAction"].is_null());

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/admin/reports/{}/resolve", report_id),
            Some(&app.admin_token),
            Some(resolve("resolved")),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");
}

#[tokio::test]
async fn report_against_missing_target_is_not_found() {
    let app = TestApp::new().await;
    let (reporter, _) = app.signup("Uma", "user").await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/reports",
            Some(&reporter),
            Some(json!({
                "reportedEntityId": "no-such-event",
                "reportedEntityModel": "event",
                "category": "fraud",
                "description": "Fake ticket sale",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn report_against_unreportable_kind_is_a_validation_error() {
    let app = TestApp::new().await;
    let (reporter, _) = app.signup("Uma", "user").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/reports",
            Some(&reporter),
            Some(json!({
                "reportedEntityId": "no-such-category",
                "reportedEntityModel": "category",
                "category": "other",
                "description": "Category name is offensive",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");
}

#[tokio::test]
async fn warned_user_acknowledges_warning() {
    let app = TestApp::new().await;
    let (user_token, user_id) = app.signup("Uma", "user").await;

    let (status, warning) = app
        .send(
            Method::POST,
            &format!("/admin/users/{}/warn", user_id),
            Some(&app.admin_token),
            Some(json!({
                "reason": "Spam comments",
                "description": "Please stop posting links",
                "severity": "minor",
                "category": "spam",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", warning);
    let warning_id = warning["id"].as_str().unwrap().to_string();

    let (status, mine) = app
        .send(Method::GET, "/api/warnings", Some(&user_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/warnings/{}/acknowledge", warning_id),
            Some(&user_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "acknowledged");
}

#[tokio::test]
async fn unknown_route_returns_json_404() {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::GET, "/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}
