use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use fretboard_collab::{
    testing::{test_config, TestCollab},
    MemoryDatabase,
};
use fretboard_core::Plan;
use fretboard_server::{build_router, ServerContext, SESSION_COOKIE};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    db: Arc<MemoryDatabase>,
}

impl TestApp {
    fn new() -> Self {
        let TestCollab { collab, db, .. } = TestCollab::new();
        let router = build_router(ServerContext::new(collab, test_config()));

        Self { router, db }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, body)
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };

        self.send(request.unwrap()).await
    }

    /// Registers a user and returns its id and token
    async fn register(&self, username: &str) -> (i64, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/v1/auth/register",
                None,
                Some(json!({
                    "displayName": username,
                    "username": username,
                    "password": "correct horse battery",
                })),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED, "{body}");

        let id = body["user"]["id"].as_i64().unwrap();
        let token = body["token"].as_str().unwrap().to_string();

        (id, token)
    }
}

#[tokio::test]
async fn health_needs_no_session() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn rejects_missing_and_unknown_sessions() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/v1/songs", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = app.call(Method::GET, "/v1/songs", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registers_logs_in_and_out() {
    let app = TestApp::new();
    let (id, _) = app.register("django").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "username": "django", "password": "correct horse battery" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"].as_i64(), Some(id));

    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.call(Method::GET, "/v1/auth/user", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "django");

    let (status, _) = app.call(Method::POST, "/v1/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::GET, "/v1/auth/user", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new();
    app.register("django").await;

    let (status, _) = app
        .call(
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "username": "django", "password": "wrong password" })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn accepts_the_session_cookie() {
    let app = TestApp::new();
    let (_, token) = app.register("django").await;

    let request = Request::builder()
        .uri("/v1/profile")
        .header(header::COOKIE, format!("{SESSION_COOKIE}={token}"))
        .body(Body::empty())
        .unwrap();

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"], "free");
}

#[tokio::test]
async fn validation_errors_are_reported() {
    let app = TestApp::new();
    let (_, token) = app.register("django").await;

    let (status, body) = app
        .call(Method::POST, "/v1/practice", Some(&token), Some(json!({ "durationMinutes": 0 })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "La durée doit être comprise entre 1 et 600 minutes");
}

#[tokio::test]
async fn plan_gated_endpoints_need_a_paid_plan() {
    let app = TestApp::new();
    let (id, token) = app.register("django").await;

    let (status, _) = app
        .call(Method::GET, "/v1/tabs/search?q=minor", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(Method::GET, "/v1/spotify/recently-played", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.db.set_plan(id as i32, Plan::Pro);

    let (status, body) = app
        .call(Method::GET, "/v1/tabs/search?q=minor", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn free_plan_is_not_a_billing_target() {
    let app = TestApp::new();
    let (_, token) = app.register("django").await;

    let (status, _) = app
        .call(Method::POST, "/v1/billing/plan", Some(&token), Some(json!({ "plan": "free" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(Method::POST, "/v1/billing/plan", Some(&token), Some(json!({ "plan": "gold" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Plan inconnu");
}

#[tokio::test]
async fn webhook_needs_a_signature() {
    let app = TestApp::new();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/billing/webhook")
        .body(Body::from("{}"))
        .unwrap();

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Signature manquante");
}

#[tokio::test]
async fn jams_are_joined_once_and_chatted_in() {
    let app = TestApp::new();
    let (_, host) = app.register("django").await;
    let (guest_id, guest) = app.register("stephane").await;

    let (status, jam) = app
        .call(Method::POST, "/v1/jams", Some(&host), Some(json!({ "title": "Gypsy night" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let jam_uri = format!("/v1/jams/{}", jam["id"]);

    app.call(Method::GET, &jam_uri, Some(&guest), None).await;
    let (status, details) = app.call(Method::GET, &jam_uri, Some(&guest), None).await;

    assert_eq!(status, StatusCode::OK);

    let participants = details["participants"].as_array().unwrap();
    let guest_rows = participants
        .iter()
        .filter(|p| p["user"]["id"].as_i64() == Some(guest_id))
        .count();

    assert_eq!(participants.len(), 2);
    assert_eq!(guest_rows, 1);

    let (status, message) = app
        .call(
            Method::POST,
            &format!("{jam_uri}/messages"),
            Some(&guest),
            Some(json!({ "content": "Minor swing in A?" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["content"], "Minor swing in A?");

    let (status, _) = app
        .call(Method::POST, &format!("{jam_uri}/end"), Some(&guest), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(Method::POST, &format!("{jam_uri}/end"), Some(&host), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            Method::POST,
            &format!("{jam_uri}/messages"),
            Some(&guest),
            Some(json!({ "content": "Too late" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn friend_requests_lead_to_friendship() {
    let app = TestApp::new();
    let (_, django) = app.register("django").await;
    let (_, stephane) = app.register("stephane").await;

    let (status, request) = app
        .call(
            Method::POST,
            "/v1/friends/requests",
            Some(&django),
            Some(json!({ "username": "stephane" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/v1/friends/requests/{}/accept", request["id"]),
            Some(&stephane),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, friends) = app.call(Method::GET, "/v1/friends", Some(&django), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(friends[0]["username"], "stephane");
}

#[tokio::test]
async fn serves_the_api_document() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/api.json", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/v1/jams/{id}/events"].is_object());
}
