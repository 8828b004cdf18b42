use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use agora_api::notifications::{LocalizedMailChannel, MailMessage, MailTransport};
use agora_api::routes::router;
use agora_api::state::{AppState, AppStateInner};
use agora_db::Database;
use agora_gateway::dispatcher::Dispatcher;

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<MailMessage>>,
}

impl MailTransport for Outbox {
    fn deliver(&self, mail: &MailMessage) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

struct TestApp {
    state: AppState,
    outbox: Arc<Outbox>,
}

impl TestApp {
    fn new() -> Self {
        let outbox = Arc::new(Outbox::default());
        let state = AppStateInner::new(
            Database::open_in_memory().unwrap(),
            "integration-secret".into(),
            Dispatcher::new(),
            LocalizedMailChannel::new(outbox.clone() as Arc<dyn MailTransport>, "en"),
        );
        Self { state, outbox }
    }

    fn app(&self) -> Router {
        router(self.state.clone())
    }

    async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        let response = self.app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Registers, activates and logs in; returns the bearer token.
    async fn signed_up(&self, username: &str) -> String {
        let (status, _) = self
            .post(
                "/auth/register",
                json!({ "username": username, "email": format!("{username}@example.com"), "password": "correct horse" }),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let token = self.state.db.get_user_by_username(username).unwrap().unwrap().activation_token;
        let (status, _) = self.post("/auth/activate", json!({ "token": token }), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self
            .post("/auth/login", json!({ "username": username, "password": "correct horse" }), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn health_responds() {
    let app = TestApp::new();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn registration_sends_activation_mail_and_blocks_login() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/auth/register",
            json!({ "username": "dora", "email": "dora@example.com", "password": "correct horse" }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["user_id"].as_i64().is_some());

    let token = app.state.db.get_user_by_username("dora").unwrap().unwrap().activation_token;
    {
        let sent = app.outbox.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "dora@example.com");
        assert!(sent[0].body.contains(&token));
    }

    let (status, _) = app
        .post("/auth/login", json!({ "username": "dora", "password": "correct horse" }), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            "/auth/register",
            json!({ "username": "dora", "email": "other@example.com", "password": "correct horse" }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn authenticated_calls_resolve_by_name() {
    let app = TestApp::new();
    let alice = app.signed_up("alice").await;
    let bob = app.signed_up("bob").await;

    let (status, sent) = app
        .post("/api/message.send", json!({ "to": "bob", "body": "hello" }), Some(&alice))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["name"], "message.send");
    assert_eq!(sent["success"], true);
    let id = sent["data"]["id"].as_i64().unwrap();

    let (_, received) = app
        .post("/api/message.received", json!({ "ids": [id], "read": true }), Some(&bob))
        .await;
    assert_eq!(received["success"], true);
    assert_eq!(received["data"], json!([]));

    let (_, listed) = app.post("/api/messages", json!({ "with": "bob" }), Some(&alice)).await;
    assert_eq!(listed["success"], true);
    assert_eq!(listed["data"]["items"][0]["read"], true);
    assert_eq!(listed["data"]["order"], "desc");
}

#[tokio::test]
async fn guests_and_bad_tokens_are_refused_in_band() {
    let app = TestApp::new();

    for token in [None, Some("not-a-jwt")] {
        let (status, body) = app.post("/api/messages", json!({}), token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["data"], json!([]));
    }
}

#[tokio::test]
async fn unknown_requests_and_non_object_bodies() {
    let app = TestApp::new();

    let (status, body) = app.post("/api/does.not.exist", json!({}), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "Unknown request.");

    let (status, _) = app.post("/api/user", json!([1, 2, 3]), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn validation_errors_are_listed_per_field() {
    let app = TestApp::new();
    let alice = app.signed_up("alice").await;

    let (_, body) = app
        .post("/api/message.send", json!({ "body": 42 }), Some(&alice))
        .await;
    assert_eq!(body["success"], false);
    assert!(body["data"]["validation"]["to"].is_array());
    assert!(body["data"]["validation"]["body"].is_array());
}
