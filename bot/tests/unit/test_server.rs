//! HTTP routing tests

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use deploybot::deploy::orchestrator::Orchestrator;
use deploybot::server::serve::router;
use deploybot::server::state::ServerState;
use deploybot::server::verify::{RETRY_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use sha2::Sha256;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;

use crate::fakes::{push_body, settings, FakeArgo, FakeGithub, FakeRegistry, Fakes};

const SIGNING_SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";

struct Harness {
    fakes: Fakes,
    tasks: TaskTracker,
    app: Router,
}

impl Harness {
    fn new() -> Self {
        let fakes = Fakes::new(FakeGithub::default(), FakeArgo::default(), FakeRegistry::default());
        let orchestrator = Orchestrator::new(
            fakes.collaborators(),
            &settings(),
            None,
            CancellationToken::new(),
        );
        let tasks = TaskTracker::new();
        let state = ServerState::new(
            Arc::new(orchestrator),
            SecretString::from(SIGNING_SECRET),
            tasks.clone(),
        );
        Self {
            fakes,
            tasks,
            app: router(Arc::new(state)),
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    /// Wait for the background work spawned by handlers
    async fn settle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn mention_event(text: &str) -> String {
    serde_json::json!({
        "type": "event_callback",
        "event_id": "Ev0DEPLOY",
        "event": {
            "type": "app_mention",
            "user": "U8675309",
            "text": text,
            "channel": "C0DEPLOY",
            "ts": "1700000000.000100"
        }
    })
    .to_string()
}

fn signed_post(uri: &str, body: &str, secret: &str) -> Request<Body> {
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("v0:{}:{}", timestamp, body).as_bytes());
    let signature = format!("v0={}", hex::encode(mac.finalize().into_bytes()));

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header(TIMESTAMP_HEADER, timestamp)
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let harness = Harness::new();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = harness.send(request).await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "deploybot");
}

// ================================== GITSHOT ====================================== //

#[tokio::test]
async fn test_gitshot_rejects_empty_body() {
    let harness = Harness::new();

    let (status, _) = harness.send(post("/gitshot", Body::empty())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_gitshot_acknowledges_before_processing() {
    let harness = Harness::new();

    let (status, body) = harness
        .send(post("/gitshot", push_body("mallory", &["time/values.yaml"])))
        .await;
    harness.settle().await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, r#"{"status":"accepted"}"#);
    // Untrusted pushes are dropped in the background
    assert!(harness.fakes.argo.synced.lock().unwrap().is_empty());
    assert_eq!(harness.fakes.chat.count(), 0);
}

// ================================== EVENTS ======================================= //

#[tokio::test]
async fn test_url_verification_echoes_challenge() {
    let harness = Harness::new();
    let body = r#"{"type": "url_verification", "token": "x", "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"}"#;

    let (status, text) = harness
        .send(signed_post("/events", body, SIGNING_SECRET))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P");
}

#[tokio::test]
async fn test_events_reject_unsigned_requests() {
    let harness = Harness::new();

    let (status, _) = harness
        .send(post("/events", mention_event("<@B1> time main")))
        .await;
    harness.settle().await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // Nothing was started on behalf of the unsigned request
    assert_eq!(harness.fakes.chat.count(), 0);
    assert!(harness.fakes.github.commits.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unsigned_url_verification_is_refused() {
    let harness = Harness::new();
    let body = r#"{"type": "url_verification", "token": "x", "challenge": "c"}"#;

    let (status, text) = harness.send(post("/events", body)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(text.is_empty());
}

#[tokio::test]
async fn test_events_reject_stale_signature() {
    let harness = Harness::new();
    let body = mention_event("<@B1> time main");
    let mut request = signed_post("/events", &body, SIGNING_SECRET);
    let stale = (chrono::Utc::now().timestamp() - 600).to_string();
    request
        .headers_mut()
        .insert(TIMESTAMP_HEADER, stale.parse().unwrap());

    let (status, _) = harness.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_events_reject_wrong_secret() {
    let harness = Harness::new();

    let (status, _) = harness
        .send(signed_post("/events", &mention_event("<@B1> time main"), "not-the-secret"))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signed_mention_is_handled() {
    let harness = Harness::new();

    let (status, _) = harness
        .send(signed_post("/events", &mention_event("<@B1> salsa main"), SIGNING_SECRET))
        .await;
    harness.settle().await;

    assert_eq!(status, StatusCode::OK);
    let texts = harness.fakes.chat.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("Unrecognized application `salsa`"));
}

#[tokio::test]
async fn test_redelivered_mention_is_skipped() {
    let harness = Harness::new();
    let mut request = signed_post("/events", &mention_event("<@B1> salsa main"), SIGNING_SECRET);
    request
        .headers_mut()
        .insert(RETRY_HEADER, "1".parse().unwrap());

    let (status, _) = harness.send(request).await;
    harness.settle().await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(harness.fakes.chat.count(), 0);
}

#[tokio::test]
async fn test_events_reject_garbage() {
    let harness = Harness::new();

    let (status, _) = harness
        .send(signed_post("/events", "not json", SIGNING_SECRET))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_other_events_are_acknowledged() {
    let harness = Harness::new();
    let body = r#"{"type": "event_callback", "event": {"type": "reaction_added", "user": "U1"}}"#;

    let (status, _) = harness
        .send(signed_post("/events", body, SIGNING_SECRET))
        .await;
    harness.settle().await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(harness.fakes.chat.count(), 0);
}
