//! Upstream client tests against a mock HTTP server

use deploybot::errors::BotError;
use deploybot::http::argo::{ArgoClient, ArgoExt};
use deploybot::http::client::HttpClient;
use deploybot::http::github::{GithubClient, GithubExt, GITHUB_ACCEPT};
use deploybot::http::registry::{RegistryClient, RegistryExt};
use deploybot::http::slack::{ChatExt, SlackClient};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::fakes::thread;

fn http(service: &'static str, server: &MockServer) -> HttpClient {
    HttpClient::new(service, &server.uri(), Some(SecretString::from("t0ken"))).unwrap()
}

fn github(server: &MockServer) -> GithubClient {
    GithubClient::new(
        http("github", server).with_accept(GITHUB_ACCEPT),
        "acme",
        "gitops",
        "main",
    )
}

// ================================== GITHUB ======================================= //

#[tokio::test]
async fn test_download_manifest_decodes_wrapped_base64() {
    let server = MockServer::start().await;
    // "image:\n  tag: main-deadbee\n" wrapped the way the contents API does
    Mock::given(method("GET"))
        .and(path("/repos/acme/gitops/contents/time/values.yaml"))
        .and(query_param("ref", "main"))
        .and(header("authorization", "Bearer t0ken"))
        .and(header("accept", GITHUB_ACCEPT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "path": "time/values.yaml",
            "sha": "blob-1",
            "html_url": "https://github.com/acme/gitops/blob/main/time/values.yaml",
            "content": "aW1hZ2U6CiAgdGFnOiBt\nYWluLWRlYWRiZWUK\n",
            "encoding": "base64"
        })))
        .mount(&server)
        .await;

    let file = github(&server).download_manifest("time").await.unwrap();

    assert_eq!(file.path, "time/values.yaml");
    assert_eq!(file.version, "blob-1");
    assert_eq!(file.content, b"image:\n  tag: main-deadbee\n");
}

#[tokio::test]
async fn test_update_manifest_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/repos/acme/gitops/contents/time/values.yaml"))
        .and(body_partial_json(json!({
            "message": "Deploy time:main-deadbee",
            "sha": "blob-1",
            "branch": "main"
        })))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"message": "time/values.yaml does not match blob-1"})),
        )
        .mount(&server)
        .await;

    let result = github(&server)
        .update_manifest("time", "Deploy time:main-deadbee", b"image: {}\n", "blob-1")
        .await;

    assert!(matches!(result, Err(BotError::Conflict(_))));
}

#[tokio::test]
async fn test_update_manifest_returns_commit() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/repos/acme/gitops/contents/time/values.yaml"))
        .and(body_partial_json(json!({"content": "aW1hZ2U6IHt9Cg=="})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": {"path": "time/values.yaml"},
            "commit": {"sha": "1234567", "html_url": "https://github.com/acme/gitops/commit/1234567"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let commit = github(&server)
        .update_manifest("time", "Deploy time:main-deadbee", b"image: {}\n", "blob-1")
        .await
        .unwrap();

    assert_eq!(commit.sha, "1234567");
}

#[tokio::test]
async fn test_check_runs_filters_by_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/time/commits/deadbeef/check-runs"))
        .and(query_param("check_name", "promote_image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 1,
            "check_runs": [{"name": "promote_image", "status": "completed", "conclusion": "success"}]
        })))
        .mount(&server)
        .await;

    let runs = github(&server)
        .check_runs("time", "deadbeef", "promote_image")
        .await
        .unwrap();

    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "completed");
}

#[tokio::test]
async fn test_missing_pull_request_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/time/pulls/9999"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&server)
        .await;

    let err = github(&server).pull_request("time", 9999).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.redacted(), "github request failed with status 404");
}

// =================================== ARGO ======================================== //

#[tokio::test]
async fn test_argo_forward_and_sync() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/webhook"))
        .and(header("x-github-event", "push"))
        .and(header("authorization", "Bearer t0ken"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/applications/time/sync"))
        .and(body_partial_json(json!({"prune": false, "dryRun": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"metadata": {"name": "time"}})))
        .expect(1)
        .mount(&server)
        .await;

    let argo = ArgoClient::new(http("argo", &server));
    argo.forward_push(br#"{"ref": "refs/heads/main"}"#).await.unwrap();
    argo.sync_application("time").await.unwrap();
}

#[tokio::test]
async fn test_argo_application_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/applications/time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {"name": "time"},
            "status": {
                "resources": [
                    {"kind": "Service", "name": "time", "status": "Synced"},
                    {"kind": "Deployment", "name": "time-sidekiq", "namespace": "time"}
                ],
                "sync": {"status": "OutOfSync"}
            }
        })))
        .mount(&server)
        .await;

    let status = ArgoClient::new(http("argo", &server))
        .application_status("time")
        .await
        .unwrap();

    assert_eq!(status.resources.len(), 2);
    assert_eq!(status.resources[1].status, None);
}

// ================================= REGISTRY ====================================== //

#[tokio::test]
async fn test_registry_null_tags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/time/tags/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "time", "tags": null})))
        .mount(&server)
        .await;

    let tags = RegistryClient::new(http("registry", &server))
        .list_tags("time")
        .await
        .unwrap();

    assert!(tags.is_empty());
}

#[tokio::test]
async fn test_registry_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/time/tags/list"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token abc123 expired"))
        .mount(&server)
        .await;

    let err = RegistryClient::new(http("registry", &server))
        .list_tags("time")
        .await
        .unwrap_err();

    assert!(matches!(err, BotError::Upstream { status: 401, .. }));
    assert!(!err.redacted().contains("abc123"));
}

// =================================== SLACK ======================================= //

#[tokio::test]
async fn test_slack_reply_is_threaded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .and(body_partial_json(json!({
            "channel": "C0DEPLOY",
            "thread_ts": "1700000000.000100",
            "text": "Updating image.tag to main-deadbee"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "ts": "1700000001.000200"})))
        .expect(1)
        .mount(&server)
        .await;

    SlackClient::new(http("slack", &server))
        .post_reply(&thread(), "Updating image.tag to main-deadbee")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_slack_not_ok_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "channel_not_found"})),
        )
        .mount(&server)
        .await;

    let err = SlackClient::new(http("slack", &server))
        .post_reply(&thread(), "hello")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BotError::Upstream { status: 200, ref body, .. } if body == "channel_not_found"
    ));
}
