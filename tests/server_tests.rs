//! HTTP transport: routing, authentication, and SSE framing.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use tower::ServiceExt;

use common::{bot_config, scripted_bot, Script, ScriptedAdapter};
use poe_gateway::error::BackendError;
use poe_gateway::registry::BotRegistry;
use poe_gateway::server::router;

fn app(adapter: Arc<ScriptedAdapter>, access_key: Option<&str>) -> Router {
    let mut config = bot_config("echo", "/bot");
    config.access_key = access_key.map(str::to_string);

    let mut registry = BotRegistry::new();
    registry.insert(scripted_bot(config, adapter)).unwrap();
    router(Arc::new(registry))
}

fn post(path: &str, key: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("authorization", format!("Bearer {key}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn query(text: &str) -> serde_json::Value {
    json!({
        "version": "1.1",
        "type": "query",
        "query": [{"role": "user", "content": text}],
        "user_id": "u1",
        "conversation_id": "c1",
        "message_id": "m1",
    })
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `(event, data)` pairs of an SSE body.
fn events(body: &str) -> Vec<(String, serde_json::Value)> {
    body.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .filter_map(|block| {
            let mut event = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    event = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = serde_json::from_str(v.trim()).ok();
                }
            }
            Some((event?, data?))
        })
        .collect()
}

fn names(events: &[(String, serde_json::Value)]) -> Vec<&str> {
    events.iter().map(|(name, _)| name.as_str()).collect()
}

#[tokio::test]
async fn query_streams_meta_text_done() {
    let app = app(ScriptedAdapter::replying(&["Hel", "lo"]), Some("secret"));

    let response = app.oneshot(post("/bot", Some("secret"), query("hi"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let events = events(&body_text(response).await);
    assert_eq!(names(&events), vec!["meta", "text", "text", "done"]);
    assert_eq!(events[1].1["text"], "Hel");
    assert_eq!(events[2].1["text"], "lo");
}

#[tokio::test]
async fn wrong_access_key_is_unauthorized() {
    let adapter = ScriptedAdapter::replying(&["x"]);
    let app = app(adapter.clone(), Some("secret"));

    let response = app.oneshot(post("/bot", Some("guess"), query("hi"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(adapter.call_count(), 0);
}

#[tokio::test]
async fn missing_access_key_is_unauthorized() {
    let app = app(ScriptedAdapter::replying(&["x"]), Some("secret"));

    let response = app.oneshot(post("/bot", None, query("hi"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bot_without_access_key_accepts_anyone() {
    let app = app(ScriptedAdapter::replying(&["x"]), None);

    let response = app.oneshot(post("/bot", None, query("hi"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn command_reply_is_a_single_text_event() {
    let adapter = ScriptedAdapter::replying(&["x"]);
    let app = app(adapter.clone(), None);

    let response = app.oneshot(post("/bot", None, query("/version"))).await.unwrap();
    let events = events(&body_text(response).await);

    assert_eq!(names(&events), vec!["meta", "text", "done"]);
    assert_eq!(events[1].1["text"], "1.2.3");
    assert_eq!(adapter.call_count(), 0);
}

#[tokio::test]
async fn backend_failure_becomes_error_event() {
    let adapter = ScriptedAdapter::new(Script::Refuse(BackendError::AuthenticationFailed(
        "bad key".into(),
    )));
    let app = app(adapter, None);

    let response = app.oneshot(post("/bot", None, query("hi"))).await.unwrap();
    let events = events(&body_text(response).await);

    assert_eq!(names(&events), vec!["meta", "error", "done"]);
    assert_eq!(events[1].1["allow_retry"], false);
    assert_eq!(events[1].1["error_type"], "authentication_failed");
}

#[tokio::test]
async fn interruption_keeps_earlier_fragments() {
    let adapter = ScriptedAdapter::new(Script::FailAfter(
        vec!["partial".into()],
        BackendError::Unavailable("reset".into()),
    ));
    let app = app(adapter, None);

    let response = app.oneshot(post("/bot", None, query("hi"))).await.unwrap();
    let events = events(&body_text(response).await);

    assert_eq!(names(&events), vec!["meta", "text", "error", "done"]);
    assert_eq!(events[2].1["allow_retry"], true);
    assert_eq!(events[2].1["error_type"], "stream_interrupted");
}

#[tokio::test]
async fn settings_request_returns_bot_settings() {
    let app = app(ScriptedAdapter::replying(&[]), None);

    let response = app
        .oneshot(post("/bot", None, json!({"version": "1.1", "type": "settings"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["allow_attachments"], false);
    assert!(body["introduction_message"].as_str().unwrap().contains("/help"));
}

#[tokio::test]
async fn reports_are_acknowledged() {
    let app = app(ScriptedAdapter::replying(&[]), None);

    let feedback = json!({
        "version": "1.1",
        "type": "report_feedback",
        "message_id": "m1",
        "user_id": "u1",
        "conversation_id": "c1",
        "feedback_type": "like",
    });
    let response = app.clone().oneshot(post("/bot", None, feedback)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let error = json!({"version": "1.1", "type": "report_error", "message": "render failed"});
    let response = app.oneshot(post("/bot", None, error)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let app = app(ScriptedAdapter::replying(&[]), None);

    let response = app
        .oneshot(post("/bot", None, json!({"type": "telepathy"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unmounted_path_is_not_found() {
    let app = app(ScriptedAdapter::replying(&[]), None);

    let response = app.oneshot(post("/elsewhere", None, query("hi"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_lists_mounted_bots() {
    let app = app(ScriptedAdapter::replying(&[]), None);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();

    assert_eq!(
        body,
        json!({"status": "ok", "bots": [{"name": "echo", "path": "/bot"}]})
    );
}

#[tokio::test]
async fn client_disconnect_releases_the_backend_stream() {
    let adapter = ScriptedAdapter::new(Script::Stall(vec!["first".into()]));
    let app = app(adapter.clone(), None);

    let response = app.oneshot(post("/bot", None, query("hi"))).await.unwrap();
    let mut body = response.into_body();

    let mut seen = String::new();
    while !seen.contains("first") {
        let frame = body.frame().await.expect("body ended early").unwrap();
        if let Ok(data) = frame.into_data() {
            seen.push_str(&String::from_utf8_lossy(&data));
        }
    }
    assert!(!adapter.upstream_dropped());

    drop(body);
    assert!(adapter.upstream_dropped());
}
