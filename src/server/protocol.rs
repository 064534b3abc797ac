//! Poe server-bot protocol: request envelopes, settings response, and SSE
//! framing of bot responses.

use std::convert::Infallible;

use axum::response::sse::Event;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::types::{PartialResponse, QueryRequest, ResponseStream};

/// Inbound request, dispatched on its `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PoeRequest {
    Query(QueryRequest),
    Settings(SettingsRequest),
    ReportFeedback(ReportFeedbackRequest),
    ReportError(ReportErrorRequest),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsRequest {
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportFeedbackRequest {
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub feedback_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportErrorRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Response to a `settings` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsResponse {
    pub server_bot_dependencies: serde_json::Map<String, serde_json::Value>,
    pub allow_attachments: bool,
    pub introduction_message: String,
}

impl SettingsResponse {
    pub fn new(introduction_message: impl Into<String>) -> Self {
        Self {
            server_bot_dependencies: serde_json::Map::new(),
            allow_attachments: false,
            introduction_message: introduction_message.into(),
        }
    }
}

pub fn meta_event() -> Event {
    Event::default().event("meta").data(
        serde_json::json!({
            "content_type": "text/markdown",
            "suggested_replies": false,
        })
        .to_string(),
    )
}

pub fn partial_event(partial: &PartialResponse) -> Event {
    let name = if partial.is_suggested_reply {
        "suggested_reply"
    } else {
        "text"
    };
    Event::default()
        .event(name)
        .data(serde_json::json!({ "text": partial.text }).to_string())
}

pub fn error_event(error: &BackendError) -> Event {
    Event::default().event("error").data(
        serde_json::json!({
            "text": error.to_string(),
            "allow_retry": error.allows_retry(),
            "error_type": error.kind(),
        })
        .to_string(),
    )
}

pub fn done_event() -> Event {
    Event::default().event("done").data("{}")
}

/// Frame a bot response: `meta`, one event per fragment, at most one
/// `error`, then `done`.
pub fn sse_events(mut responses: ResponseStream) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    async_stream::stream! {
        yield Ok(meta_event());
        while let Some(item) = responses.next().await {
            match item {
                Ok(partial) => yield Ok(partial_event(&partial)),
                Err(error) => {
                    yield Ok(error_event(&error));
                    break;
                }
            }
        }
        yield Ok(done_event());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::sse::Sse;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;

    async fn render(responses: ResponseStream) -> String {
        let bytes = Sse::new(sse_events(responses))
            .into_response()
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn suggested_replies_get_their_own_event() {
        let responses = futures::stream::iter(vec![
            Ok(PartialResponse::text("answer")),
            Ok(PartialResponse::suggested_reply("tell me more")),
        ])
        .boxed();

        let body = render(responses).await;

        let text = body.find("event: text").expect("text event");
        let suggested = body.find("event: suggested_reply").expect("suggested_reply event");
        let done = body.find("event: done").expect("done event");
        assert!(text < suggested && suggested < done);
        assert!(body.contains(r#"{"text":"tell me more"}"#));
    }

    #[tokio::test]
    async fn error_ends_the_event_sequence() {
        let responses = futures::stream::iter(vec![
            Ok(PartialResponse::text("par")),
            Err(BackendError::StreamInterrupted("cut".into())),
            Ok(PartialResponse::text("never")),
        ])
        .boxed();

        let body = render(responses).await;

        assert!(body.contains("event: error"));
        assert!(body.contains(r#""allow_retry":true"#));
        assert!(!body.contains("never"));
        assert!(body.trim_end().ends_with("data: {}"));
    }

    #[test]
    fn envelopes_dispatch_on_type() {
        let query: PoeRequest = serde_json::from_str(
            r#"{"version":"1.1","type":"query","query":[{"role":"user","content":"hi"}],"user_id":"u"}"#,
        )
        .unwrap();
        assert!(matches!(query, PoeRequest::Query(ref q) if q.query.len() == 1));

        let settings: PoeRequest =
            serde_json::from_str(r#"{"version":"1.1","type":"settings"}"#).unwrap();
        assert!(matches!(settings, PoeRequest::Settings(_)));

        let feedback: PoeRequest = serde_json::from_str(
            r#"{"version":"1.1","type":"report_feedback","message_id":"m","user_id":"u","conversation_id":"c","feedback_type":"like"}"#,
        )
        .unwrap();
        assert!(matches!(feedback, PoeRequest::ReportFeedback(ref f) if f.feedback_type == "like"));

        let error: PoeRequest = serde_json::from_str(
            r#"{"version":"1.1","type":"report_error","message":"boom","metadata":{"x":1}}"#,
        )
        .unwrap();
        assert!(matches!(error, PoeRequest::ReportError(ref e) if e.message == "boom"));
    }

    #[test]
    fn unknown_request_type_fails_to_parse() {
        assert!(serde_json::from_str::<PoeRequest>(r#"{"type":"telepathy"}"#).is_err());
    }

    #[test]
    fn settings_response_serializes_protocol_fields() {
        let json = serde_json::to_value(SettingsResponse::new("hello")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "server_bot_dependencies": {},
                "allow_attachments": false,
                "introduction_message": "hello",
            })
        );
    }
}
