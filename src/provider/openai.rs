//! Hosted OpenAI-style Chat Completions adapter.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::BackendError;
use crate::types::{GenerationSettings, Message, TextStream};

use super::http::{
    json_headers, next_line, parse_sse_data, shared_client, status_to_error, truncated_stream,
};
use super::ModelAdapter;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiAdapter {
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAiAdapter {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn build_request_body(&self, messages: &[Message], settings: &GenerationSettings) -> serde_json::Value {
        let messages = messages
            .iter()
            .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content }))
            .collect::<Vec<_>>();

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
            "temperature": settings.temperature,
            "max_tokens": settings.max_tokens,
        })
    }
}

#[async_trait]
impl ModelAdapter for OpenAiAdapter {
    fn backend_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream_text(
        &self,
        messages: &[Message],
        settings: &GenerationSettings,
    ) -> Result<TextStream, BackendError> {
        let body = self.build_request_body(messages, settings);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %self.model, messages = messages.len(), "OpenAI stream_text");

        let resp = shared_client()
            .post(&url)
            .headers(json_headers(Some(&self.api_key)))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            let mut finished = false;
            let mut completed = false;
            futures::pin_mut!(byte_stream);

            while !finished {
                match byte_stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        yield Err(BackendError::StreamInterrupted(e.to_string()));
                        return;
                    }
                    None => {
                        // Flush a final line that arrived without a newline.
                        buffer.push(b'\n');
                        finished = true;
                    }
                }

                while let Some(line) = next_line(&mut buffer) {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    };
                    match parse_line(&line) {
                        SseLine::Skip => {}
                        SseLine::Text(text) => yield Ok(text),
                        SseLine::Done => {
                            completed = true;
                            finished = true;
                            break;
                        }
                        SseLine::Failed(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            if !completed {
                warn!("OpenAI stream closed without [DONE]");
                yield Err(truncated_stream());
            }
        };

        Ok(Box::pin(stream))
    }
}

enum SseLine {
    Skip,
    Text(String),
    Done,
    Failed(BackendError),
}

/// Classify one line of the event stream.
fn parse_line(line: &str) -> SseLine {
    if !line.starts_with("data:") {
        // Blank separators, comments, and `event:` lines carry no text.
        return SseLine::Skip;
    }
    let Some(data) = parse_sse_data(line) else {
        return SseLine::Done;
    };
    match parse_chunk(data) {
        Ok(Some(text)) => SseLine::Text(text),
        Ok(None) => SseLine::Skip,
        Err(e) => SseLine::Failed(e),
    }
}

/// Decode one SSE payload into its text delta, if any.
fn parse_chunk(data: &str) -> Result<Option<String>, BackendError> {
    match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(OpenAiStreamChunk {
            error: Some(error), ..
        }) => Err(BackendError::StreamInterrupted(error.message)),
        Ok(chunk) => Ok(chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|text| !text.is_empty())),
        Err(e) => {
            warn!(error = %e, "unparseable OpenAI stream chunk");
            Err(BackendError::StreamInterrupted(format!("unparseable stream chunk: {e}")))
        }
    }
}

// OpenAI API stream types (internal)

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    error: Option<OpenAiStreamError>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiStreamDelta,
}

#[derive(Deserialize, Default)]
struct OpenAiStreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiStreamError {
    message: String,
}
