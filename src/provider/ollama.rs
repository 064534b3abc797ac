//! Self-hosted Ollama adapter using the native `/api/chat` endpoint.
//!
//! Ollama streams newline-delimited JSON objects rather than SSE. Each object
//! carries a `message.content` delta; the last one has `"done": true`.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::BackendError;
use crate::types::{GenerationSettings, Message, TextStream};

use super::http::{json_headers, next_line, shared_client, status_to_error, truncated_stream};
use super::ModelAdapter;

pub const DEFAULT_HOST: &str = "http://localhost:11434";

pub struct OllamaAdapter {
    model: String,
    host: String,
}

impl OllamaAdapter {
    pub fn new(model: impl Into<String>, host: Option<String>) -> Self {
        Self {
            model: model.into(),
            host: host
                .filter(|h| !h.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_HOST.to_string())
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
            "options": {
                "temperature": settings.temperature,
                "num_predict": settings.max_tokens,
            },
        })
    }
}

#[async_trait]
impl ModelAdapter for OllamaAdapter {
    fn backend_name(&self) -> &str {
        "ollama"
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
        let url = format!("{}/api/chat", self.host);

        debug!(model = %self.model, host = %self.host, messages = messages.len(), "Ollama stream_text");

        let resp = shared_client()
            .post(&url)
            .headers(json_headers(None))
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
                        buffer.push(b'\n');
                        finished = true;
                    }
                }

                while let Some(line) = next_line(&mut buffer) {
                    let parsed = match line {
                        Ok(line) if line.is_empty() => continue,
                        Ok(line) => parse_line(&line),
                        Err(e) => Err(e),
                    };
                    match parsed {
                        Ok(chunk) => {
                            if let Some(text) = chunk.text {
                                yield Ok(text);
                            }
                            if chunk.done {
                                completed = true;
                                finished = true;
                                break;
                            }
                        }
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            if !completed {
                warn!("Ollama stream closed without a done line");
                yield Err(truncated_stream());
            }
        };

        Ok(Box::pin(stream))
    }
}

#[derive(Debug, Default, PartialEq)]
struct ParsedLine {
    text: Option<String>,
    done: bool,
}

/// Decode one NDJSON line.
fn parse_line(line: &str) -> Result<ParsedLine, BackendError> {
    let chunk = match serde_json::from_str::<OllamaChatChunk>(line) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!(error = %e, "unparseable Ollama stream line");
            return Err(BackendError::StreamInterrupted(format!("unparseable stream line: {e}")));
        }
    };

    if let Some(error) = chunk.error {
        return Err(BackendError::StreamInterrupted(error));
    }

    Ok(ParsedLine {
        text: chunk
            .message
            .map(|m| m.content)
            .filter(|text| !text.is_empty()),
        done: chunk.done,
    })
}

// Ollama API stream types (internal)

#[derive(Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}
