//! Model adapter trait and backend implementations.

pub mod http;

#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BackendType, BotConfig};
use crate::error::{BackendError, ConfigError};
use crate::types::{GenerationSettings, Message, TextStream};

/// Capability shared by every backend: turn an ordered message list into a
/// lazy stream of generated text fragments.
///
/// Failures before the first fragment are returned as `Err` from
/// [`ModelAdapter::stream_text`]; failures afterwards appear as an `Err` item
/// that ends the stream. Dropping the stream closes the backend connection.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Backend name (e.g., "openai", "ollama").
    fn backend_name(&self) -> &str;

    /// The model ID this adapter serves.
    fn model_id(&self) -> &str;

    /// Start a streaming completion.
    async fn stream_text(
        &self,
        messages: &[Message],
        settings: &GenerationSettings,
    ) -> Result<TextStream, BackendError>;
}

/// Create the adapter selected by `config.backend`.
#[allow(unused_variables)]
pub fn create_adapter(config: &BotConfig) -> Result<Arc<dyn ModelAdapter>, ConfigError> {
    match config.backend {
        #[cfg(feature = "openai")]
        BackendType::HostedApi => {
            let api_key = config.api_key.clone().ok_or_else(|| ConfigError::MissingCredential {
                bot: config.name.clone(),
                field: "api_key".into(),
            })?;
            Ok(Arc::new(openai::OpenAiAdapter::new(
                config.model.clone(),
                api_key,
                Some(config.api_base.clone()),
            )))
        }
        #[cfg(feature = "ollama")]
        BackendType::SelfHosted => Ok(Arc::new(ollama::OllamaAdapter::new(
            config.model.clone(),
            Some(config.host.clone()),
        ))),
        #[allow(unreachable_patterns)]
        other => Err(ConfigError::UnsupportedBackendType(format!(
            "{other} (not enabled via feature flags)"
        ))),
    }
}
