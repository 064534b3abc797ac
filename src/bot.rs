//! Bot instances: one configuration bound to one model adapter.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, info_span, warn, Span};
use uuid::Uuid;

use crate::command::{is_command, parse_command_name, CommandHandler};
use crate::config::BotConfig;
use crate::context::build_context;
use crate::error::BackendError;
use crate::provider::ModelAdapter;
use crate::types::{PartialResponse, QueryRequest, ResponseStream};

/// A configured bot.
///
/// Holds no conversational state: every call to [`Bot::respond`] rebuilds its
/// context from the request alone, so one `Bot` can serve concurrent requests
/// through a shared reference.
pub struct Bot {
    config: Arc<BotConfig>,
    adapter: Arc<dyn ModelAdapter>,
    commands: Arc<CommandHandler>,
    span: Span,
}

impl Bot {
    /// Bind `config` to `adapter`. Log output from this bot is recorded under
    /// `span`.
    pub fn new(
        config: BotConfig,
        adapter: Arc<dyn ModelAdapter>,
        commands: Arc<CommandHandler>,
        span: Span,
    ) -> Self {
        Self {
            config: Arc::new(config),
            adapter,
            commands,
            span,
        }
    }

    /// Like [`Bot::new`], with a `bot` span named after the configuration.
    pub fn with_default_span(
        config: BotConfig,
        adapter: Arc<dyn ModelAdapter>,
        commands: Arc<CommandHandler>,
    ) -> Self {
        let span = info_span!(
            "bot",
            name = %config.name,
            backend = %config.backend,
            model = %adapter.model_id()
        );
        Self::new(config, adapter, commands, span)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Answer one query.
    ///
    /// A command in the latest turn is answered with exactly one fragment and no
    /// model call. Otherwise the history is windowed, translated, and streamed
    /// through the adapter; fragments are forwarded in arrival order. The
    /// returned stream ends after the first error.
    pub fn respond(&self, request: &QueryRequest) -> ResponseStream {
        let request_id = request
            .message_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let span = info_span!(parent: &self.span, "respond", %request_id);

        let Some(latest) = request.latest() else {
            warn!(parent: &span, user_id = %request.user_id, "query carries no turns");
            return stream::once(async {
                Err(BackendError::InvalidRequest("query carries no turns".into()))
            })
            .boxed();
        };

        if is_command(&latest.content) {
            let name = parse_command_name(&latest.content).unwrap_or_default();
            let reply = self.commands.handle(name).to_string();
            debug!(parent: &span, command = name, user_id = %request.user_id, "answered command");
            return stream::once(async move { Ok(PartialResponse::text(reply)) }).boxed();
        }

        let messages = build_context(&request.query, self.config.history_length, &self.commands);
        let settings = self.config.generation_settings();
        let adapter = Arc::clone(&self.adapter);

        info!(
            parent: &span,
            user_id = %request.user_id,
            turns = request.query.len(),
            messages = messages.len(),
            "respond start"
        );

        let stream = async_stream::stream! {
            debug!(parent: &span, backend = adapter.backend_name(), "backend call start");
            let mut upstream = match adapter.stream_text(&messages, &settings).await {
                Ok(upstream) => upstream,
                Err(e) => {
                    warn!(parent: &span, error = %e, kind = %e.kind(), "backend call failed");
                    yield Err(e);
                    return;
                }
            };

            let mut fragments = 0usize;
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(text) => {
                        fragments += 1;
                        yield Ok(PartialResponse::text(text));
                    }
                    Err(e) => {
                        let e = if fragments > 0 { e.into_interruption() } else { e };
                        warn!(parent: &span, error = %e, kind = %e.kind(), fragments, "backend stream failed");
                        yield Err(e);
                        return;
                    }
                }
            }

            debug!(parent: &span, fragments, "backend call end");
            info!(parent: &span, fragments, "respond end");
        };

        stream.boxed()
    }
}
