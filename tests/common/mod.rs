//! Shared test helpers and a scripted model adapter.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use poe_gateway::bot::Bot;
use poe_gateway::command::CommandHandler;
use poe_gateway::config::{BackendType, BotConfig};
use poe_gateway::error::BackendError;
use poe_gateway::provider::ModelAdapter;
use poe_gateway::registry::BotFactory;
use poe_gateway::types::*;

/// What the adapter should do on its next call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream these fragments, then end.
    Fragments(Vec<String>),
    /// Stream these fragments, then fail.
    FailAfter(Vec<String>, BackendError),
    /// Fail before producing anything.
    Refuse(BackendError),
    /// Stream these fragments, then wait forever.
    Stall(Vec<String>),
}

/// Sets its flag when dropped, i.e. when the upstream stream is released.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// An adapter that replays a script and records every message list it sees.
pub struct ScriptedAdapter {
    script: Script,
    calls: Mutex<Vec<Vec<Message>>>,
    upstream_dropped: Arc<AtomicBool>,
}

impl ScriptedAdapter {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(Vec::new()),
            upstream_dropped: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn replying(fragments: &[&str]) -> Arc<Self> {
        Self::new(Script::Fragments(
            fragments.iter().map(|f| f.to_string()).collect(),
        ))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Whether the last stream handed out has been dropped.
    pub fn upstream_dropped(&self) -> bool {
        self.upstream_dropped.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Option<Vec<Message>> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ModelAdapter for ScriptedAdapter {
    fn backend_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn stream_text(
        &self,
        messages: &[Message],
        _settings: &GenerationSettings,
    ) -> Result<TextStream, BackendError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.upstream_dropped.store(false, Ordering::SeqCst);
        let guard = DropFlag(Arc::clone(&self.upstream_dropped));
        let upstream: TextStream = match self.script.clone() {
            Script::Fragments(fragments) => stream::iter(fragments.into_iter().map(Ok)).boxed(),
            Script::FailAfter(fragments, error) => stream::iter(
                fragments
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(error))),
            )
            .boxed(),
            Script::Stall(fragments) => stream::iter(fragments.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed(),
            Script::Refuse(error) => return Err(error),
        };
        Ok(upstream
            .map(move |item| {
                let _guard = &guard;
                item
            })
            .boxed())
    }
}

pub fn bot_config(name: &str, mount: &str) -> BotConfig {
    BotConfig::builder()
        .name(name)
        .backend(BackendType::SelfHosted)
        .model("scripted-model")
        .mount_path(mount.to_string())
        .build()
}

pub fn scripted_bot(config: BotConfig, adapter: Arc<ScriptedAdapter>) -> Bot {
    BotFactory::new(CommandHandler::new("1.2.3", "fixed things")).create_with_adapter(config, adapter)
}

/// Collect a response into its fragments and its terminal error, if any.
pub async fn collect(mut responses: ResponseStream) -> (Vec<String>, Option<BackendError>) {
    let mut fragments = Vec::new();
    while let Some(item) = responses.next().await {
        match item {
            Ok(partial) => fragments.push(partial.text),
            Err(e) => return (fragments, Some(e)),
        }
    }
    (fragments, None)
}
