//! Poe bot gateway.
//!
//! Serves one or more chat bots over the Poe server-bot protocol. Each bot is
//! bound to a language-model backend (an OpenAI-compatible hosted API or a
//! self-hosted Ollama server) and answers a fixed set of slash commands
//! locally.
//!
//! # Request flow
//!
//! 1. [`server`] authenticates the request and parses the protocol envelope.
//! 2. [`bot::Bot::respond`] answers commands directly, or windows and
//!    translates the history with [`context`] and streams it through a
//!    [`provider::ModelAdapter`].
//! 3. Fragments are framed as server-sent events in arrival order.

pub mod bot;
pub mod cli;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod provider;
pub mod registry;
pub mod server;
pub mod types;
