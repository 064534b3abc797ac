//! Control commands: classification, parsing, and canned responses.
//!
//! A command is a single whitespace-free token starting with `/`, e.g.
//! `/version`. Anything else is conversational content. Commands never reach a
//! model backend, and the replies to `/version` and `/changelog` are treated as
//! sentinels that are kept out of later model context.

use std::sync::OnceLock;

use regex::Regex;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub const DEFAULT_VERSION: &str = "0.0.1";
pub const DEFAULT_CHANGELOG: &str = "changelog";

pub const WELCOME_MESSAGE: &str = "welcome to use this bot! use /help to get more information";
pub const UNSUPPORTED_MESSAGE: &str = "unsupported command!";

static COMMAND_PATTERN: OnceLock<Regex> = OnceLock::new();

fn command_pattern() -> &'static Regex {
    COMMAND_PATTERN.get_or_init(|| Regex::new(r"^/\S+$").expect("command pattern is valid"))
}

/// Whether `text`, once trimmed, is exactly one `/`-prefixed token.
pub fn is_command(text: &str) -> bool {
    command_pattern().is_match(text.trim())
}

/// The command token of `text`: everything up to the first whitespace.
/// Case is preserved.
pub fn parse_command_name(text: &str) -> Option<&str> {
    text.split_whitespace()
        .next()
        .filter(|token| token.starts_with('/'))
}

/// Commands with a dedicated response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum Command {
    #[strum(serialize = "/version")]
    Version,
    #[strum(serialize = "/changelog")]
    Changelog,
    #[strum(serialize = "/start")]
    Start,
    #[strum(serialize = "/help")]
    Help,
}

impl Command {
    /// Look up a command by its exact, case-sensitive name.
    pub fn parse(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    fn summary(self) -> &'static str {
        match self {
            Self::Version => "show the running version",
            Self::Changelog => "show what changed in this version",
            Self::Start => "show the welcome message",
            Self::Help => "show this help",
        }
    }
}

/// Stateless command dispatcher. Total over its input: unknown names get the
/// decline message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHandler {
    version: String,
    changelog: String,
    help: String,
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new(DEFAULT_VERSION, DEFAULT_CHANGELOG)
    }
}

impl CommandHandler {
    pub fn new(version: impl Into<String>, changelog: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            changelog: changelog.into(),
            help: help_text(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn changelog(&self) -> &str {
        &self.changelog
    }

    /// Resolve a command name to its reply.
    pub fn handle(&self, name: &str) -> &str {
        match Command::parse(name) {
            Some(Command::Version) => self.version.as_str(),
            Some(Command::Changelog) => self.changelog.as_str(),
            Some(Command::Start) => WELCOME_MESSAGE,
            Some(Command::Help) => self.help.as_str(),
            None => UNSUPPORTED_MESSAGE,
        }
    }

    /// Whether `content` is one of the command replies that must not re-enter
    /// model context.
    pub fn is_sentinel(&self, content: &str) -> bool {
        content == self.version || content == self.changelog
    }
}

fn help_text() -> String {
    let mut text = String::from("Send a message to chat with the model. Available commands:");
    for command in Command::iter() {
        text.push_str(&format!("\n{command} - {}", command.summary()));
    }
    text
}
