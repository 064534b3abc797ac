//! Bot construction and lookup by mount path.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::bot::Bot;
use crate::command::CommandHandler;
use crate::config::{AppConfig, BotConfig};
use crate::error::ConfigError;
use crate::provider::{create_adapter, ModelAdapter};

/// Builds bots from validated configurations.
#[derive(Debug, Clone, Default)]
pub struct BotFactory {
    commands: Arc<CommandHandler>,
}

impl BotFactory {
    pub fn new(commands: CommandHandler) -> Self {
        Self {
            commands: Arc::new(commands),
        }
    }

    pub fn commands(&self) -> &CommandHandler {
        &self.commands
    }

    /// Create the bot for `config`, choosing the adapter by backend type.
    pub fn create(&self, config: BotConfig) -> Result<Bot, ConfigError> {
        let adapter = create_adapter(&config)?;
        Ok(self.create_with_adapter(config, adapter))
    }

    /// Create a bot around an already-built adapter.
    pub fn create_with_adapter(&self, config: BotConfig, adapter: Arc<dyn ModelAdapter>) -> Bot {
        if config.access_key.is_none() {
            warn!(bot = %config.name, mount = %config.mount_path, "no access key configured, requests are not authenticated");
        }
        let bot = Bot::with_default_span(config, adapter, Arc::clone(&self.commands));
        info!(
            bot = bot.name(),
            backend = %bot.config().backend,
            mount = %bot.config().mount_path,
            "bot initialized"
        );
        bot
    }
}

/// All bots of one process, keyed by mount path.
#[derive(Default)]
pub struct BotRegistry {
    bots: BTreeMap<String, Arc<Bot>>,
}

impl BotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `config` and build every bot it declares. Fails without
    /// building anything if any entry is invalid.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let factory = BotFactory::new(config.command_handler());
        let bot_configs = config.bot_configs()?;
        Self::from_configs(&factory, bot_configs)
    }

    pub fn from_configs(factory: &BotFactory, configs: Vec<BotConfig>) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for config in configs {
            registry.insert(factory.create(config)?)?;
        }
        Ok(registry)
    }

    /// Register a bot under its mount path.
    pub fn insert(&mut self, bot: Bot) -> Result<(), ConfigError> {
        let mount = bot.config().mount_path.clone();
        if self.bots.contains_key(&mount) {
            return Err(ConfigError::DuplicateMount(mount));
        }
        self.bots.insert(mount, Arc::new(bot));
        Ok(())
    }

    pub fn get(&self, mount_path: &str) -> Option<&Arc<Bot>> {
        self.bots.get(mount_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Bot>)> {
        self.bots.iter().map(|(mount, bot)| (mount.as_str(), bot))
    }

    pub fn len(&self) -> usize {
        self.bots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.is_empty()
    }
}
