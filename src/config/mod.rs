//! Configuration: TOML file → validated, immutable per-bot settings.
//!
//! The file is parsed into [`AppConfig`] / [`BotConfigFile`] (loose, with
//! defaults), then every bot entry is validated into a [`BotConfig`]. Any
//! validation failure aborts startup; nothing is checked lazily at request
//! time.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::command::{CommandHandler, DEFAULT_CHANGELOG, DEFAULT_VERSION};
use crate::error::ConfigError;
use crate::types::{GenerationSettings, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};

pub const DEFAULT_CONFIG_PATH: &str = "./configs/config.toml";
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
pub const DEFAULT_LISTEN_PORT: u16 = 51245;
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MOUNT_PATH: &str = "/bot";
pub const DEFAULT_HISTORY_LENGTH: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(n) => n,
    None => panic!("default history length must be non-zero"),
};

/// Prefix marking a secret that is read from the environment at load time.
const ENV_PREFIX: &str = "env:";

const MAX_TEMPERATURE: f64 = 2.0;

/// Which kind of backend a bot talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum BackendType {
    /// Remote hosted completion API (OpenAI-compatible).
    #[strum(serialize = "openai")]
    HostedApi,
    /// Network-reachable self-hosted inference server (Ollama).
    #[strum(serialize = "ollama")]
    SelfHosted,
}

impl BackendType {
    /// Parse a configured backend name, failing with
    /// [`ConfigError::UnsupportedBackendType`].
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        Self::from_str(name.trim()).map_err(|_| ConfigError::UnsupportedBackendType(name.to_string()))
    }
}

/// Validated configuration of one bot. Immutable after startup.
#[derive(Clone, PartialEq, Builder)]
pub struct BotConfig {
    #[builder(into)]
    pub name: String,
    pub backend: BackendType,
    #[builder(into)]
    pub model: String,
    #[builder(default = DEFAULT_API_BASE.to_string())]
    pub api_base: String,
    #[builder(into)]
    pub api_key: Option<String>,
    #[builder(default = DEFAULT_OLLAMA_HOST.to_string())]
    pub host: String,
    /// Pre-shared key the transport must present for this bot.
    #[builder(into)]
    pub access_key: Option<String>,
    #[builder(default = DEFAULT_HISTORY_LENGTH)]
    pub history_length: NonZeroUsize,
    #[builder(default = DEFAULT_TEMPERATURE)]
    pub temperature: f64,
    #[builder(default = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,
    #[builder(default = DEFAULT_MOUNT_PATH.to_string())]
    pub mount_path: String,
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("name", &self.name)
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("host", &self.host)
            .field("access_key", &self.access_key.as_ref().map(|_| ".."))
            .field("history_length", &self.history_length)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("mount_path", &self.mount_path)
            .finish()
    }
}

impl BotConfig {
    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings::builder()
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
    }
}

/// One `[[bot_configs]]` entry as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfigFile {
    pub model: String,
    #[serde(default = "default_bot_type")]
    pub bot_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poe_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default = "default_history_length")]
    pub history_length: i64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_num_predict")]
    pub num_predict: i64,
    #[serde(default = "default_sub_url")]
    pub sub_url: String,
}

fn default_bot_type() -> String {
    BackendType::HostedApi.to_string()
}

fn default_history_length() -> i64 {
    DEFAULT_HISTORY_LENGTH.get() as i64
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_num_predict() -> i64 {
    i64::from(DEFAULT_MAX_TOKENS)
}

fn default_sub_url() -> String {
    DEFAULT_MOUNT_PATH.to_string()
}

impl BotConfigFile {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            bot_type: default_bot_type(),
            bot_name: None,
            api_base: None,
            api_key: None,
            poe_key: None,
            host: None,
            history_length: default_history_length(),
            temperature: default_temperature(),
            num_predict: default_num_predict(),
            sub_url: default_sub_url(),
        }
    }

    /// The bot's display name: `bot_name`, or the model when unset.
    pub fn display_name(&self) -> String {
        self.bot_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.model.clone())
    }

    /// Validate this entry into an immutable [`BotConfig`].
    pub fn to_bot_config(&self) -> Result<BotConfig, ConfigError> {
        let name = self.display_name();
        let invalid = |field: &str, message: String| ConfigError::InvalidValue {
            bot: name.clone(),
            field: field.to_string(),
            message,
        };

        let backend = BackendType::parse(&self.bot_type)?;

        if self.model.trim().is_empty() {
            return Err(invalid("model", "must not be empty".into()));
        }

        let history_length = usize::try_from(self.history_length)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| ConfigError::InvalidHistoryLength {
                bot: name.clone(),
                value: self.history_length,
            })?;

        if !self.temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(invalid(
                "temperature",
                format!("{} is outside 0.0..={MAX_TEMPERATURE}", self.temperature),
            ));
        }

        let max_tokens = u32::try_from(self.num_predict)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| invalid("num_predict", format!("{} is not a positive token count", self.num_predict)))?;

        if !self.sub_url.starts_with('/') {
            return Err(invalid("sub_url", format!("{:?} must start with '/'", self.sub_url)));
        }

        let api_key = resolve_secret(&name, "api_key", self.api_key.as_deref())?;
        if backend == BackendType::HostedApi && api_key.is_none() {
            return Err(ConfigError::MissingCredential {
                bot: name,
                field: "api_key".into(),
            });
        }
        let access_key = resolve_secret(&name, "poe_key", self.poe_key.as_deref())?;

        Ok(BotConfig {
            name,
            backend,
            model: self.model.trim().to_string(),
            api_base: non_empty(self.api_base.as_deref()).unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key,
            host: non_empty(self.host.as_deref()).unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string()),
            access_key,
            history_length,
            temperature: self.temperature,
            max_tokens,
            mount_path: self.sub_url.clone(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolve a secret value. `env:NAME` reads `NAME` from the environment; an
/// empty value counts as unset.
fn resolve_secret(bot: &str, field: &str, value: Option<&str>) -> Result<Option<String>, ConfigError> {
    let Some(value) = non_empty(value) else {
        return Ok(None);
    };
    match value.strip_prefix(ENV_PREFIX) {
        Some(var) => std::env::var(var.trim())
            .ok()
            .filter(|v| !v.is_empty())
            .map(Some)
            .ok_or_else(|| ConfigError::MissingCredential {
                bot: bot.to_string(),
                field: format!("{field} (environment variable {} not set)", var.trim()),
            }),
        None => Ok(Some(value)),
    }
}

/// Whole-application configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_log_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_log_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file_path: Option<PathBuf>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_changelog")]
    pub changelog: String,
    #[serde(default)]
    pub bot_configs: Vec<BotConfigFile>,
}

fn default_listen_host() -> String {
    DEFAULT_LISTEN_HOST.to_string()
}

fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_changelog() -> String {
    DEFAULT_CHANGELOG.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
            log_level: default_log_level(),
            console_log_level: None,
            file_log_level: None,
            log_file_path: None,
            version: default_version(),
            changelog: default_changelog(),
            bot_configs: Vec::new(),
        }
    }
}

impl FromStr for AppConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

impl AppConfig {
    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }

    /// Validate every bot entry. Fails on the first invalid entry or on two
    /// bots sharing a mount path.
    pub fn bot_configs(&self) -> Result<Vec<BotConfig>, ConfigError> {
        let mut mounts = HashSet::new();
        self.bot_configs
            .iter()
            .map(|entry| {
                let config = entry.to_bot_config()?;
                if !mounts.insert(config.mount_path.clone()) {
                    return Err(ConfigError::DuplicateMount(config.mount_path));
                }
                Ok(config)
            })
            .collect()
    }

    /// Command handler serving this configuration's version and changelog.
    pub fn command_handler(&self) -> CommandHandler {
        CommandHandler::new(&self.version, &self.changelog)
    }

    pub fn console_log_level(&self) -> &str {
        self.console_log_level.as_deref().unwrap_or(&self.log_level)
    }

    pub fn file_log_level(&self) -> &str {
        self.file_log_level.as_deref().unwrap_or(&self.log_level)
    }

    /// An example configuration with one hosted and one self-hosted bot.
    pub fn example() -> Self {
        let hosted = BotConfigFile {
            bot_name: Some("gpt-4o".into()),
            api_base: Some(DEFAULT_API_BASE.into()),
            api_key: Some(format!("{ENV_PREFIX}OPENAI_API_KEY")),
            poe_key: Some("your_poe_key".into()),
            temperature: 0.7,
            num_predict: 2048,
            ..BotConfigFile::new("gpt-4o")
        };
        let local = BotConfigFile {
            bot_type: BackendType::SelfHosted.to_string(),
            bot_name: Some("llama".into()),
            host: Some(DEFAULT_OLLAMA_HOST.into()),
            poe_key: Some("your_other_poe_key".into()),
            sub_url: "/llama".into(),
            ..BotConfigFile::new("llama3.1")
        };
        Self {
            log_file_path: Some(PathBuf::from("./logs/app.log")),
            bot_configs: vec![hosted, local],
            ..Self::default()
        }
    }

    /// Write [`AppConfig::example`] to `path`, creating parent directories.
    pub fn write_example(path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let write_error = |message: String| ConfigError::Write {
            path: path.to_path_buf(),
            message,
        };

        let contents = toml::to_string_pretty(&Self::example()).map_err(|e| write_error(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
        }
        fs::write(path, contents).map_err(|e| write_error(e.to_string()))
    }
}
