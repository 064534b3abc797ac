//! Command-line interface for the gateway binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};
use crate::logging::LogSettings;

/// Poe bot gateway
#[derive(Parser, Debug)]
#[command(name = "poe-gateway", version, about = "Serve language-model bots over the Poe protocol")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP gateway
    Serve(ServeArgs),
    /// Write an example configuration file
    InitConfig(InitConfigArgs),
}

/// Arguments for `poe-gateway serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Configuration file (TOML)
    #[arg(short, long, env = "POE_GATEWAY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Listen address, overriding `listen_host`
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port, overriding `listen_port`
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log at debug level on the console
    #[arg(short, long)]
    pub verbose: bool,

    /// Level for both console and file output
    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long)]
    pub console_log_level: Option<String>,

    #[arg(long)]
    pub file_log_level: Option<String>,

    /// Log file, overriding `log_file_path`
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Arguments for `poe-gateway init-config`.
#[derive(Args, Debug)]
pub struct InitConfigArgs {
    /// Where to write the example
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub output: PathBuf,
}

impl ServeArgs {
    /// Fold command-line overrides into the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.listen_host = host.clone();
        }
        if let Some(port) = self.port {
            config.listen_port = port;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(level) = &self.console_log_level {
            config.console_log_level = Some(level.clone());
        }
        if let Some(level) = &self.file_log_level {
            config.file_log_level = Some(level.clone());
        }
        if let Some(path) = &self.log_file {
            config.log_file_path = Some(path.clone());
        }
    }

    /// Logging settings for `config`, after [`ServeArgs::apply`].
    pub fn log_settings(&self, config: &AppConfig) -> LogSettings {
        let console_level = if self.verbose {
            "debug".to_string()
        } else {
            config.console_log_level().to_string()
        };
        LogSettings {
            console_level,
            file_level: config.file_log_level().to_string(),
            file_path: config.log_file_path.clone(),
        }
    }
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
