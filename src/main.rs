//! poe-gateway binary entry point.

use std::sync::Arc;

use poe_gateway::cli::{Cli, Commands, InitConfigArgs, ServeArgs};
use poe_gateway::config::AppConfig;
use poe_gateway::error::GatewayError;
use poe_gateway::registry::BotRegistry;
use poe_gateway::{logging, server};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse_args();

    let result = match cli.command {
        Commands::Serve(args) => handle_serve(args).await,
        Commands::InitConfig(args) => handle_init_config(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_serve(args: ServeArgs) -> Result<(), GatewayError> {
    let mut config = AppConfig::load(&args.config)?;
    args.apply(&mut config);

    let _log_guard = logging::init(&args.log_settings(&config))?;
    tracing::info!(config = %args.config.display(), "configuration loaded");

    let registry = BotRegistry::from_app_config(&config).map_err(|e| {
        tracing::error!(error = %e, "invalid bot configuration");
        e
    })?;
    if registry.is_empty() {
        tracing::warn!("no bots configured");
    }

    server::serve(Arc::new(registry), &config.listen_host, config.listen_port).await
}

fn handle_init_config(args: InitConfigArgs) -> Result<(), GatewayError> {
    AppConfig::write_example(&args.output)?;
    println!("Wrote example configuration to {}", args.output.display());
    Ok(())
}
