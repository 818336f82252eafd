//! hedera-agent - Hedera network actions for conversational agents
//!
//! This is the main entry point for the hedera-agent binary.

use anyhow::{bail, Context, Result};
use clap::Parser;
use hedera_agent_plugin::config::Config;
use hedera_agent_plugin::ledger::{HederaSdkConnector, LedgerNetwork, Operator};
use hedera_agent_plugin::llm::OpenAiCompatibleClient;
use hedera_agent_plugin::plugin::{HederaPlugin, HederaService, PluginSettings, SERVICE_TYPE};
use hedera_agent_plugin::runtime::{get_service_as, Content, LocalRuntime, Memory};
use hedera_agent_plugin::toolkit::{GetHbarBalanceQueryTool, Tool};
use secrecy::ExposeSecret;
use serde_json::Map;
use std::sync::Arc;
use tracing::info;

mod cli;

use cli::{Args, Command};

const AGENT_NAME: &str = "Hedera Agent";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.debug, args.json_logs);

    info!("Starting hedera-agent v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(variant) = args.variant {
        config.plugin.variant = variant;
    }
    config.validate().context("Invalid configuration")?;

    match args.command {
        Command::Check => check(&config),
        Command::Actions => list_actions(&config),
        Command::Account => show_account(&config).await,
        Command::Run {
            action,
            message,
            json,
        } => run_action(&config, &action, &message, json).await,
    }
}

/// Validate settings without touching the network
fn check(config: &Config) -> Result<()> {
    let settings = PluginSettings::validate(&config.settings())?;
    let operator = Operator::new(&settings.account_id, settings.private_key.expose_secret())?;
    let network: LedgerNetwork = config.hedera.network.parse()?;

    println!(
        "Configuration OK: operator {} on {} ({} plugin, modules: {})",
        operator.account_id,
        network,
        config.plugin.variant,
        config.toolkit.plugins.join(", ")
    );
    Ok(())
}

/// Build a runtime with the plugin initialized
fn build_runtime(config: &Config) -> Result<LocalRuntime> {
    let model = OpenAiCompatibleClient::new(config.ai.clone())?;
    let settings = config.settings();
    let runtime = LocalRuntime::new(AGENT_NAME, settings.clone(), Arc::new(model));

    let plugin = HederaPlugin::from_config(config, Arc::new(HederaSdkConnector))?;
    plugin.init(&settings, &runtime)?;
    Ok(runtime)
}

fn list_actions(config: &Config) -> Result<()> {
    let runtime = build_runtime(config)?;
    for action in runtime.actions() {
        println!("{:<40} {}", action.name(), action.description());
        if !action.similes().is_empty() {
            println!("{:<40} also: {}", "", action.similes().join(", "));
        }
    }
    Ok(())
}

async fn show_account(config: &Config) -> Result<()> {
    let runtime = build_runtime(config)?;
    let service = get_service_as::<HederaService>(&runtime, SERVICE_TYPE)
        .context("Hedera service was not registered")?;

    let tool = GetHbarBalanceQueryTool::new();
    let output = tool
        .execute(
            service.get_client().as_ref(),
            &service.get_configuration().context,
            Map::new(),
        )
        .await?;

    println!("{}", output["humanMessage"].as_str().unwrap_or_default());
    Ok(())
}

async fn run_action(config: &Config, action: &str, text: &str, json: bool) -> Result<()> {
    let runtime = build_runtime(config)?;
    let message = Memory::new("user", text);
    runtime.remember(message.clone());

    let mut print = |content: Content| {
        if !json {
            println!("{}", content.text);
        }
    };
    let result = runtime.run_action(action, &message, Some(&mut print)).await;
    runtime.shutdown().await;
    let result = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    if !result.success {
        bail!(
            "Action {} failed: {}",
            action,
            result.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    Ok(())
}

/// Initialize the logging/tracing subsystem
fn init_logging(debug: bool, json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
