mod check_cmd;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use infinigpt_channels::{ChannelAdapter, MatrixAdapter};
use infinigpt_commands::{BotIdentity, CommandRouter, RoomDispatcher, RouterSettings};
use infinigpt_config::{default_config_path, load_raw, prepare, redact, BotConfig};
use infinigpt_core::{ChatTransport, EventBus};
use infinigpt_gateway::HttpGateway;
use infinigpt_logging::init_logger;
use infinigpt_security::{AccessPolicy, ModerationFilter, TokenIssuer};
use infinigpt_session::ConversationStore;

#[derive(Parser)]
#[command(name = "infinigpt")]
#[command(about = "InfiniGPT: a Matrix chat bot backed by an LLM gateway")]
#[command(version)]
struct Cli {
    /// Config file (YAML or JSON). Defaults to $INFINIGPT_CONFIG, ./config.yaml,
    /// then ~/.infinigpt/config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Matrix and serve rooms (the default)
    Run,
    /// Validate the config and signing key without connecting to Matrix
    Check {
        /// Also fetch the gateway model list with a signed token
        #[arg(long)]
        probe: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli.config.unwrap_or_else(default_config_path);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let config = load_config(&path).await?;
            run_bot(config).await
        }
        Commands::Check { probe } => check_cmd::run(&path, probe).await,
    }
}

/// Read the config, start logging at its level, then finish preparing it.
///
/// Logging comes up before validation so config warnings are not lost.
async fn load_config(path: &Path) -> Result<BotConfig> {
    let raw = load_raw(path).await?;
    start_logging(&raw);
    debug!(config = %redact(&raw), "Effective config (redacted)");
    prepare(raw).context("Invalid configuration")
}

fn start_logging(raw: &Value) {
    let logging = &raw["logging"];
    let level = logging["level"].as_str().unwrap_or("info");
    let dir = logging["dir"].as_str().map(PathBuf::from);
    let json = logging["json"].as_bool().unwrap_or(false);
    init_logger(level, dir.as_deref(), json);
}

async fn run_bot(config: BotConfig) -> Result<()> {
    info!(
        homeserver = %config.matrix.homeserver_url,
        user = %config.matrix.user_id,
        gateway = %config.gateway.endpoint,
        "Starting InfiniGPT"
    );

    // Fatal at startup: a bot that cannot sign requests must not serve.
    let signer = Arc::new(TokenIssuer::from_config(&config.jwt)?);
    let access = AccessPolicy::from_config(&config.access);
    let store = Arc::new(ConversationStore::from_config(&config));
    let gateway = Arc::new(HttpGateway::from_config(&config.gateway)?);
    let adapter = Arc::new(MatrixAdapter::new(config.matrix.clone(), access.clone())?);

    let mut identity = BotIdentity::new(&config.matrix.user_id);
    if let Some(name) = adapter.display_name(&config.matrix.user_id).await {
        info!(name = %name, "Bot display name");
        identity = identity.with_display_name(name);
    }

    let router = Arc::new(
        CommandRouter::new(
            store,
            gateway,
            adapter.clone(),
            signer,
            RouterSettings::from_config(&config, identity),
        )
        .with_moderation(ModerationFilter::from_config(&config.moderation))
        .with_access(access),
    );

    if let Err(e) = router.refresh_models().await {
        warn!(error = %e, "Could not fetch gateway model list; offering configured models");
    }

    let mut bus = EventBus::new();
    let inbound_rx = bus
        .take_inbound_rx()
        .context("inbound receiver already taken")?;
    let dispatcher = tokio::spawn(RoomDispatcher::new(Arc::clone(&router)).run(inbound_rx));

    info!(adapter = adapter.name(), "All components started");

    let inbound_tx = bus.inbound_tx.clone();
    drop(bus);
    tokio::select! {
        result = adapter.start(inbound_tx) => {
            if let Err(e) = result {
                error!(error = %e, "Matrix adapter stopped");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    // The adapter future (and its sender) is gone; let rooms drain.
    if let Err(e) = dispatcher.await {
        warn!(error = %e, "Dispatcher task failed");
    }
    info!("InfiniGPT stopped");
    Ok(())
}
