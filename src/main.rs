use std::sync::Arc;

use tracing::{info, warn};

use warden::config::Config;
use warden::dispatch::CommandDispatcher;
use warden::gateway::{AlertSink, Gateway, HttpTransport};
use warden::hooks::{LoggingAutomation, LoggingMessageQueue, NoopRaidDetector, StaticEntitlements};
use warden::ingest::{IngestPipeline, Poller, RaidFilter};
use warden::store::SqliteStore;

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };

    // Initialize logging
    if let Err(e) = warden::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        warden::logging::init_console_only(&config.logging.level);
    }

    info!("Warden - game server moderation bridge");

    if let Err(e) = run(config).await {
        tracing::error!("fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> warden::Result<()> {
    config.validate()?;

    let store = Arc::new(SqliteStore::open(&config.database.path).await?);
    info!("moderation record at {}", config.database.path);

    let transport = Arc::new(HttpTransport::new(&config.upstream)?);
    let alerts = AlertSink::new(&config.alerts.webhook_url);
    let gateway = Gateway::new(config.upstream.clone(), transport, alerts);

    // Probe each credential once so a revoked key shows up at startup
    // instead of as silent empty polls.
    for server in &config.servers {
        match gateway.get_server(&server.server_key).await {
            Ok(status) => info!(
                "{}: connected to {:?} ({}/{} players online)",
                server.server_id, status.name, status.current_players, status.max_players
            ),
            Err(e) => warn!("{}: upstream check failed: {}", server.server_id, e),
        }
    }

    // External collaborators default to logging stand-ins until wired up.
    let automation: Arc<dyn warden::hooks::AutomationHook> = Arc::new(LoggingAutomation);
    let dispatcher = Arc::new(CommandDispatcher::new(
        gateway.clone(),
        store.clone(),
        automation.clone(),
        config.moderation.clone(),
    ));
    let raid = RaidFilter::new(
        store.clone(),
        Arc::new(NoopRaidDetector),
        Arc::new(LoggingMessageQueue),
        Arc::new(StaticEntitlements::new()),
    );
    let pipeline = Arc::new(IngestPipeline::new(
        gateway,
        store,
        automation,
        dispatcher,
        raid,
    ));

    if config.servers.is_empty() {
        warn!("no servers configured; the poller will idle");
    }

    let poller = Poller::with_interval(
        pipeline,
        config.servers.clone(),
        config.polling.interval_secs,
    );
    poller.run().await;
    Ok(())
}
