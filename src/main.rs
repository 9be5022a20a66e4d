use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use courier_gateway::api::{self, ApiState};
use courier_gateway::db::{self, ConversationRepo, InstanceRepo, OutboundMessageRepo};
use courier_gateway::dispatch::Dispatcher;
use courier_gateway::media::{BlobStore, LocalBlobStore, MediaIngestor};
use courier_gateway::provider::HttpProvider;
use courier_gateway::session::SessionManager;
use courier_gateway::Config;

/// Courier - messaging gateway for CRM backends
#[derive(Parser)]
#[command(name = "courier", version, about)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides configuration)
    #[arg(long, env = "COURIER_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,courier_gateway=info",
        1 => "info,courier_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let port = cli.port.unwrap_or(config.api_server.port);

    std::fs::create_dir_all(&config.data_dir)?;
    let pool = db::init(&config.db_path())?;
    tracing::info!(db = %config.db_path().display(), "database ready");

    let instances = InstanceRepo::new(pool.clone());
    let conversations = ConversationRepo::new(pool.clone());
    let outbound = OutboundMessageRepo::new(pool);

    let provider = Arc::new(HttpProvider::new(&config.provider)?);
    let blobs = Arc::new(LocalBlobStore::new(&config.storage));
    let ingestor = MediaIngestor::new(
        Arc::clone(&blobs) as Arc<dyn BlobStore>,
        Duration::from_secs(config.storage.signed_url_ttl_days * 24 * 60 * 60),
    );

    let sessions = SessionManager::new(
        Arc::clone(&provider) as _,
        instances.clone(),
        &config.provider.webhook_base_url,
    );
    let dispatcher = Dispatcher::new(
        provider,
        ingestor,
        instances.clone(),
        conversations.clone(),
        outbound.clone(),
        config.messaging.default_country_code.clone(),
    );

    let state = Arc::new(ApiState {
        sessions,
        dispatcher,
        instances,
        conversations,
        outbound,
        blobs,
    });

    tracing::info!(port, "starting courier gateway");
    api::serve(state, port).await?;
    Ok(())
}
