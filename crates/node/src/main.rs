//! Weavegate node command line.

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::RunCmd;
use wc_db::schema::SchemaInitializer;
use wc_db::{MemBackend, StoreClient};
use wc_gateway_client::NodeProvider;
use wc_sync::SyncOrchestrator;
use wp_utils::parsers::parse_contact_points;
use wp_utils::service::ServiceContext;

const GREET_IMPL_NAME: &str = "Weavegate";
const GREET_SUPPORT_URL: &str = "https://github.com/weavegate/weavegate/issues";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let run_cmd = RunCmd::parse();

    tracing::info!("🕸  {} Node", GREET_IMPL_NAME);
    tracing::info!("✌️  Version {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("💁 Support URL: {}", GREET_SUPPORT_URL);
    tracing::info!("🌐 Remote node: {}", run_cmd.node_url);

    let contact_points = parse_contact_points(&run_cmd.db_params.contact_points)
        .context("Parsing CASSANDRA_CONTACT_POINTS")?;
    // Validated up front so a broken deployment dies here, not mid-sync.
    let sync_config = run_cmd.sync_params.sync_config()?;

    let store: Arc<dyn StoreClient> = if run_cmd.devnet {
        tracing::info!("🧪 Devnet mode: using the in-memory store backend");
        MemBackend::new()
    } else {
        // The wire driver is deployment-specific and plugs in behind the
        // StoreClient seam.
        bail!(
            "No store driver is wired into this build for {contact_points:?}; \
             run with --devnet or link a StoreClient implementation"
        );
    };

    let schema = SchemaInitializer::new(Arc::clone(&store), run_cmd.db_params.replication_factor);
    tokio::time::timeout(Duration::from_secs(run_cmd.db_params.db_timeout), schema.initialize())
        .await
        .context("Timed out waiting for schema agreement")?
        .context("Initializing the schema")?;
    if run_cmd.schema_init_only {
        tracing::info!("🛠  Schema initialized, exiting");
        return Ok(());
    }

    let node = Arc::new(NodeProvider::new(run_cmd.node_url.clone()));
    let orchestrator = SyncOrchestrator::new(node, store, sync_config)
        .await
        .context("Starting the worker pool")?;

    let ctx = ServiceContext::new();
    let signal_ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("🛑 Shutdown requested");
            signal_ctx.cancel_global();
        }
    });

    orchestrator.start_sync(ctx).await
}
