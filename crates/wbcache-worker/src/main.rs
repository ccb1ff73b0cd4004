mod runner;
mod scheduler;
mod validate;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wbcache_aggregator::{Aggregator, PipelineStores};
use wbcache_db::PgStore;

use crate::runner::TickRunner;

#[derive(Debug, Parser)]
#[command(name = "wbcache-worker")]
#[command(about = "Wildberries product-cache aggregation worker")]
struct Cli {
    /// Run a single pipeline tick and exit.
    #[arg(long)]
    once: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check a seller API key's scopes, expiry, and connectivity.
    ValidateKey {
        /// Validate the key stored on this supplier record.
        #[arg(long, conflicts_with = "api_key")]
        supplier_id: Option<i64>,

        /// Validate a raw key instead of a stored one.
        #[arg(long, env = "WBCACHE_WB_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Write the result back to the supplier's `is_valid` flag.
        #[arg(long, requires = "supplier_id")]
        record: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Arc::new(wbcache_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = wbcache_db::PoolConfig::from_app_config(&config);
    let pool = wbcache_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = wbcache_db::run_migrations(&pool).await?;
    tracing::info!(env = %config.env, applied, "database ready");

    if let Some(Commands::ValidateKey {
        supplier_id,
        api_key,
        record,
    }) = cli.command
    {
        return validate::run(&pool, &config, supplier_id, api_key, record).await;
    }

    let stores = PipelineStores::shared(Arc::new(PgStore::new(pool.clone())));
    let aggregator = Aggregator::from_app_config(&config, stores)?;
    let runner = Arc::new(TickRunner::new(aggregator, pool));

    if cli.once {
        runner.run("once").await?;
        return Ok(());
    }

    if let Err(e) = runner.run("startup").await {
        tracing::error!(error = %e, "startup tick failed, continuing on schedule");
    }

    let interval = Duration::from_secs(config.worker_interval_secs);
    let mut scheduler = scheduler::build_scheduler(Arc::clone(&runner), interval).await?;
    tracing::info!(interval_secs = config.worker_interval_secs, "worker scheduled");

    shutdown_signal().await;
    scheduler.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, stopping worker");
}
