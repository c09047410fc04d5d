use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod bootstrap;

/// Worker-only binary: drains the ingestion queues without serving HTTP.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let core = bootstrap::init().await?;
    let pools = bootstrap::spawn_workers(&core);
    info!("worker process started");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    bootstrap::shutdown_workers(pools).await;
    info!("shutdown complete");
    Ok(())
}
