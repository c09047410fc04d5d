use api_router::{api_routes, api_state::ApiState};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod bootstrap;

/// HTTP-edge-only binary; pair with the `worker` binary for queue
/// consumption.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let core = bootstrap::init().await?;

    let state = ApiState::new(
        Arc::clone(&core.db),
        core.config.clone(),
        core.storage.clone(),
        Arc::clone(&core.ingestion),
        core.search.clone(),
        Arc::clone(&core.matching),
        Arc::clone(&core.audit),
    );
    let app = Router::new()
        .merge(api_routes(&state))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let serve_address = format!("0.0.0.0:{}", core.config.http_port);
    info!("Starting server listening on {serve_address}");
    let listener = tokio::net::TcpListener::bind(serve_address).await?;

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown signal received");
    });
    if let Err(e) = server.await {
        error!("Server error: {e}");
    }
    Ok(())
}
