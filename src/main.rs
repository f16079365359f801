use actix_web::{App, HttpServer, web};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod app;
mod model;
mod retriever;
mod service;

use app::AppState;
use model::Config;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (ignore if missing)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;
    let bind_addr = config.bind_addr();

    let shutdown = CancellationToken::new();
    let state = AppState::new(&config, shutdown.clone()).map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize services");
        std::io::Error::other(e.to_string())
    })?;
    let state = web::Data::new(state);

    // Interrupt running analyses as soon as shutdown starts
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, cancelling running analyses");
            signal_token.cancel();
        }
    });

    tracing::info!(
        max_concurrent_runs = config.server.max_concurrent_runs,
        "Starting Arcadia Trace server on {}",
        bind_addr
    );

    let result = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::analysis::configure)
            .configure(api::health::configure)
            .configure(api::openapi::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await;

    // Stop any run still in flight
    shutdown.cancel();
    tracing::info!("Server stopped");

    result
}
