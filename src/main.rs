use std::net::SocketAddr;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use launchpad_gateway::router::build_router;
use launchpad_gateway::startup::initialize_app;
use launchpad_gateway::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (reads .env first)
    let config = Config::from_env()?;

    let default_filter = format!("launchpad_gateway={},tower_http=info", config.log_level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    if config.is_production() {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    info!("Loaded configuration for environment: {}", config.environment);

    let port = config.port;
    let app_state = initialize_app(config).await?;
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting launchpad gateway on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for SIGTERM or SIGINT signal for graceful shutdown
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully");
        },
    }
}
