//! Readings gateway — HTTP API in front of the datamanager gRPC service.
//!
//! Configuration comes from the environment (see [`readings_gateway::config`]).

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use readings_gateway::{
    backend::GrpcReadingBackend,
    config::GatewayConfig,
    handlers::{self, AppState},
    service::ReadingsGateway,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("readings_gateway=info".parse()?)
                .add_directive("gateway=info".parse()?),
        )
        .json()
        .init();

    let cfg = GatewayConfig::from_env()?;
    info!(backend = %cfg.backend_url, "connecting to readings backend");

    let backend = Arc::new(GrpcReadingBackend::connect(&cfg.backend_url)?);
    let state = Arc::new(AppState {
        gateway: ReadingsGateway::new(backend.clone()),
    });
    let app = handlers::router(state);

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr).await?;
    info!(addr = %cfg.listen_addr, prefix = handlers::API_PREFIX, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match Arc::try_unwrap(backend) {
        Ok(backend) => backend.close(),
        Err(_) => warn!("backend client still shared at shutdown; dropping"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
