use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::client::slurm_client::SlurmClient;
use crate::common::config::Config;
use crate::server::discovery::DiscoveryService;
use crate::server::rest_server::{AppState, rest_server_start, router};

/// Runs discovery and the HTTP server until `shutdown` fires or the server fails.
pub async fn server_start(config: Config, shutdown: CancellationToken) -> anyhow::Result<()> {
    config.validate()?;
    let interval = config.interval()?;
    let listen_addr = config.listen_addr()?;

    let client = SlurmClient::new(
        &config.slurm_api_endpoint,
        &config.slurm_api_version,
        config.slurm_api_username.clone(),
        config.slurm_api_token.clone(),
    )?;
    log::info!("Using Slurm REST API at {}", client.nodes_url());

    let service = Arc::new(DiscoveryService::new(client, config.jobs.clone(), interval));
    let state = AppState {
        targets: service.cache(),
    };

    // bind before polling starts so a failed startup leaves nothing running
    let listener = tokio::net::TcpListener::bind(listen_addr.as_str())
        .await
        .with_context(|| format!("failed to bind {}", listen_addr))?;
    log::info!("Starting HTTP server on {}", listen_addr);

    let discovery = {
        let service = Arc::clone(&service);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { service.run(shutdown).await })
    };

    let served = rest_server_start(listener, router(state), shutdown.clone()).await;
    if let Err(e) = &served {
        log::error!("HTTP server error: {:?}", e);
    }

    // stop discovery whether the server ended on request or on failure
    shutdown.cancel();
    if let Err(e) = discovery.await {
        log::error!("Discovery task failed: {:?}", e);
    }

    log::info!("Server stopped");
    served
}

/// Cancels `shutdown` on SIGINT or SIGTERM.
pub async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for SIGINT: {}", e);
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
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received SIGINT, shutting down"),
        _ = terminate => log::info!("Received SIGTERM, shutting down"),
        _ = shutdown.cancelled() => return,
    }
    shutdown.cancel();
}
