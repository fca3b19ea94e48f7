use axum::{Router, routing::get};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::rest::{health::health, targets::get_targets};
use crate::server::discovery::TargetCache;

/// How long in-flight requests may keep running once shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AppState {
    pub targets: Arc<TargetCache>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/targets", get(get_targets))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `router` until `shutdown` fires, then drains open requests for at most
/// [`SHUTDOWN_GRACE`] before aborting them.
pub async fn rest_server_start(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let graceful = shutdown.clone();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move { graceful.cancelled().await });
    let mut handle = tokio::spawn(async move { server.await });

    tokio::select! {
        res = &mut handle => {
            res??;
            return Ok(());
        }
        _ = shutdown.cancelled() => {}
    }

    match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
        Ok(res) => res??,
        Err(_) => {
            log::warn!("HTTP server did not drain within {:?}, aborting", SHUTDOWN_GRACE);
            handle.abort();
        }
    }

    Ok(())
}
