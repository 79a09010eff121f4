//! Observer HTTP server lifecycle.
//!
//! [`start_server`] binds and serves until its shutdown future resolves.
//! [`spawn_observer`] binds eagerly, so address problems surface at
//! startup, then serves on a background task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use providence_core::config::ObserverConfig;
use providence_core::generation::ContentGenerator;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::router::build_router;
use crate::state::AppState;

/// Errors that can occur when starting or running the Observer server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

async fn bind(config: &ObserverConfig) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))
}

async fn serve<G, F>(
    listener: TcpListener,
    state: Arc<AppState<G>>,
    shutdown: F,
) -> Result<(), ServerError>
where
    G: ContentGenerator,
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))
}

/// Bind and serve until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is invalid or taken, and
/// [`ServerError::Serve`] on a fatal I/O error while serving.
pub async fn start_server<G, F>(
    config: &ObserverConfig,
    state: Arc<AppState<G>>,
    shutdown: F,
) -> Result<(), ServerError>
where
    G: ContentGenerator,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = bind(config).await?;
    info!(addr = ?listener.local_addr().ok(), "Observer server listening");
    serve(listener, state, shutdown).await
}

/// Bind now and serve on a background task until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is invalid or taken.
pub async fn spawn_observer<G, F>(
    config: &ObserverConfig,
    state: Arc<AppState<G>>,
    shutdown: F,
) -> Result<JoinHandle<()>, ServerError>
where
    G: ContentGenerator,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = bind(config).await?;
    let addr = listener.local_addr().ok();

    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, state, shutdown).await {
            error!(error = %e, "Observer server exited with error");
        }
    });

    info!(?addr, "Observer server spawned on background task");
    Ok(handle)
}
