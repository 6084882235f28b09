use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::companion::CompanionServer;
use crate::backend::remote::RemoteInferencer;
use crate::backend::NoopObserver;
use crate::config::{
    default_socket_path, AssistConfig, BackendConfig, DEFAULT_API_URL, DEFAULT_COMPLETION_URL,
    DEFAULT_REMOTE_TIMEOUT_SECS,
};
use crate::error::Result;

/// Run a companion process that forwards requests to the remote endpoint.
pub async fn run_serve(config_path: Option<&Path>, socket: Option<PathBuf>) -> Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = AssistConfig::load(config_path, &cwd)?;

    // A companion-mode config still names the socket clients connect to; the
    // companion itself always forwards to a remote endpoint.
    let (api_url, completion_url, timeout_secs, configured_socket) = match config.backend.clone() {
        BackendConfig::Remote {
            api_url,
            completion_url,
            timeout_secs,
        } => (api_url, completion_url, timeout_secs, None),
        BackendConfig::Companion { socket_path, .. } => (
            DEFAULT_API_URL.to_string(),
            DEFAULT_COMPLETION_URL.to_string(),
            DEFAULT_REMOTE_TIMEOUT_SECS,
            socket_path,
        ),
    };

    let backend = RemoteInferencer::new(
        api_url,
        completion_url,
        timeout_secs,
        config.history_capacity,
        Arc::new(NoopObserver),
    )?
    .with_default_params(config.params.clone());

    let socket_path = socket
        .or(configured_socket)
        .unwrap_or_else(default_socket_path);
    let server = CompanionServer::new(socket_path.clone());

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.notify_one();
        }
    });

    eprintln!("assist-relay: companion listening on {}", socket_path.display());
    server.serve(Arc::new(backend)).await?;
    eprintln!("assist-relay: companion stopped");
    Ok(())
}
