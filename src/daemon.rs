use crate::calendar::{CalendarOverview, QueryResponse};
use crate::planner::QueryOrchestrator;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

// Messages sent between CLI and daemon, one request per connection
#[derive(Serialize, Deserialize, Debug)]
pub enum DaemonRequest {
    Query { question: String },
    Overview,
    Health,
    Shutdown,
}

#[derive(Serialize, Deserialize, Debug)]
pub enum DaemonResponse {
    Answer(QueryResponse),
    Overview(CalendarOverview),
    Ok,
    Error(String),
}

/// Serve requests on `socket` until Ctrl-C or a `Shutdown` request.
pub async fn start_daemon(socket: PathBuf, orchestrator: Arc<QueryOrchestrator>) -> Result<()> {
    // Remove old socket if exists
    let _ = std::fs::remove_file(&socket);

    let listener =
        UnixListener::bind(&socket).context(format!("Failed to bind to socket: {:?}", socket))?;

    info!(socket = %socket.display(), providers = ?orchestrator.providers().names(), "daemon started");

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        signal::ctrl_c().await.ok();
        info!("interrupt received, shutting down");
        let _ = ctrl_c_tx.send(());
    });

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _)) => {
                        let orchestrator = orchestrator.clone();
                        let shutdown_tx = shutdown_tx.clone();
                        let mut client_shutdown = shutdown_tx.subscribe();

                        tokio::spawn(async move {
                            tokio::select! {
                                result = handle_client(stream, orchestrator, shutdown_tx) => {
                                    if let Err(e) = result {
                                        warn!(error = %e, "client error");
                                    }
                                }
                                _ = client_shutdown.recv() => {
                                    debug!("client connection closed due to shutdown");
                                }
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "accept error");
                    }
                }
            }

            _ = shutdown_rx.recv() => {
                info!("shutdown signal received, exiting");
                break;
            }
        }
    }

    let _ = std::fs::remove_file(&socket);
    Ok(())
}

async fn handle_client(
    mut stream: UnixStream,
    orchestrator: Arc<QueryOrchestrator>,
    shutdown: broadcast::Sender<()>,
) -> Result<()> {
    // The client shuts down its write half after sending
    let mut buffer = Vec::new();
    stream
        .read_to_end(&mut buffer)
        .await
        .context("Failed to read from socket")?;

    if buffer.is_empty() {
        return Ok(());
    }

    let request = serde_json::from_slice::<DaemonRequest>(&buffer);
    let stop_after = matches!(request, Ok(DaemonRequest::Shutdown));
    let response = match request {
        Ok(request) => dispatch(request, &orchestrator).await,
        Err(e) => DaemonResponse::Error(format!("Invalid request: {}", e)),
    };

    let response_bytes = serde_json::to_vec(&response)?;
    stream
        .write_all(&response_bytes)
        .await
        .context("Failed to write response")?;
    stream.shutdown().await?;

    // Only signal once the reply is out, the signal also cancels this task
    if stop_after {
        let _ = shutdown.send(());
    }

    Ok(())
}

async fn dispatch(request: DaemonRequest, orchestrator: &QueryOrchestrator) -> DaemonResponse {
    match request {
        DaemonRequest::Query { question } => {
            debug!(question = %question, "query request");
            DaemonResponse::Answer(orchestrator.handle_request(&question).await)
        }
        DaemonRequest::Overview => DaemonResponse::Overview(orchestrator.overview().await),
        DaemonRequest::Health => DaemonResponse::Ok,
        DaemonRequest::Shutdown => {
            info!("shutdown requested by client");
            DaemonResponse::Ok
        }
    }
}

/// Send a request to the daemon
pub async fn send_to_daemon(socket: &Path, request: DaemonRequest) -> Result<DaemonResponse> {
    if !socket.exists() {
        anyhow::bail!("Daemon not running (socket not found)");
    }

    let mut stream = UnixStream::connect(socket)
        .await
        .context("Failed to connect to daemon")?;

    let request_bytes = serde_json::to_vec(&request)?;
    stream.write_all(&request_bytes).await?;
    stream.shutdown().await?;

    let mut buffer = Vec::new();
    stream.read_to_end(&mut buffer).await?;

    let response: DaemonResponse =
        serde_json::from_slice(&buffer).context("Failed to parse daemon response")?;
    Ok(response)
}

/// Check if daemon is running
pub async fn is_daemon_running(socket: &Path) -> bool {
    matches!(
        send_to_daemon(socket, DaemonRequest::Health).await,
        Ok(DaemonResponse::Ok)
    )
}

/// Stop the running daemon
pub async fn stop_daemon(socket: &Path) -> Result<()> {
    match send_to_daemon(socket, DaemonRequest::Shutdown).await {
        Ok(_) => {
            eprintln!("✓ Daemon stopped");
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Daemon not running or failed to stop: {}", e);
            Err(e)
        }
    }
}
