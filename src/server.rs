// src/server.rs
// TCP front door of the arena: accepts players, enforces the connection cap
// and stops everything on request.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::archive::ResultArchive;
use crate::config::ServerConfig;
use crate::dispatcher::{ArenaState, serve_connection};
use crate::error::ServerError;
use crate::logging::{log_error, log_info, log_warning};
use crate::status::serve_status;

/// Running server. Dropping the handle stops the listeners too.
pub struct ServerHandle {
    local_addr: SocketAddr,
    status_addr: Option<SocketAddr>,
    state: Arc<ArenaState>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn status_addr(&self) -> Option<SocketAddr> {
        self.status_addr
    }

    pub fn state(&self) -> &Arc<ArenaState> {
        &self.state
    }

    /// Ask the listeners to stop; live connections are closed
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait until every server task has finished
    pub async fn stopped(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                log_error(&format!("Server task failed: {e}"));
            }
        }
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Bind the game listener (and the status listener when configured) and
/// start serving in the background
pub async fn start_server(
    config: ServerConfig,
    archive: Arc<dyn ResultArchive>,
) -> Result<ServerHandle, ServerError> {
    config.validate()?;
    let addr = config.game_addr()?;
    let listener = bind(addr).await?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| ServerError::Bind { addr, source })?;

    let status_listener = match config.status_addr()? {
        Some(addr) => Some(bind(addr).await?),
        None => None,
    };
    let status_addr = status_listener
        .as_ref()
        .and_then(|listener| listener.local_addr().ok());

    let state = Arc::new(ArenaState::new(&config, archive));
    let (shutdown, shutdown_rx) = watch::channel(false);

    log_info(&format!(
        "Arena listening on {local_addr}: {} player(s) per room, {}s rounds, at most {} connections",
        config.players, config.round_seconds, config.max_connections
    ));

    let mut tasks = vec![tokio::spawn(accept_loop(
        listener,
        Arc::clone(&state),
        config.max_connections,
        shutdown_rx.clone(),
    ))];
    if let Some(status_listener) = status_listener {
        if let Some(addr) = status_addr {
            log_info(&format!("Status endpoint on http://{addr}/status"));
        }
        tasks.push(tokio::spawn(serve_status(status_listener, Arc::clone(&state), shutdown_rx)));
    }

    Ok(ServerHandle {
        local_addr,
        status_addr,
        state,
        shutdown,
        tasks,
    })
}

async fn accept_loop(
    listener: TcpListener,
    state: Arc<ArenaState>,
    max_connections: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let Some(slot) = state.try_admit(max_connections) else {
                        log_warning(&format!(
                            "Refusing {peer}: already serving {max_connections} connections"
                        ));
                        drop(stream);
                        continue;
                    };
                    if let Err(e) = stream.set_nodelay(true) {
                        log_warning(&format!("Could not disable Nagle for {peer}: {e}"));
                    }
                    let state = Arc::clone(&state);
                    connections.spawn(async move {
                        let _slot = slot;
                        serve_connection(state, stream, Some(peer)).await;
                    });
                }
                Err(e) => {
                    // typically descriptor exhaustion; give it a moment to clear
                    log_error(&format!("Error accepting connection: {e}"));
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        log_error(&format!("Connection worker panicked: {e}"));
                    }
                }
            }
        }
    }

    if !connections.is_empty() {
        log_info(&format!("Closing {} live connection(s)", connections.len()));
    }
    connections.shutdown().await;
    log_info("Arena server shutting down...");
}
