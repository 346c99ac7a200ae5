//! Console server: listener, accept loop, and lifecycle.
//!
//! [`ConsoleServer::start`] binds the listener and spawns two long-lived
//! tasks:
//!
//! 1. The **accept loop**, which wraps each new socket in a
//!    [`ClientConnection`], enqueues `ClientAttached`, and spawns the
//!    connection's read loop into a `JoinSet`.
//! 2. The **queue consumer** ([`CommandProcessor`]), which owns the
//!    registry and the live-client list.
//!
//! # Shutdown (for beginners)
//!
//! [`ConsoleHandle::close`] flips the state to `Closing` and raises a
//! `watch` flag that every task listens to.  From then on the accept loop
//! refuses new sockets and results are no longer broadcast.  The consumer
//! finishes the events already queued, waits (bounded) for each client's
//! outstanding writes, and drops every handle.  `close` returns only after
//! the consumer, the accept loop, and every connection task have finished.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::connection::{shutdown_signalled, ClientConnection};
use super::queue::{CommandProcessor, ConsoleEvent};
use crate::application::registry::ScriptRegistry;
use crate::domain::state::SharedState;
use crate::domain::{ConsoleConfig, ServerState};

/// Error type for starting the console server.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("bind failed on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read listener address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Entry point for starting a console.
pub struct ConsoleServer;

impl ConsoleServer {
    /// Binds `config.bind_addr` and starts serving `registry`.
    ///
    /// # Errors
    ///
    /// [`ConsoleError::Bind`] if the address is in use or not permitted.
    pub async fn start(
        config: ConsoleConfig,
        registry: ScriptRegistry,
    ) -> Result<ConsoleHandle, ConsoleError> {
        let state = Arc::new(SharedState::new(ServerState::Starting));

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ConsoleError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(ConsoleError::LocalAddr)?;

        let (events_tx, events_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let client_count = Arc::new(AtomicUsize::new(0));

        let processor = CommandProcessor::new(
            registry,
            Arc::clone(&state),
            Arc::clone(&client_count),
            config.greeting.clone(),
            config.send_drain_timeout,
        );
        let consumer = tokio::spawn(processor.run(events_rx));

        state.set(ServerState::Listening);
        let acceptor = tokio::spawn(accept_loop(
            listener,
            Arc::new(config),
            Arc::clone(&state),
            events_tx.clone(),
            shutdown_rx,
        ));

        info!("ICD console listening on {local_addr}");

        Ok(ConsoleHandle {
            local_addr,
            state,
            client_count,
            events: events_tx,
            shutdown: shutdown_tx,
            consumer: Some(consumer),
            acceptor: Some(acceptor),
        })
    }
}

/// Control surface of a running console.
///
/// Dropping the handle without calling [`close`](Self::close) still stops
/// the server, but without waiting for it.
pub struct ConsoleHandle {
    local_addr: SocketAddr,
    state: Arc<SharedState>,
    client_count: Arc<AtomicUsize>,
    events: mpsc::Sender<ConsoleEvent>,
    shutdown: watch::Sender<bool>,
    consumer: Option<JoinHandle<()>>,
    acceptor: Option<JoinHandle<()>>,
}

impl ConsoleHandle {
    /// The address actually bound (useful with port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ServerState {
        self.state.get()
    }

    /// Number of clients currently in the live set.
    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::Acquire)
    }

    /// Stops the console and waits for every task to finish.
    ///
    /// Safe to call more than once; later calls return immediately.
    pub async fn close(&mut self) {
        if self.state.begin_closing() {
            info!("ICD console closing");
        }
        self.shutdown.send_replace(true);

        if let Some(consumer) = self.consumer.take() {
            if self.events.send(ConsoleEvent::Shutdown).await.is_err() {
                debug!("command queue already closed");
            }
            if let Err(e) = consumer.await {
                error!("command queue consumer failed: {e}");
            }
        }
        if let Some(acceptor) = self.acceptor.take() {
            if let Err(e) = acceptor.await {
                error!("accept loop failed: {e}");
            }
        }

        if self.state.get() != ServerState::Closed {
            self.state.set(ServerState::Closed);
            info!("ICD console closed");
        }
    }
}

impl Drop for ConsoleHandle {
    fn drop(&mut self) {
        if self.state.begin_closing() {
            debug!("console handle dropped without close()");
        }
        self.shutdown.send_replace(true);
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

async fn accept_loop(
    listener: TcpListener,
    config: Arc<ConsoleConfig>,
    state: Arc<SharedState>,
    events: mpsc::Sender<ConsoleEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let connection_shutdown = shutdown.clone();
    let mut connections = JoinSet::new();

    loop {
        let (stream, peer) = tokio::select! {
            () = shutdown_signalled(&mut shutdown) => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    // Transient (e.g. too many open files); keep serving.
                    error!("accept error: {e}");
                    continue;
                }
            },
        };

        // Reap connection tasks that already finished.
        while connections.try_join_next().is_some() {}

        if !state.is_listening() {
            info!("refusing connection from {peer}: console is closing");
            continue;
        }

        let (handle, connection) = ClientConnection::accept(stream, peer, &config);
        info!(client = %handle.id(), "new operator connection from {peer}");
        if events
            .send(ConsoleEvent::ClientAttached(handle))
            .await
            .is_err()
        {
            warn!("command queue closed; stopping accept loop");
            break;
        }
        connections.spawn(connection.run(events.clone(), connection_shutdown.clone()));
    }

    // Stop accepting before waiting on the open connections.
    drop(listener);
    drop(events);

    // Each connection may spend one drain timeout on pending sends and one
    // on its writer task.
    let limit = config.send_drain_timeout * 3;
    let drained = timeout(limit, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            "{} connection task(s) still running after {limit:?}; aborting",
            connections.len()
        );
        connections.shutdown().await;
    }
    debug!("accept loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    fn config() -> ConsoleConfig {
        ConsoleConfig {
            greeting: "ready".to_string(),
            send_drain_timeout: Duration::from_millis(200),
            ..ConsoleConfig::ephemeral()
        }
    }

    #[tokio::test]
    async fn test_start_reports_listening_and_bound_port() {
        let mut handle = ConsoleServer::start(config(), ScriptRegistry::new())
            .await
            .expect("start");

        assert_eq!(handle.state(), ServerState::Listening);
        assert_ne!(handle.local_addr().port(), 0);
        assert_eq!(handle.client_count(), 0);

        handle.close().await;
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let mut first = ConsoleServer::start(config(), ScriptRegistry::new())
            .await
            .expect("start");
        let taken = ConsoleConfig {
            bind_addr: first.local_addr(),
            ..config()
        };

        let second = ConsoleServer::start(taken, ScriptRegistry::new()).await;

        assert!(matches!(second, Err(ConsoleError::Bind { .. })));
        first.close().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_ends_closed() {
        let mut handle = ConsoleServer::start(config(), ScriptRegistry::new())
            .await
            .expect("start");

        handle.close().await;
        handle.close().await;

        assert_eq!(handle.state(), ServerState::Closed);
    }

    #[tokio::test]
    async fn test_greeting_then_help_round_trip() {
        // Arrange
        let mut handle = ConsoleServer::start(config(), ScriptRegistry::new())
            .await
            .expect("start");
        let stream = TcpStream::connect(handle.local_addr())
            .await
            .expect("connect");
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        // Act
        let greeting = lines.next_line().await.expect("read");
        writer.write_all(b"help\r\n").await.expect("write");
        let echo = lines.next_line().await.expect("read");
        let result = lines.next_line().await.expect("read");

        // Assert
        assert_eq!(greeting.as_deref(), Some("ready"));
        assert_eq!(echo.as_deref(), Some("help"));
        assert_eq!(result.as_deref(), Some("INFO: no objects registered"));

        handle.close().await;
        assert_eq!(lines.next_line().await.ok().flatten(), None);
    }
}
