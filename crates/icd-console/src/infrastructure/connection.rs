//! ClientConnection: one attached operator socket.
//!
//! Each accepted socket is split in two halves that run independently:
//!
//! ```text
//!            ┌──────────── read loop ───────────┐
//! socket ──► │ bytes → LineAccumulator → lines  │ ──► ProcessCommand ──► queue
//!            └──────────────────────────────────┘
//!            ┌──────────── writer task ─────────┐
//! socket ◄── │ outbound FIFO → line + ending    │ ◄── ClientHandle::send_line
//!            └──────────────────────────────────┘
//! ```
//!
//! The queue consumer only ever talks to a connection through its cheap,
//! cloneable [`ClientHandle`].  `send_line` never blocks: the line is
//! queued on the bounded per-client FIFO and counted as *pending* until the
//! writer task has flushed it, so lines reach one client in the order they
//! were sent.  A peer that stops reading fills its FIFO; the next send then
//! closes the connection instead of buffering without limit.  Each socket
//! write is bounded by the drain timeout, so a stalled peer cannot pin the
//! writer task either.
//!
//! # Disconnect sequence
//!
//! 1. The read loop sees EOF, a read error, the shutdown signal, or the
//!    connection being closed from the server side.
//! 2. It waits (bounded) for the pending-send count to reach zero.
//! 3. It marks the connection closed; later sends are ignored.
//! 4. It enqueues `ClientDetached` so the consumer drops the handle.
//! 5. It gives the writer task one more drain timeout, then aborts it.  Both
//!    socket halves are gone by the time `run` returns.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use super::queue::ConsoleEvent;
use crate::domain::{ClientId, ConsoleConfig};

/// Terminator appended to every outbound line.
pub const LINE_ENDING: &str = if cfg!(windows) { "\r\n" } else { "\n" };

/// How often a disconnecting client re-checks its pending-send count.
pub const SEND_POLL_INTERVAL: Duration = Duration::from_millis(20);

const READ_CHUNK: usize = 1024;

// ── Shared send state ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SendState {
    closed: AtomicBool,
    pending: AtomicUsize,
    /// Wakes the read loop when the server side closes the connection.
    closed_signal: Notify,
}

impl SendState {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.closed_signal.notify_one();
    }

    fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn finish_one(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// Polls until no sends are outstanding or `limit` elapses.
    async fn wait_idle(&self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        loop {
            if self.pending() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(SEND_POLL_INTERVAL).await;
        }
    }
}

// ── ClientHandle ──────────────────────────────────────────────────────────────

/// The consumer-side view of one connection.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    peer: SocketAddr,
    outbound: mpsc::Sender<String>,
    state: Arc<SendState>,
}

impl ClientHandle {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// Lines queued but not yet written to the socket.
    pub fn pending_sends(&self) -> usize {
        self.state.pending()
    }

    /// Queues one line for this client.
    ///
    /// Returns `false` (and sends nothing) once the connection is closed.
    /// A full outbound FIFO closes the connection.
    pub fn send_line(&self, line: &str) -> bool {
        if self.state.is_closed() {
            return false;
        }
        self.state.pending.fetch_add(1, Ordering::AcqRel);
        match self.outbound.try_send(line.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.state.finish_one();
                warn!(
                    client = %self.id,
                    "operator {} is not reading; {} line(s) queued, disconnecting",
                    self.peer,
                    self.state.pending()
                );
                self.state.close();
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.state.finish_one();
                false
            }
        }
    }

    /// Waits up to `limit` for every queued line to be written.
    pub async fn wait_for_sends(&self, limit: Duration) -> bool {
        self.state.wait_idle(limit).await
    }

    /// Marks the connection closed; queued lines are discarded unwritten.
    pub fn close(&self) {
        self.state.close();
    }
}

// ── Line accumulation ─────────────────────────────────────────────────────────

/// Splits a byte stream into trimmed, non-empty text lines.
///
/// Accepts `\n` and `\r\n` terminators.  At most one partial line is held;
/// if it grows past `max_len` bytes it is discarded together with the rest
/// of that line.
#[derive(Debug)]
pub struct LineAccumulator {
    buf: Vec<u8>,
    max_len: usize,
    discarding: bool,
}

impl LineAccumulator {
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_len,
            discarding: false,
        }
    }

    /// Bytes of the current partial line.
    pub fn partial_len(&self) -> usize {
        self.buf.len()
    }

    /// Feeds `data` and returns every line it completed.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in data {
            if byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                let text = String::from_utf8_lossy(&self.buf).trim().to_string();
                self.buf.clear();
                if !text.is_empty() {
                    lines.push(text);
                }
            } else if !self.discarding {
                if self.buf.len() >= self.max_len {
                    warn!(
                        "discarding input line longer than {} bytes",
                        self.max_len
                    );
                    self.buf.clear();
                    self.discarding = true;
                } else {
                    self.buf.push(byte);
                }
            }
        }
        lines
    }
}

// ── Read loop ─────────────────────────────────────────────────────────────────

/// Why a read loop stopped.
#[derive(Debug)]
pub enum ReadOutcome {
    /// The peer closed its side.
    Eof,
    /// The socket reported an error.
    Failed(io::Error),
    /// The command queue no longer accepts events.
    QueueClosed,
    /// The server is closing.
    Shutdown,
    /// The connection was closed from the server side.
    Closed,
}

/// Reads `reader` until EOF, queueing one `ProcessCommand` per complete line.
pub async fn read_lines<R>(
    mut reader: R,
    client: ClientId,
    events: &mpsc::Sender<ConsoleEvent>,
    max_line_len: usize,
) -> ReadOutcome
where
    R: AsyncRead + Unpin,
{
    let mut lines = LineAccumulator::new(max_line_len);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => {
                if lines.partial_len() > 0 {
                    debug!(%client, "dropping unterminated trailing input");
                }
                return ReadOutcome::Eof;
            }
            Ok(n) => n,
            Err(e) => return ReadOutcome::Failed(e),
        };

        for line in lines.push(&chunk[..n]) {
            debug!(%client, "received: {line}");
            let event = ConsoleEvent::ProcessCommand {
                source: client,
                line,
            };
            if events.send(event).await.is_err() {
                return ReadOutcome::QueueClosed;
            }
        }
    }
}

/// Resolves once `shutdown` holds `true` or its sender is gone.
pub(crate) async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender means nobody can ever stop us explicitly; treat it as stop.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

// ── Writer task ───────────────────────────────────────────────────────────────

/// Drains `outbound` onto `writer`.  Once the connection is closed, lines
/// are still taken off the FIFO (keeping the pending count honest) but no
/// longer written.
async fn write_lines<W>(
    mut writer: W,
    mut outbound: mpsc::Receiver<String>,
    state: Arc<SendState>,
    client: ClientId,
    write_timeout: Duration,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = outbound.recv().await {
        if !state.is_closed() {
            let mut bytes = line.into_bytes();
            bytes.extend_from_slice(LINE_ENDING.as_bytes());
            match timeout(write_timeout, writer.write_all(&bytes)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(%client, "write failed, closing: {e}");
                    state.close();
                }
                Err(_) => {
                    warn!(%client, "write stalled for {write_timeout:?}, closing");
                    state.close();
                }
            }
        }
        state.finish_one();
    }
    let _ = timeout(write_timeout, writer.shutdown()).await;
}

/// Owns the writer task; dropping it aborts the task so the write half of
/// the socket never outlives its connection.
#[derive(Debug)]
struct WriterTask(JoinHandle<()>);

impl WriterTask {
    /// Waits up to `limit` for the task to finish on its own, then aborts it.
    /// Returns `true` if it finished without being aborted.
    async fn finish_within(mut self, limit: Duration) -> bool {
        if timeout(limit, &mut self.0).await.is_ok() {
            return true;
        }
        self.0.abort();
        let _ = (&mut self.0).await;
        false
    }
}

impl Drop for WriterTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

// ── ClientConnection ──────────────────────────────────────────────────────────

/// The reader side of one connection, run as its own task by the server.
pub struct ClientConnection<R> {
    id: ClientId,
    peer: SocketAddr,
    reader: R,
    state: Arc<SendState>,
    writer: WriterTask,
    max_line_len: usize,
    drain_timeout: Duration,
}

impl ClientConnection<OwnedReadHalf> {
    /// Wraps a freshly accepted TCP stream and starts its writer task.
    pub fn accept(
        stream: TcpStream,
        peer: SocketAddr,
        config: &ConsoleConfig,
    ) -> (ClientHandle, Self) {
        let (reader, writer) = stream.into_split();
        Self::from_split(reader, writer, peer, config)
    }
}

impl<R> ClientConnection<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Builds a connection from any reader/writer pair and starts the writer
    /// task on the current runtime.
    pub fn from_split<W>(
        reader: R,
        writer: W,
        peer: SocketAddr,
        config: &ConsoleConfig,
    ) -> (ClientHandle, Self)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let id = ClientId::new();
        let state = Arc::new(SendState::default());
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));

        let writer = WriterTask(tokio::spawn(write_lines(
            writer,
            outbound_rx,
            Arc::clone(&state),
            id,
            config.send_drain_timeout,
        )));

        let handle = ClientHandle {
            id,
            peer,
            outbound: outbound_tx,
            state: Arc::clone(&state),
        };
        let connection = Self {
            id,
            peer,
            reader,
            state,
            writer,
            max_line_len: config.max_line_len,
            drain_timeout: config.send_drain_timeout,
        };
        (handle, connection)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Reads commands until the peer leaves or the server closes, then runs
    /// the disconnect sequence.
    pub async fn run(self, events: mpsc::Sender<ConsoleEvent>, mut shutdown: watch::Receiver<bool>) {
        let Self {
            id,
            peer,
            reader,
            state,
            writer,
            max_line_len,
            drain_timeout,
        } = self;

        let outcome = tokio::select! {
            outcome = read_lines(reader, id, &events, max_line_len) => outcome,
            () = shutdown_signalled(&mut shutdown) => ReadOutcome::Shutdown,
            () = state.closed_signal.notified() => ReadOutcome::Closed,
        };
        match &outcome {
            ReadOutcome::Eof => info!(client = %id, "operator {peer} disconnected"),
            ReadOutcome::Failed(e) => warn!(client = %id, "read error from {peer}: {e}"),
            ReadOutcome::QueueClosed => debug!(client = %id, "command queue closed"),
            ReadOutcome::Shutdown => debug!(client = %id, "console closing"),
            ReadOutcome::Closed => info!(client = %id, "dropping operator {peer}"),
        }

        if !state.wait_idle(drain_timeout).await {
            warn!(
                client = %id,
                "{} line(s) still unsent after {:?}; closing anyway",
                state.pending(),
                drain_timeout
            );
        }
        state.close();

        if events
            .send(ConsoleEvent::ClientDetached { client: id })
            .await
            .is_err()
        {
            debug!(client = %id, "queue closed before detach");
        }

        // The writer exits once the consumer has dropped its handle.
        if !writer.finish_within(drain_timeout).await {
            warn!(client = %id, "writer task aborted after {drain_timeout:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddr};
    use tokio::io::{AsyncBufReadExt, BufReader};

    fn peer() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 40000))
    }

    // ── LineAccumulator ───────────────────────────────────────────────────────

    #[test]
    fn test_accumulator_splits_lf_and_crlf() {
        let mut acc = LineAccumulator::new(64);

        let lines = acc.push(b"one\r\ntwo\nthree");

        assert_eq!(lines, vec!["one", "two"]);
        assert_eq!(acc.partial_len(), 5);
        assert_eq!(acc.push(b"\r\n"), vec!["three"]);
    }

    #[test]
    fn test_accumulator_skips_blank_lines_and_trims() {
        let mut acc = LineAccumulator::new(64);

        let lines = acc.push(b"\n   \r\n  help  \n\n");

        assert_eq!(lines, vec!["help"]);
    }

    #[test]
    fn test_accumulator_drops_overlong_line_only() {
        let mut acc = LineAccumulator::new(4);

        let first = acc.push(b"abcdefgh");
        let second = acc.push(b"ij\nok\n");

        assert!(first.is_empty());
        assert_eq!(second, vec!["ok"]);
        assert_eq!(acc.partial_len(), 0);
    }

    #[test]
    fn test_accumulator_line_at_exact_limit_is_kept() {
        let mut acc = LineAccumulator::new(4);
        assert_eq!(acc.push(b"abcd\n"), vec!["abcd"]);
    }

    // ── read_lines ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_read_lines_queues_each_complete_line() {
        // Arrange: data arrives split across reads, one blank line in between.
        let reader = tokio_test::io::Builder::new()
            .read(b"telemetry ser")
            .read(b"ialize\r\n\r\ncommand")
            .read(b".gain = 2\n")
            .build();
        let (tx, mut rx) = mpsc::channel(8);
        let client = ClientId::new();

        // Act
        let outcome = read_lines(reader, client, &tx, 128).await;

        // Assert
        assert!(matches!(outcome, ReadOutcome::Eof));
        let mut lines = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                ConsoleEvent::ProcessCommand { source, line } => {
                    assert_eq!(source, client);
                    lines.push(line);
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(lines, vec!["telemetry serialize", "command.gain = 2"]);
    }

    #[tokio::test]
    async fn test_read_lines_reports_socket_error() {
        let reader = tokio_test::io::Builder::new()
            .read(b"help\n")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let (tx, mut rx) = mpsc::channel(8);

        let outcome = read_lines(reader, ClientId::new(), &tx, 128).await;

        assert!(matches!(outcome, ReadOutcome::Failed(ref e) if e.kind() == io::ErrorKind::ConnectionReset));
        assert!(matches!(rx.try_recv(), Ok(ConsoleEvent::ProcessCommand { .. })));
    }

    #[tokio::test]
    async fn test_read_lines_stops_when_queue_closed() {
        let reader = tokio_test::io::Builder::new().read(b"help\n").build();
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        let outcome = read_lines(reader, ClientId::new(), &tx, 128).await;

        assert!(matches!(outcome, ReadOutcome::QueueClosed));
    }

    // ── Writer / handle ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_send_line_writes_in_order_with_line_ending() {
        // Arrange
        let (server_side, client_side) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(server_side);
        let (handle, _connection) =
            ClientConnection::from_split(reader, writer, peer(), &ConsoleConfig::default());

        // Act
        assert!(handle.send_line("first"));
        assert!(handle.send_line("second"));

        // Assert
        assert!(handle.wait_for_sends(Duration::from_secs(1)).await);
        let mut lines = BufReader::new(client_side).lines();
        assert_eq!(lines.next_line().await.ok().flatten().as_deref(), Some("first"));
        assert_eq!(lines.next_line().await.ok().flatten().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_closed_handle_refuses_sends() {
        let (server_side, _client_side) = tokio::io::duplex(64);
        let (reader, writer) = tokio::io::split(server_side);
        let (handle, _connection) =
            ClientConnection::from_split(reader, writer, peer(), &ConsoleConfig::default());

        handle.close();

        assert!(handle.is_closed());
        assert!(!handle.send_line("ignored"));
        assert_eq!(handle.pending_sends(), 0);
    }

    #[tokio::test]
    async fn test_writer_writes_with_line_ending() {
        let expected = format!("hello{LINE_ENDING}");
        let writer = tokio_test::io::Builder::new()
            .write(expected.as_bytes())
            .build();
        let (tx, rx) = mpsc::channel(4);
        let state = Arc::new(SendState::default());

        state.pending.fetch_add(1, Ordering::AcqRel);
        tx.try_send("hello".to_string()).expect("writer alive");
        drop(tx);
        write_lines(writer, rx, Arc::clone(&state), ClientId::new(), Duration::from_secs(1)).await;

        assert_eq!(state.pending(), 0);
        assert!(!state.is_closed());
    }

    #[tokio::test]
    async fn test_full_outbound_queue_closes_client() {
        // Arrange: the writer task has not been polled yet, so nothing drains.
        let (server_side, _client_side) = tokio::io::duplex(64);
        let (reader, writer) = tokio::io::split(server_side);
        let config = ConsoleConfig {
            outbound_capacity: 4,
            send_drain_timeout: Duration::from_millis(100),
            ..ConsoleConfig::default()
        };
        let (handle, connection) = ClientConnection::from_split(reader, writer, peer(), &config);
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        // Act
        let accepted = (0..4).all(|i| handle.send_line(&format!("line {i}")));
        let overflow = handle.send_line("one too many");

        // Assert: the client is closed and its read loop detaches on its own.
        assert!(accepted);
        assert!(!overflow);
        assert!(handle.is_closed());
        assert_eq!(handle.pending_sends(), 4);

        let task = tokio::spawn(connection.run(events_tx, shutdown_rx));
        let event = timeout(Duration::from_secs(2), events_rx.recv()).await;
        assert!(matches!(event, Ok(Some(ConsoleEvent::ClientDetached { .. }))));
        drop(handle);
        assert!(timeout(Duration::from_secs(2), task).await.is_ok());
    }

    #[tokio::test]
    async fn test_stalled_peer_socket_closed_after_drain() {
        // Arrange: the peer never reads, so the small pipe fills and the
        // writer task blocks mid-write.
        let (server_side, mut client_side) = tokio::io::duplex(64);
        let (reader, writer) = tokio::io::split(server_side);
        let config = ConsoleConfig {
            send_drain_timeout: Duration::from_millis(100),
            ..ConsoleConfig::default()
        };
        let (handle, connection) = ClientConnection::from_split(reader, writer, peer(), &config);
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let line = "x".repeat(32);
        for _ in 0..200 {
            assert!(handle.send_line(&line));
        }

        // Act
        let task = tokio::spawn(connection.run(events_tx, shutdown_rx));
        shutdown_tx.send_replace(true);
        let event = timeout(Duration::from_secs(2), events_rx.recv()).await;
        drop(handle);
        let finished = timeout(Duration::from_secs(2), task).await;

        // Assert: run returned and the server's end of the pipe is gone.
        assert!(matches!(event, Ok(Some(ConsoleEvent::ClientDetached { .. }))));
        assert!(matches!(finished, Ok(Ok(()))));
        let write = client_side.write_all(b"x").await;
        assert!(matches!(write, Err(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[tokio::test]
    async fn test_dropping_connection_aborts_writer() {
        let (server_side, mut client_side) = tokio::io::duplex(64);
        let (reader, writer) = tokio::io::split(server_side);
        let (handle, connection) =
            ClientConnection::from_split(reader, writer, peer(), &ConsoleConfig::default());

        drop(connection);
        let released = timeout(Duration::from_secs(1), async {
            while client_side.write_all(b"x").await.is_ok() {
                tokio::task::yield_now().await;
            }
        })
        .await;

        // The handle still exists, yet both halves of the pipe are released.
        assert!(released.is_ok());
        assert!(!handle.is_closed());
    }

    // ── Disconnect sequence ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_run_detaches_after_peer_eof() {
        // Arrange
        let (server_side, client_side) = tokio::io::duplex(256);
        let (reader, writer) = tokio::io::split(server_side);
        let config = ConsoleConfig {
            send_drain_timeout: Duration::from_millis(200),
            ..ConsoleConfig::default()
        };
        let (handle, connection) = ClientConnection::from_split(reader, writer, peer(), &config);
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let id = connection.id();

        // Act: peer hangs up, the consumer side drops its handle on detach.
        drop(client_side);
        let task = tokio::spawn(connection.run(events_tx, shutdown_rx));
        let event = events_rx.recv().await;
        drop(handle);

        // Assert
        assert!(matches!(event, Some(ConsoleEvent::ClientDetached { client }) if client == id));
        assert!(task.await.is_ok());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let (server_side, _client_side) = tokio::io::duplex(256);
        let (reader, writer) = tokio::io::split(server_side);
        let config = ConsoleConfig {
            send_drain_timeout: Duration::from_millis(100),
            ..ConsoleConfig::default()
        };
        let (handle, connection) = ClientConnection::from_split(reader, writer, peer(), &config);
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(connection.run(events_tx, shutdown_rx));
        shutdown_tx.send_replace(true);

        assert!(matches!(
            events_rx.recv().await,
            Some(ConsoleEvent::ClientDetached { .. })
        ));
        assert!(handle.is_closed());
        drop(handle);
        assert!(task.await.is_ok());
    }
}
