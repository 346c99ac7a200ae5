//! The command queue and its single consumer.
//!
//! Every connection task and the accept loop *produce* [`ConsoleEvent`]s on
//! one bounded `mpsc` channel.  Exactly one [`CommandProcessor`] task
//! consumes them, which gives three guarantees without any locks:
//!
//! - Commands execute one at a time, in arrival order.
//! - Only the consumer touches the live-client list, so a client can never
//!   be added or removed in the middle of a broadcast.
//! - Every client receives every broadcast in the same order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use super::connection::ClientHandle;
use crate::application::registry::ScriptRegistry;
use crate::domain::state::SharedState;
use crate::domain::ClientId;

/// Work item on the command queue.
#[derive(Debug)]
pub enum ConsoleEvent {
    /// A connection was accepted; add it to the live set and greet it.
    ClientAttached(ClientHandle),
    /// One complete line typed by `source`.
    ProcessCommand { source: ClientId, line: String },
    /// The connection has finished its disconnect sequence.
    ClientDetached { client: ClientId },
    /// Stop after draining what is already queued.
    Shutdown,
}

/// What the consumer loop should do after one event.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Owns the registry and the live-client list.
pub(crate) struct CommandProcessor {
    registry: ScriptRegistry,
    clients: Vec<ClientHandle>,
    state: Arc<SharedState>,
    client_count: Arc<AtomicUsize>,
    greeting: String,
    drain_timeout: Duration,
}

impl CommandProcessor {
    pub(crate) fn new(
        registry: ScriptRegistry,
        state: Arc<SharedState>,
        client_count: Arc<AtomicUsize>,
        greeting: String,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            clients: Vec::new(),
            state,
            client_count,
            greeting,
            drain_timeout,
        }
    }

    /// Consumes events until `Shutdown` (or until every producer is gone),
    /// then drains the remaining queue and closes every client.
    pub(crate) async fn run(mut self, mut events: mpsc::Receiver<ConsoleEvent>) {
        while let Some(event) = events.recv().await {
            if self.handle(event) == Flow::Stop {
                break;
            }
        }

        // Refuse further events but finish what was already queued.
        events.close();
        while let Ok(event) = events.try_recv() {
            self.handle(event);
        }

        self.release_clients().await;
        info!("command queue drained");
    }

    fn handle(&mut self, event: ConsoleEvent) -> Flow {
        match event {
            ConsoleEvent::ClientAttached(client) => self.attach(client),
            ConsoleEvent::ProcessCommand { source, line } => self.execute(source, &line),
            ConsoleEvent::ClientDetached { client } => self.detach(client),
            ConsoleEvent::Shutdown => return Flow::Stop,
        }
        Flow::Continue
    }

    fn attach(&mut self, client: ClientHandle) {
        if !self.state.is_listening() {
            debug!(client = %client.id(), "refusing attach while closing");
            client.close();
            return;
        }
        client.send_line(&self.greeting);
        info!(client = %client.id(), "operator {} attached", client.peer());
        self.clients.push(client);
        self.client_count.store(self.clients.len(), Ordering::Release);
    }

    fn execute(&mut self, source: ClientId, line: &str) {
        let started = Instant::now();
        let result = self.registry.dispatch(line);
        debug!(
            client = %source,
            elapsed_us = started.elapsed().as_micros() as u64,
            "{line} -> {result}"
        );

        if !self.state.is_listening() {
            debug!("console closing; result not broadcast");
            return;
        }
        let rendered = result.to_string();
        for client in &self.clients {
            client.send_line(line);
            client.send_line(&rendered);
        }
    }

    fn detach(&mut self, id: ClientId) {
        let before = self.clients.len();
        self.clients.retain(|c| c.id() != id);
        if self.clients.len() == before {
            debug!(client = %id, "detach for unknown client ignored");
            return;
        }
        self.client_count.store(self.clients.len(), Ordering::Release);
        debug!(client = %id, "detached; {} client(s) remain", self.clients.len());
    }

    /// Waits (one shared deadline) for outstanding sends, then closes and
    /// drops every client handle.
    async fn release_clients(&mut self) {
        let deadline = Instant::now() + self.drain_timeout;
        for client in &self.clients {
            let remaining = deadline.saturating_duration_since(Instant::now());
            client.wait_for_sends(remaining).await;
            client.close();
        }
        self.clients.clear();
        self.client_count.store(0, Ordering::Release);
    }
}
