//! Console server lifecycle.
//!
//! ```text
//! Starting ──► Listening ──► Closing ──► Closed
//! ```
//!
//! - `Starting`: the listener is being bound.
//! - `Listening`: connections are accepted and commands broadcast.
//! - `Closing`: no new connections, no new broadcasts; queued work drains.
//! - `Closed`: the queue consumer has exited and every socket is closed.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    Starting = 0,
    Listening = 1,
    Closing = 2,
    Closed = 3,
}

impl ServerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ServerState::Starting,
            1 => ServerState::Listening,
            2 => ServerState::Closing,
            _ => ServerState::Closed,
        }
    }
}

/// Lock-free cell holding the current [`ServerState`], shared between the
/// handle, the accept loop, and the queue consumer.
#[derive(Debug)]
pub struct SharedState(AtomicU8);

impl SharedState {
    pub fn new(state: ServerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> ServerState {
        ServerState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ServerState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves to `Closing` unless already closing or closed.
    ///
    /// Returns `true` for the caller that performed the transition.
    pub fn begin_closing(&self) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current >= ServerState::Closing as u8 {
                return false;
            }
            match self.0.compare_exchange(
                current,
                ServerState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// `true` while new connections and broadcasts are allowed.
    pub fn is_listening(&self) -> bool {
        self.get() == ServerState::Listening
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_atomic() {
        let state = SharedState::new(ServerState::Starting);
        for s in [
            ServerState::Listening,
            ServerState::Closing,
            ServerState::Closed,
            ServerState::Starting,
        ] {
            state.set(s);
            assert_eq!(state.get(), s);
        }
    }

    #[test]
    fn test_begin_closing_only_succeeds_once() {
        let state = SharedState::new(ServerState::Listening);
        assert!(state.begin_closing());
        assert!(!state.begin_closing());
        assert_eq!(state.get(), ServerState::Closing);
        assert!(!state.is_listening());
    }

    #[test]
    fn test_begin_closing_after_closed_is_refused() {
        let state = SharedState::new(ServerState::Closed);
        assert!(!state.begin_closing());
        assert_eq!(state.get(), ServerState::Closed);
    }
}
