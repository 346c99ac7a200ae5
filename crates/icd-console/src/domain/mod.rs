//! Domain layer for icd-console.
//!
//! Pure types with no dependency on sockets or the async runtime:
//!
//! - [`ConsoleConfig`]: runtime settings, built once at startup.
//! - [`ClientId`]: identity of one attached operator.
//! - [`ServerState`]: the server lifecycle state machine.

pub mod client;
pub mod config;
pub mod state;

pub use client::ClientId;
pub use config::ConsoleConfig;
pub use state::ServerState;
