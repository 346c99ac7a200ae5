//! icd-console library crate.
//!
//! A TCP console that lets remote operators type line-based commands against
//! named [`Scriptable`](icd_core::Scriptable) objects running inside this
//! process.  Every result is broadcast to every attached operator.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! operator (telnet / nc)  ── line text over TCP ──┐
//!                                                 ↓
//! [icd-console]
//!   ├── domain/           Pure types: ConsoleConfig, ClientId, ServerState
//!   ├── application/      Command grammar and the object registry
//!   └── infrastructure/
//!         ├── connection/ Per-socket reader + writer tasks
//!         ├── queue/      The single command-queue consumer
//!         ├── server/     Listener, accept loop, lifecycle
//!         └── config_file/ TOML configuration
//! ```
//!
//! # Why a single command queue? (for beginners)
//!
//! Many operators can type at the same time, but the objects they control
//! are not thread-safe and the list of attached clients changes as people
//! come and go.  Instead of sprinkling locks everywhere, every connection
//! pushes *events* into one channel and exactly one task consumes them.
//! Because only that task ever executes commands or touches the client list,
//! no two commands can overlap and a client can never be removed while a
//! broadcast to it is half done.

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: command parsing and dispatch.
pub mod application;

/// Infrastructure layer: sockets, tasks, and configuration files.
pub mod infrastructure;

pub use application::registry::{RegistryError, ScriptRegistry};
pub use domain::config::ConsoleConfig;
pub use domain::state::ServerState;
pub use infrastructure::server::{ConsoleError, ConsoleHandle, ConsoleServer};
