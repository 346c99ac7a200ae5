//! Infrastructure layer for icd-console.
//!
//! - [`connection`]: per-socket reader loop and writer task.
//! - [`queue`]: the command-queue events and their single consumer.
//! - [`server`]: listener, accept loop, and the [`ConsoleHandle`](server::ConsoleHandle).
//! - [`config_file`]: TOML configuration loading.

pub mod config_file;
pub mod connection;
pub mod queue;
pub mod server;
