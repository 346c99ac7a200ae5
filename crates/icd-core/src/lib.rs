//! # icd-core
//!
//! Shared library for the ICD diagnostic console containing the binary
//! message codec and the scriptable-object contract the console dispatches
//! against.
//!
//! It has zero dependencies on network sockets or async runtimes, so every
//! piece can be exercised with plain unit tests.
//!
//! # Architecture overview (for beginners)
//!
//! An *ICD* (Interface Control Document) describes a binary protocol: which
//! message ids exist, which fields each message carries, and how each field
//! is packed into bytes.  This crate turns such a description into Rust
//! values that can be encoded, decoded, and poked at from a text console.
//!
//! - **`protocol`** – How bytes travel over the wire.  Fields (plain floats,
//!   scaled 16-bit integers, bit-packed words) are grouped into a
//!   [`Message`] which serializes itself behind a 4-byte header.
//!
//! - **`scripting`** – The [`Scriptable`] trait every controllable object
//!   implements (`name`, `get`, `set`, `exec`) and the [`CommandResult`]
//!   returned by every command.  Messages implement it, which is how the
//!   console reaches their fields without knowing field internals.
//!
//! - **`catalog`** – A couple of concrete message definitions used by the
//!   console binary, the tests, and the benchmarks.

pub mod catalog;
pub mod protocol;
pub mod scripting;

// Re-export the most-used types at the crate root so callers can write
// `icd_core::Message` instead of `icd_core::protocol::message::Message`.
pub use protocol::bit_field::{BitField, Subfield};
pub use protocol::error::IcdError;
pub use protocol::field::Field;
pub use protocol::message::{FrameHeader, Message, FRAME_HEADER_SIZE, SYNC_BYTE};
pub use protocol::sequence::SequenceCounter;
pub use scripting::{CommandResult, CommandStatus, Param, ScriptError, Scriptable};
