//! Application layer for icd-console.
//!
//! Turns one line of operator text into a call on a registered
//! [`Scriptable`](icd_core::Scriptable) object:
//!
//! - [`command`]: tokenizer and grammar (`parse_line`).
//! - [`registry`]: name → object table and `dispatch`.

pub mod command;
pub mod registry;
