//! The scriptable-object contract shared by every controllable component.
//!
//! # What is a scriptable object? (for beginners)
//!
//! The diagnostic console never knows the concrete type of the things it
//! controls.  It only knows they implement [`Scriptable`]:
//!
//! ```text
//! name()               -> registry key, e.g. "telemetry"
//! get(item)            -> f64 value of a named item
//! set(item, value)     -> assign a named item
//! exec(command, args)  -> CommandResult
//! ```
//!
//! Messages implement it (see `message_script`), so an operator can type
//! `telemetry.flags.armed = 1` or `telemetry serialize` and reach the codec
//! through this trait alone.

mod message_script;
mod result;

pub use result::{CommandResult, CommandStatus};

use thiserror::Error;

use crate::protocol::error::IcdError;

/// Errors returned by [`Scriptable::get`] and [`Scriptable::set`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScriptError {
    /// The object has no item with this name.
    #[error("unknown item '{0}'")]
    UnknownItem(String),

    /// The value cannot be assigned to the item.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The codec rejected the operation.
    #[error(transparent)]
    Icd(#[from] IcdError),
}

/// One raw command parameter.
///
/// Parameters keep the operator's exact text; each command decides how to
/// coerce them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param(String);

impl Param {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The token exactly as typed (quotes already removed).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The token as a number, if it parses as one.
    pub fn as_f64(&self) -> Option<f64> {
        self.0.parse().ok()
    }
}

impl From<&str> for Param {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Interface every object controllable from the console implements.
///
/// `exec` never panics on bad input: unknown commands and bad parameters come
/// back as [`CommandStatus::Error`] results so the console stays alive.
pub trait Scriptable: Send {
    /// Stable name used as the registry key.
    fn name(&self) -> &str;

    /// Reads a named item as a floating value.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::UnknownItem`] for names the object does not have.
    fn get(&self, item: &str) -> Result<f64, ScriptError>;

    /// Assigns a named item.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::UnknownItem`] for unknown names, or another
    /// variant if the value is rejected.
    fn set(&mut self, item: &str, value: f64) -> Result<(), ScriptError>;

    /// Runs a named command.
    fn exec(&mut self, command: &str, params: &[Param]) -> CommandResult;

    /// Names accepted by `get`/`set`, for help output.
    fn items(&self) -> Vec<String> {
        Vec::new()
    }

    /// Names accepted by `exec`, for help output.
    fn commands(&self) -> Vec<&'static str> {
        Vec::new()
    }
}
