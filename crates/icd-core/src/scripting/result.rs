//! Outcome of one scriptable command.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a [`CommandResult`].
///
/// Only `Error` means the command did not take effect; the others report
/// success with varying amounts of extra information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandStatus {
    Ok,
    Info,
    Warning,
    Error,
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CommandStatus::Ok => "OK",
            CommandStatus::Info => "INFO",
            CommandStatus::Warning => "WARNING",
            CommandStatus::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Status, human-readable message, and optional return value of a command.
///
/// Built fresh by every `exec` call and rendered to text by the console.
/// Also serializes to JSON for tools that log results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl CommandResult {
    pub fn new(status: CommandStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            value: None,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(CommandStatus::Ok, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(CommandStatus::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(CommandStatus::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(CommandStatus::Error, message)
    }

    /// Attaches a return value.
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == CommandStatus::Error
    }
}

/// Renders as `STATUS: message` followed by ` = value` when a value is set.
impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)?;
        if let Some(value) = &self.value {
            write!(f, " = {value}")?;
        }
        Ok(())
    }
}
