//! Identity of one attached operator connection.

use std::fmt;

use uuid::Uuid;

/// Unique, opaque identifier assigned to every accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first UUID group is plenty to tell operators apart in logs.
        let full = self.0.simple().to_string();
        f.write_str(&full[..8])
    }
}
