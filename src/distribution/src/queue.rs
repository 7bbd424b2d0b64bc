//! Distribution queues
//!
//! Commands sharing a queue apply on every target in the order they were
//! distributed. Commands on different queues, or on no queue, carry no
//! relative ordering.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named FIFO lane
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueId(String);

impl QueueId {
    pub fn new(name: impl Into<String>) -> Self {
        QueueId(name.into())
    }

    /// Queue every identity and authorization command is pinned to
    pub fn identity() -> Self {
        QueueId::new("IDENTITY")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueueId {
    fn from(s: &str) -> Self {
        QueueId(s.to_string())
    }
}
