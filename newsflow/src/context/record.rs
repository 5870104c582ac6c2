//! Audit trail entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One agent's completion on a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    /// Agent name.
    pub agent: String,
    /// When the agent completed.
    pub timestamp: DateTime<Utc>,
    /// Milliseconds since the context was created, at completion.
    pub elapsed_ms: u64,
}

impl ProcessingRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(agent: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            agent: agent.into(),
            timestamp: Utc::now(),
            elapsed_ms,
        }
    }
}
