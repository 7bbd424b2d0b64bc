//! Distribution lifecycle records

use crate::queue::QueueId;
use keystone_core::{Key, PartitionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle step of a command distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionIntent {
    Started,
    Enqueued,
    Distributing,
    Acknowledge,
    Acknowledged,
    Finished,
}

impl fmt::Display for DistributionIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DistributionIntent::Started => "STARTED",
            DistributionIntent::Enqueued => "ENQUEUED",
            DistributionIntent::Distributing => "DISTRIBUTING",
            DistributionIntent::Acknowledge => "ACKNOWLEDGE",
            DistributionIntent::Acknowledged => "ACKNOWLEDGED",
            DistributionIntent::Finished => "FINISHED",
        })
    }
}

/// One `COMMAND_DISTRIBUTION` record.
///
/// `partition_id` is the target partition for per-target intents and the
/// origin for `Started` and `Finished`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionEvent {
    pub intent: DistributionIntent,
    pub distribution_key: Key,
    pub partition_id: PartitionId,
    pub queue: Option<QueueId>,
    pub timestamp: i64,
}
