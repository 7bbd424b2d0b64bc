//! # Keystone Command Distribution
//!
//! Reliable, ordered broadcast of applied commands from an origin partition
//! to every other partition, with exactly-once effect on each target.
//!
//! ## Protocol
//!
//! 1. **Distribute**: the origin records a STARTED distribution and appends
//!    one ENQUEUED entry per target to the command's queue
//! 2. **Send**: the head of each `(queue, target)` lane is sent (DISTRIBUTING)
//! 3. **Acknowledge**: the target applies the command once and replies;
//!    the origin marks the target ACKNOWLEDGED and sends the next lane entry
//! 4. **Finish**: once every target acknowledged, the distribution is
//!    FINISHED and retired
//!
//! The transport may lose messages. The [`RedistributionScheduler`] resends
//! unacknowledged lane heads with a doubling back-off, so retries never
//! reorder a queue.

pub mod config;
pub mod distributor;
pub mod error;
pub mod message;
pub mod metrics;
pub mod queue;
pub mod record;
pub mod scheduler;
pub mod state;

pub use config::RedistributionConfig;
pub use distributor::{CommandDistributor, IncomingCommand};
pub use error::{DistributionError, Result};
pub use message::DistributionMessage;
pub use metrics::DistributionMetrics;
pub use queue::QueueId;
pub use record::{DistributionEvent, DistributionIntent};
pub use scheduler::RedistributionScheduler;
pub use state::{DistributionState, DistributionStats, PendingDistribution, TargetProgress, TargetState};
