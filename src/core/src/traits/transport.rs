//! Inter-partition transport trait

use crate::error::Result;
use crate::types::PartitionId;

/// Unreliable, unordered, at-most-once delivery of opaque payloads to
/// another partition.
///
/// `send` must not block on the receiver. An `Ok` return only means the
/// payload was handed to the transport; it may still be lost.
pub trait PartitionTransport: Send + Sync {
    /// Send a payload to a partition
    fn send(&self, target: PartitionId, payload: Vec<u8>) -> Result<()>;
}
