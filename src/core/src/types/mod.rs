//! Shared types for the Keystone platform

pub mod key;
pub mod partition;

// Re-export commonly used types
pub use key::{decode_partition_id, Key, KeyGenerator, MAX_PARTITION_ID};
pub use partition::{ClusterTopology, PartitionId, DEPLOYMENT_PARTITION, START_PARTITION_ID};
