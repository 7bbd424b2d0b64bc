//! # Keystone Core
//!
//! Shared types, traits, and error handling for the Keystone partitioned
//! engine. Every other crate depends on this one for partition and key
//! identifiers, the inter-partition transport seam, and the logical clock.

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use traits::{Clock, ControlledClock, PartitionTransport, SystemClock};
pub use types::{
    decode_partition_id, ClusterTopology, Key, KeyGenerator, PartitionId,
    DEPLOYMENT_PARTITION, MAX_PARTITION_ID, START_PARTITION_ID,
};

/// Tenant used for every record when multi-tenancy is disabled
pub const DEFAULT_TENANT_IDENTIFIER: &str = "<default>";

/// Tenant identifier
pub type TenantId = String;
