//! # Keystone Engine
//!
//! Partition-level processing of identity and access-control commands.
//!
//! A [`Partition`] validates each command with its processor, applies it
//! to the partition's identity state and writes the outcome to its
//! [`RecordLog`]. Identity commands are accepted only by the coordinator
//! partition and then distributed on the identity queue, so every partition converges on the same users, roles,
//! groups, tenants, mapping rules and authorizations.
//!
//! ```text
//! submit ──► processor ──► applier ──► event ──► CommandDistributor
//!              │                                   │
//!              └──► rejection                      └──► other partitions
//!                                                       (applier, ACK)
//! ```
//!
//! The [`Cluster`] runs several partitions in memory over a loopback
//! network with a controlled clock.

pub mod appliers;
pub mod cluster;
pub mod command;
pub mod config;
pub mod error;
pub mod partition;
pub mod processors;
pub mod record;

pub use cluster::{Cluster, Envelope};
pub use command::{
    AuthorizationValue, Command, DeploymentValue, EntityValue, GroupValue, IdentitySetupValue,
    MappingRuleValue, PermissionsValue, ProcessInstanceValue, RoleValue, TenantValue, UserValue,
    UNASSIGNED_KEY,
};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use partition::{CommandOutcome, DistributedCommand, Partition};
pub use processors::{Processed, ProcessingContext, ProcessingResult};
pub use record::{Intent, Record, RecordLog, RecordType, RecordValue, ValueType};
