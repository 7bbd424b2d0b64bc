//! Partition-local identity storage
//!
//! Both stores are owned by a single partition processor and mutated only
//! through event appliers, so they use plain collections. Each keeps a
//! version counter that advances on every mutation.

pub mod membership;
pub mod permissions;

pub use membership::{Group, MappingRule, MembershipIndex, RelationType, Role, Tenant, User};
pub use permissions::{AuthorizationRecord, PermissionStore};
