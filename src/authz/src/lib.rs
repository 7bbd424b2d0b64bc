//! # Keystone Authorization
//!
//! Permission storage, membership indices and the authorization resolver
//! consulted by every command processor.
//!
//! ## Model
//!
//! - **Owners** (users, clients, roles, groups, mapping rules) hold
//!   [`AuthorizationRecord`]s: a set of [`PermissionType`]s on one scope of a
//!   [`ResourceType`].
//! - The [`MembershipIndex`] relates users, clients and mapping rules to
//!   groups, roles and tenants.
//! - The [`AuthorizationResolver`] walks those relations to decide whether a
//!   [`Principal`] may perform an operation.
//!
//! # Example
//!
//! ```rust
//! use keystone_authz::{
//!     AuthorizationRequest, AuthorizationResolver, IdentityState, Owner,
//!     PermissionType, Principal, ResourceType, SecurityConfig,
//! };
//!
//! let mut state = IdentityState::new();
//! state.permissions.add_permission(
//!     &Owner::user("foo"),
//!     ResourceType::Deployment,
//!     PermissionType::Create,
//!     "*",
//!     1,
//! );
//!
//! let resolver = AuthorizationResolver::new(SecurityConfig::enabled());
//! let principal = Principal::user("foo");
//! let request = AuthorizationRequest::new(&principal, ResourceType::Deployment, PermissionType::Create)
//!     .with_resource_id("process");
//!
//! assert!(resolver.is_authorized(&state, &request).is_ok());
//! ```

pub mod claims;
pub mod config;
pub mod error;
pub mod principal;
pub mod resolver;
pub mod scope;
pub mod state;
pub mod store;
pub mod types;

pub use config::{AuthorizationsConfig, CacheConfig, MultiTenancyConfig, SecurityConfig};
pub use error::{AuthzError, Rejection, RejectionType, Result};
pub use principal::Principal;
pub use resolver::{
    AuthorizationRequest, AuthorizationResolver, AuthorizationResult, AuthorizedTenants,
    CacheStats,
};
pub use scope::{AuthorizationScope, ResourceMatcher, WILDCARD};
pub use state::{IdentitySnapshot, IdentityState};
pub use store::{
    AuthorizationRecord, Group, MappingRule, MembershipIndex, PermissionStore, RelationType,
    Role, Tenant, User,
};
pub use types::{format_set, Owner, OwnerType, PermissionType, ResourceType};
