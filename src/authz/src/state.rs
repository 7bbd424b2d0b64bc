//! Identity state of one partition

use crate::store::{
    AuthorizationRecord, Group, MappingRule, MembershipIndex, PermissionStore, RelationType,
    Role, Tenant, User,
};
use crate::types::Owner;
use serde::Serialize;

/// Permission store and membership index owned by one partition
#[derive(Debug, Default)]
pub struct IdentityState {
    pub permissions: PermissionStore,
    pub membership: MembershipIndex,
}

impl IdentityState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances whenever either store changes
    pub fn version(&self) -> u64 {
        self.permissions.version() + self.membership.version()
    }

    /// Ordered copy of all identity data, for comparing partitions
    pub fn snapshot(&self) -> IdentitySnapshot {
        IdentitySnapshot {
            authorizations: self.permissions.iter().cloned().collect(),
            users: self.membership.users().cloned().collect(),
            roles: self.membership.roles().cloned().collect(),
            groups: self.membership.groups().cloned().collect(),
            mapping_rules: self.membership.mapping_rules().cloned().collect(),
            tenants: self.membership.tenants().cloned().collect(),
            relations: self.membership.relations(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentitySnapshot {
    pub authorizations: Vec<AuthorizationRecord>,
    pub users: Vec<User>,
    pub roles: Vec<Role>,
    pub groups: Vec<Group>,
    pub mapping_rules: Vec<MappingRule>,
    pub tenants: Vec<Tenant>,
    pub relations: Vec<(Owner, RelationType, String)>,
}

impl IdentitySnapshot {
    pub fn is_empty(&self) -> bool {
        self.authorizations.is_empty()
            && self.users.is_empty()
            && self.roles.is_empty()
            && self.groups.is_empty()
            && self.mapping_rules.is_empty()
            && self.tenants.is_empty()
            && self.relations.is_empty()
    }
}
