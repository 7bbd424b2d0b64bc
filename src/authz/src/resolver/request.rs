//! Authorization requests and tenant answers

use crate::principal::Principal;
use crate::types::{PermissionType, ResourceType};
use keystone_core::DEFAULT_TENANT_IDENTIFIER;
use std::collections::BTreeSet;

/// One permission check
#[derive(Debug, Clone)]
pub struct AuthorizationRequest<'a> {
    pub principal: &'a Principal,
    pub resource_type: ResourceType,
    pub permission_type: PermissionType,
    pub tenant_id: Option<String>,
    pub resource_ids: BTreeSet<String>,
    /// The resource is being created by this command
    pub is_new_resource: bool,
    /// The resource belongs to `tenant_id`
    pub is_tenant_owned_resource: bool,
}

impl<'a> AuthorizationRequest<'a> {
    pub fn new(
        principal: &'a Principal,
        resource_type: ResourceType,
        permission_type: PermissionType,
    ) -> Self {
        Self {
            principal,
            resource_type,
            permission_type,
            tenant_id: None,
            resource_ids: BTreeSet::new(),
            is_new_resource: false,
            is_tenant_owned_resource: false,
        }
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_ids.insert(resource_id.into());
        self
    }

    /// Scope the check to a tenant-owned resource
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self.is_tenant_owned_resource = true;
        self
    }

    pub fn new_resource(mut self) -> Self {
        self.is_new_resource = true;
        self
    }
}

/// Tenants a principal may access
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizedTenants {
    /// No restriction
    Anonymous,
    /// Exactly these tenants
    Authorized(BTreeSet<String>),
}

impl AuthorizedTenants {
    /// Only the default tenant, used when multi-tenancy is disabled
    pub fn default_tenant() -> Self {
        AuthorizedTenants::Authorized(BTreeSet::from([DEFAULT_TENANT_IDENTIFIER.to_string()]))
    }

    pub fn is_authorized_for(&self, tenant_id: &str) -> bool {
        match self {
            AuthorizedTenants::Anonymous => true,
            AuthorizedTenants::Authorized(ids) => ids.contains(tenant_id),
        }
    }

    /// The explicit tenant set, or `None` when unrestricted
    pub fn tenant_ids(&self) -> Option<&BTreeSet<String>> {
        match self {
            AuthorizedTenants::Anonymous => None,
            AuthorizedTenants::Authorized(ids) => Some(ids),
        }
    }
}
