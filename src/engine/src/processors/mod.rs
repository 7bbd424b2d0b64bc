//! Command processors
//!
//! A processor authorizes the caller, validates the command against the
//! partition's identity state and assigns keys. It never mutates state:
//! accepted commands are applied by [`crate::appliers`], on the origin
//! partition right away and on every other partition once distributed.

pub mod authorization;
pub mod deployment;
pub mod group;
pub mod identity_setup;
pub mod mapping_rule;
pub mod membership;
pub mod process_instance;
pub mod role;
pub mod tenant;
pub mod user;

use crate::command::Command;
use keystone_authz::{
    AuthorizationRequest, AuthorizationResolver, IdentityState, PermissionType, Principal,
    Rejection, RelationType, ResourceType,
};
use keystone_core::{Key, KeyGenerator};

/// An accepted command with generated keys filled in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    /// Key of the record the command created or changed
    pub key: Key,
    pub command: Command,
}

pub type ProcessingResult<T = Processed> = std::result::Result<T, Rejection>;

/// What a processor may read while validating one command
pub struct ProcessingContext<'a> {
    pub state: &'a IdentityState,
    pub resolver: &'a AuthorizationResolver,
    pub keys: &'a KeyGenerator,
    pub principal: &'a Principal,
}

impl<'a> ProcessingContext<'a> {
    pub fn new(
        state: &'a IdentityState,
        resolver: &'a AuthorizationResolver,
        keys: &'a KeyGenerator,
        principal: &'a Principal,
    ) -> Self {
        Self {
            state,
            resolver,
            keys,
            principal,
        }
    }

    /// Require `permission_type` on `resource_type`, for one resource id or,
    /// without one, on every id
    pub fn authorize(
        &self,
        resource_type: ResourceType,
        permission_type: PermissionType,
        resource_id: Option<&str>,
    ) -> ProcessingResult<()> {
        let mut request = AuthorizationRequest::new(self.principal, resource_type, permission_type);
        if let Some(resource_id) = resource_id {
            request = request.with_resource_id(resource_id);
        }
        self.resolver.is_authorized_or_internal(self.state, &request)
    }

    pub fn next_key(&self) -> Key {
        self.keys.next_key()
    }

    pub fn multi_tenancy_enabled(&self) -> bool {
        self.resolver.config().multi_tenancy.checks_enabled
    }
}

/// Validate a command and assign its keys
pub fn process(ctx: &ProcessingContext<'_>, command: Command) -> ProcessingResult {
    use Command::*;

    match command {
        CreateAuthorization(value) => authorization::create(ctx, value),
        UpdateAuthorization(value) => authorization::update(ctx, value),
        DeleteAuthorization(value) => authorization::delete(ctx, value),
        AddPermission(value) => authorization::add_permission(ctx, value),
        RemovePermission(value) => authorization::remove_permission(ctx, value),

        CreateRole(value) => role::create(ctx, value),
        UpdateRole(value) => role::update(ctx, value),
        DeleteRole(value) => role::delete(ctx, value),
        AddRoleEntity(value) => membership::add_entity(ctx, RelationType::Role, value, AddRoleEntity),
        RemoveRoleEntity(value) => {
            membership::remove_entity(ctx, RelationType::Role, value, RemoveRoleEntity)
        }

        CreateGroup(value) => group::create(ctx, value),
        UpdateGroup(value) => group::update(ctx, value),
        DeleteGroup(value) => group::delete(ctx, value),
        AddGroupEntity(value) => {
            membership::add_entity(ctx, RelationType::Group, value, AddGroupEntity)
        }
        RemoveGroupEntity(value) => {
            membership::remove_entity(ctx, RelationType::Group, value, RemoveGroupEntity)
        }

        CreateTenant(value) => tenant::create(ctx, value),
        UpdateTenant(value) => tenant::update(ctx, value),
        DeleteTenant(value) => tenant::delete(ctx, value),
        AddTenantEntity(value) => {
            membership::add_entity(ctx, RelationType::Tenant, value, AddTenantEntity)
        }
        RemoveTenantEntity(value) => {
            membership::remove_entity(ctx, RelationType::Tenant, value, RemoveTenantEntity)
        }

        CreateMappingRule(value) => mapping_rule::create(ctx, value),
        UpdateMappingRule(value) => mapping_rule::update(ctx, value),
        DeleteMappingRule(value) => mapping_rule::delete(ctx, value),

        CreateUser(value) => user::create(ctx, value),
        UpdateUser(value) => user::update(ctx, value),
        DeleteUser(value) => user::delete(ctx, value),

        InitializeIdentity(value) => identity_setup::initialize(ctx, value),

        CreateDeployment(value) => deployment::create(ctx, value),
        CreateProcessInstance(value) => process_instance::create(ctx, value),
    }
}

// ==================== Shared rejections ====================

pub(crate) fn already_exists(entity: &str, id_label: &str, id: &str) -> Rejection {
    Rejection::already_exists(format!(
        "Expected to create {entity} with {id_label} '{id}', but a {entity} with this {id_label} already exists"
    ))
}

pub(crate) fn not_found(action: &str, entity: &str, id_label: &str, id: &str) -> Rejection {
    Rejection::not_found(format!(
        "Expected to {action} {entity} with {id_label} '{id}', but a {entity} with this {id_label} does not exist"
    ))
}
