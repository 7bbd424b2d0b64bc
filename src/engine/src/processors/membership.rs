//! ADD_ENTITY and REMOVE_ENTITY for roles, groups and tenants

use super::{not_found, ProcessingContext, ProcessingResult, Processed};
use crate::command::{Command, EntityValue};
use keystone_authz::{OwnerType, PermissionType, Rejection, RelationType, ResourceType};
use keystone_core::Key;

/// Entity types that may be members of a container
pub fn allowed_members(relation: RelationType) -> &'static [OwnerType] {
    match relation {
        RelationType::Role => &[
            OwnerType::User,
            OwnerType::Client,
            OwnerType::Group,
            OwnerType::MappingRule,
        ],
        RelationType::Group => &[OwnerType::User, OwnerType::Client, OwnerType::MappingRule],
        RelationType::Tenant => &[
            OwnerType::User,
            OwnerType::Client,
            OwnerType::Group,
            OwnerType::Role,
            OwnerType::MappingRule,
        ],
    }
}

pub fn add_entity(
    ctx: &ProcessingContext<'_>,
    relation: RelationType,
    value: EntityValue,
    command: fn(EntityValue) -> Command,
) -> ProcessingResult {
    let key = check_container(ctx, relation, &value.relation_id)?;
    let kind = container_name(relation);

    if !allowed_members(relation).contains(&value.entity_type) {
        return Err(Rejection::invalid_argument(format!(
            "Expected to add entity of type '{}' to {kind} with ID '{}', but entities of this type cannot be assigned to a {kind}",
            value.entity_type, value.relation_id
        )));
    }

    let entity = value.entity();
    if !ctx.state.membership.owner_exists(&entity) {
        return Err(Rejection::not_found(format!(
            "Expected to add an entity with ID '{}' and type '{}' to {kind} with ID '{}', but the entity doesn't exist",
            value.entity_id, value.entity_type, value.relation_id
        )));
    }

    if ctx
        .state
        .membership
        .has_relation(&entity, relation, &value.relation_id)
    {
        return Err(Rejection::already_exists(format!(
            "Expected to add entity with ID '{}' to {kind} with ID '{}', but the entity is already assigned to this {kind}",
            value.entity_id, value.relation_id
        )));
    }

    Ok(Processed {
        key,
        command: command(value),
    })
}

pub fn remove_entity(
    ctx: &ProcessingContext<'_>,
    relation: RelationType,
    value: EntityValue,
    command: fn(EntityValue) -> Command,
) -> ProcessingResult {
    let key = check_container(ctx, relation, &value.relation_id)?;
    let kind = container_name(relation);

    if !ctx
        .state
        .membership
        .has_relation(&value.entity(), relation, &value.relation_id)
    {
        return Err(Rejection::not_found(format!(
            "Expected to remove entity with ID '{}' from {kind} with ID '{}', but the entity is not assigned to this {kind}",
            value.entity_id, value.relation_id
        )));
    }

    Ok(Processed {
        key,
        command: command(value),
    })
}

/// Authorize the change and return the container's key
fn check_container(
    ctx: &ProcessingContext<'_>,
    relation: RelationType,
    relation_id: &str,
) -> ProcessingResult<Key> {
    ctx.authorize(resource_type(relation), PermissionType::Update, Some(relation_id))?;

    let membership = &ctx.state.membership;
    let key = match relation {
        RelationType::Role => membership.role(relation_id).map(|role| role.role_key),
        RelationType::Group => membership.group(relation_id).map(|group| group.group_key),
        RelationType::Tenant => membership.tenant(relation_id).map(|tenant| tenant.tenant_key),
    };
    key.ok_or_else(|| not_found("update", container_name(relation), "ID", relation_id))
}

fn container_name(relation: RelationType) -> &'static str {
    match relation {
        RelationType::Role => "role",
        RelationType::Group => "group",
        RelationType::Tenant => "tenant",
    }
}

fn resource_type(relation: RelationType) -> ResourceType {
    match relation {
        RelationType::Role => ResourceType::Role,
        RelationType::Group => ResourceType::Group,
        RelationType::Tenant => ResourceType::Tenant,
    }
}
