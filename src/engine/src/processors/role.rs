//! ROLE commands

use super::{already_exists, not_found, ProcessingContext, ProcessingResult, Processed};
use crate::command::{Command, RoleValue};
use keystone_authz::{PermissionType, ResourceType};

pub fn create(ctx: &ProcessingContext<'_>, mut value: RoleValue) -> ProcessingResult {
    ctx.authorize(ResourceType::Role, PermissionType::Create, None)?;

    if ctx.state.membership.role(&value.role_id).is_some() {
        return Err(already_exists("role", "ID", &value.role_id));
    }

    let key = ctx.next_key();
    value.role_key = key;
    Ok(Processed {
        key,
        command: Command::CreateRole(value),
    })
}

pub fn update(ctx: &ProcessingContext<'_>, mut value: RoleValue) -> ProcessingResult {
    ctx.authorize(ResourceType::Role, PermissionType::Update, Some(&value.role_id))?;

    let existing = ctx
        .state
        .membership
        .role(&value.role_id)
        .ok_or_else(|| not_found("update", "role", "ID", &value.role_id))?;

    value.role_key = existing.role_key;
    Ok(Processed {
        key: existing.role_key,
        command: Command::UpdateRole(value),
    })
}

pub fn delete(ctx: &ProcessingContext<'_>, value: RoleValue) -> ProcessingResult {
    ctx.authorize(ResourceType::Role, PermissionType::Delete, Some(&value.role_id))?;

    let existing = ctx
        .state
        .membership
        .role(&value.role_id)
        .ok_or_else(|| not_found("delete", "role", "ID", &value.role_id))?;

    Ok(Processed {
        key: existing.role_key,
        command: Command::DeleteRole(RoleValue {
            role_key: existing.role_key,
            role_id: existing.role_id.clone(),
            name: existing.name.clone(),
            description: existing.description.clone(),
        }),
    })
}
