//! GROUP commands

use super::{already_exists, not_found, ProcessingContext, ProcessingResult, Processed};
use crate::command::{Command, GroupValue};
use keystone_authz::{PermissionType, ResourceType};

pub fn create(ctx: &ProcessingContext<'_>, mut value: GroupValue) -> ProcessingResult {
    ctx.authorize(ResourceType::Group, PermissionType::Create, None)?;

    if ctx.state.membership.group(&value.group_id).is_some() {
        return Err(already_exists("group", "ID", &value.group_id));
    }

    let key = ctx.next_key();
    value.group_key = key;
    Ok(Processed {
        key,
        command: Command::CreateGroup(value),
    })
}

pub fn update(ctx: &ProcessingContext<'_>, mut value: GroupValue) -> ProcessingResult {
    ctx.authorize(ResourceType::Group, PermissionType::Update, Some(&value.group_id))?;

    let existing = ctx
        .state
        .membership
        .group(&value.group_id)
        .ok_or_else(|| not_found("update", "group", "ID", &value.group_id))?;

    value.group_key = existing.group_key;
    Ok(Processed {
        key: existing.group_key,
        command: Command::UpdateGroup(value),
    })
}

pub fn delete(ctx: &ProcessingContext<'_>, value: GroupValue) -> ProcessingResult {
    ctx.authorize(ResourceType::Group, PermissionType::Delete, Some(&value.group_id))?;

    let existing = ctx
        .state
        .membership
        .group(&value.group_id)
        .ok_or_else(|| not_found("delete", "group", "ID", &value.group_id))?;

    Ok(Processed {
        key: existing.group_key,
        command: Command::DeleteGroup(GroupValue {
            group_key: existing.group_key,
            group_id: existing.group_id.clone(),
            name: existing.name.clone(),
            description: existing.description.clone(),
        }),
    })
}
