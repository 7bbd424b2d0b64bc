//! USER commands

use super::{already_exists, not_found, ProcessingContext, ProcessingResult, Processed};
use crate::command::{Command, UserValue};
use keystone_authz::{PermissionType, ResourceType};

pub fn create(ctx: &ProcessingContext<'_>, mut value: UserValue) -> ProcessingResult {
    ctx.authorize(ResourceType::User, PermissionType::Create, None)?;

    if ctx.state.membership.user(&value.username).is_some() {
        return Err(already_exists("user", "username", &value.username));
    }

    let key = ctx.next_key();
    value.user_key = key;
    Ok(Processed {
        key,
        command: Command::CreateUser(value),
    })
}

pub fn update(ctx: &ProcessingContext<'_>, mut value: UserValue) -> ProcessingResult {
    ctx.authorize(ResourceType::User, PermissionType::Update, Some(&value.username))?;

    let existing = ctx
        .state
        .membership
        .user(&value.username)
        .ok_or_else(|| not_found("update", "user", "username", &value.username))?;

    value.user_key = existing.user_key;
    Ok(Processed {
        key: existing.user_key,
        command: Command::UpdateUser(value),
    })
}

pub fn delete(ctx: &ProcessingContext<'_>, value: UserValue) -> ProcessingResult {
    ctx.authorize(ResourceType::User, PermissionType::Delete, Some(&value.username))?;

    let existing = ctx
        .state
        .membership
        .user(&value.username)
        .ok_or_else(|| not_found("delete", "user", "username", &value.username))?;

    Ok(Processed {
        key: existing.user_key,
        command: Command::DeleteUser(UserValue {
            user_key: existing.user_key,
            username: existing.username.clone(),
            name: existing.name.clone(),
            email: existing.email.clone(),
        }),
    })
}
