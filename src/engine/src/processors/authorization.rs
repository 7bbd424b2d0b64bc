//! AUTHORIZATION commands
//!
//! CREATE, UPDATE and DELETE manage whole authorization records.
//! ADD_PERMISSION and REMOVE_PERMISSION edit the direct grants of one owner,
//! one record per resource id.

use super::{ProcessingContext, ProcessingResult, Processed};
use crate::command::{AuthorizationValue, Command, PermissionsValue};
use keystone_authz::{format_set, Owner, PermissionType, Rejection, ResourceType};
use keystone_core::Key;
use std::collections::BTreeSet;

pub fn create(ctx: &ProcessingContext<'_>, mut value: AuthorizationValue) -> ProcessingResult {
    ctx.authorize(ResourceType::Authorization, PermissionType::Create, None)?;

    let owner = value.owner();
    check_owner(ctx, &owner)?;
    check_permission_types("create", value.resource_type, &value.permission_types)?;

    let scope = value.scope();
    if ctx
        .state
        .permissions
        .find(&owner, value.resource_type, &scope.resource_id)
        .is_some()
    {
        return Err(duplicate_record("create", &owner, &scope.resource_id));
    }

    let key = ctx.next_key();
    value.authorization_key = key;
    value.resource_matcher = scope.matcher;
    value.resource_id = scope.resource_id;
    Ok(Processed {
        key,
        command: Command::CreateAuthorization(value),
    })
}

pub fn update(ctx: &ProcessingContext<'_>, mut value: AuthorizationValue) -> ProcessingResult {
    ctx.authorize(ResourceType::Authorization, PermissionType::Update, None)?;

    let key = value.authorization_key;
    if ctx.state.permissions.get(key).is_none() {
        return Err(unknown_key("update", key));
    }

    let owner = value.owner();
    check_owner(ctx, &owner)?;
    check_permission_types("update", value.resource_type, &value.permission_types)?;

    let scope = value.scope();
    let conflict = ctx
        .state
        .permissions
        .find(&owner, value.resource_type, &scope.resource_id)
        .map(|record| record.authorization_key != key)
        .unwrap_or(false);
    if conflict {
        return Err(duplicate_record("update", &owner, &scope.resource_id));
    }

    value.resource_matcher = scope.matcher;
    value.resource_id = scope.resource_id;
    Ok(Processed {
        key,
        command: Command::UpdateAuthorization(value),
    })
}

pub fn delete(ctx: &ProcessingContext<'_>, value: AuthorizationValue) -> ProcessingResult {
    ctx.authorize(ResourceType::Authorization, PermissionType::Delete, None)?;

    let key = value.authorization_key;
    let record = ctx
        .state
        .permissions
        .get(key)
        .ok_or_else(|| unknown_key("delete", key))?;

    // the event carries the deleted record
    let deleted = AuthorizationValue {
        authorization_key: key,
        owner_id: record.owner_id.clone(),
        owner_type: record.owner_type,
        resource_type: record.resource_type,
        resource_matcher: record.resource_matcher,
        resource_id: record.resource_id.clone(),
        permission_types: record.permission_types.clone(),
    };
    Ok(Processed {
        key,
        command: Command::DeleteAuthorization(deleted),
    })
}

pub fn add_permission(ctx: &ProcessingContext<'_>, mut value: PermissionsValue) -> ProcessingResult {
    ctx.authorize(ResourceType::Authorization, PermissionType::Update, None)?;

    let owner = value.owner();
    check_owner(ctx, &owner)?;
    check_not_empty("add", &value)?;
    let requested: BTreeSet<PermissionType> = value.permissions.keys().copied().collect();
    check_permission_types("create", value.resource_type, &requested)?;

    for (permission_type, resource_ids) in &value.permissions {
        let existing = direct_resource_ids(ctx, &owner, value.resource_type, *permission_type);
        let duplicates: BTreeSet<&String> = resource_ids.intersection(&existing).collect();
        if !duplicates.is_empty() {
            return Err(Rejection::already_exists(format!(
                "Expected to add '{}' permission for resource '{}' and resource identifiers '{}' for owner '{}', but this permission for resource identifiers '{}' already exist. Existing resource ids are: '{}'",
                permission_type,
                value.resource_type,
                format_set(resource_ids),
                owner.owner_id,
                format_set(duplicates),
                format_set(&existing),
            )));
        }
    }

    value.new_record_keys.clear();
    for resource_id in value.resource_ids() {
        if ctx
            .state
            .permissions
            .find(&owner, value.resource_type, &resource_id)
            .is_none()
        {
            value.new_record_keys.insert(resource_id, ctx.next_key());
        }
    }

    let key = first_record_key(ctx, &value);
    Ok(Processed {
        key,
        command: Command::AddPermission(value),
    })
}

pub fn remove_permission(
    ctx: &ProcessingContext<'_>,
    mut value: PermissionsValue,
) -> ProcessingResult {
    ctx.authorize(ResourceType::Authorization, PermissionType::Update, None)?;

    let owner = value.owner();
    check_owner(ctx, &owner)?;
    check_not_empty("delete", &value)?;

    for (permission_type, resource_ids) in &value.permissions {
        let existing = direct_resource_ids(ctx, &owner, value.resource_type, *permission_type);
        let missing: BTreeSet<&String> = resource_ids.difference(&existing).collect();
        if !missing.is_empty() {
            return Err(Rejection::not_found(format!(
                "Expected to delete '{}' permission for resource '{}' and resource identifiers '{}' for owner '{}', but this permission for resource identifiers '{}' is not found. Existing resource ids are: '{}'",
                permission_type,
                value.resource_type,
                format_set(resource_ids),
                owner.owner_id,
                format_set(missing),
                format_set(&existing),
            )));
        }
    }

    value.new_record_keys.clear();
    let key = first_record_key(ctx, &value);
    Ok(Processed {
        key,
        command: Command::RemovePermission(value),
    })
}

/// Resource ids for which `owner` itself holds `permission_type`.
/// Grants inherited through roles or groups do not count.
fn direct_resource_ids(
    ctx: &ProcessingContext<'_>,
    owner: &Owner,
    resource_type: ResourceType,
    permission_type: PermissionType,
) -> BTreeSet<String> {
    ctx.state
        .permissions
        .direct_scopes(owner, resource_type, permission_type)
        .into_iter()
        .map(|scope| scope.resource_id)
        .collect()
}

fn first_record_key(ctx: &ProcessingContext<'_>, value: &PermissionsValue) -> Key {
    let owner = value.owner();
    value
        .resource_ids()
        .iter()
        .find_map(|resource_id| {
            value.new_record_keys.get(resource_id).copied().or_else(|| {
                ctx.state
                    .permissions
                    .find(&owner, value.resource_type, resource_id)
                    .map(|record| record.authorization_key)
            })
        })
        .unwrap_or_default()
}

pub(crate) fn check_owner(ctx: &ProcessingContext<'_>, owner: &Owner) -> ProcessingResult<()> {
    if ctx.state.membership.owner_exists(owner) {
        Ok(())
    } else {
        Err(Rejection::not_found(format!(
            "Expected to find owner with id: '{}', but none was found",
            owner.owner_id
        )))
    }
}

pub(crate) fn check_permission_types(
    action: &str,
    resource_type: ResourceType,
    permission_types: &BTreeSet<PermissionType>,
) -> ProcessingResult<()> {
    if permission_types.is_empty() {
        return Err(Rejection::invalid_argument(format!(
            "Expected to {action} authorization for resource type '{resource_type}' with at least one permission type, but none were given"
        )));
    }

    let supported = resource_type.supported_permission_types();
    let unsupported: BTreeSet<&PermissionType> = permission_types.difference(&supported).collect();
    if unsupported.is_empty() {
        return Ok(());
    }
    Err(Rejection::invalid_argument(format!(
        "Expected to {action} authorization with permission types '{}' and resource type '{}', but these permissions are not supported. Supported permission types are: '{}'",
        format_set(unsupported),
        resource_type,
        format_set(&supported),
    )))
}

fn check_not_empty(action: &str, value: &PermissionsValue) -> ProcessingResult<()> {
    if !value.permissions.is_empty() && value.permissions.values().all(|ids| !ids.is_empty()) {
        return Ok(());
    }
    Err(Rejection::invalid_argument(format!(
        "Expected to {action} permissions for resource '{}' for owner '{}', but no permissions with resource identifiers were given",
        value.resource_type, value.owner_id
    )))
}

fn duplicate_record(action: &str, owner: &Owner, resource_id: &str) -> Rejection {
    Rejection::already_exists(format!(
        "Expected to {action} authorization for owner '{}' for resource identifier '{}', but an authorization for this resource identifier already exists",
        owner.owner_id, resource_id
    ))
}

fn unknown_key(action: &str, key: Key) -> Rejection {
    Rejection::not_found(format!(
        "Expected to {action} authorization with key '{key}', but an authorization with this key does not exist"
    ))
}
