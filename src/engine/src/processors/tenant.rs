//! TENANT commands

use super::{already_exists, not_found, ProcessingContext, ProcessingResult, Processed};
use crate::command::{Command, TenantValue};
use keystone_authz::{PermissionType, Rejection, ResourceType};
use keystone_core::DEFAULT_TENANT_IDENTIFIER;

pub fn create(ctx: &ProcessingContext<'_>, mut value: TenantValue) -> ProcessingResult {
    ctx.authorize(ResourceType::Tenant, PermissionType::Create, None)?;

    if value.tenant_id.is_empty() {
        return Err(Rejection::invalid_argument(
            "Expected to create tenant with a non-empty ID, but no ID was given",
        ));
    }
    if ctx.state.membership.tenant(&value.tenant_id).is_some() {
        return Err(already_exists("tenant", "ID", &value.tenant_id));
    }

    let key = ctx.next_key();
    value.tenant_key = key;
    Ok(Processed {
        key,
        command: Command::CreateTenant(value),
    })
}

pub fn update(ctx: &ProcessingContext<'_>, mut value: TenantValue) -> ProcessingResult {
    ctx.authorize(ResourceType::Tenant, PermissionType::Update, Some(&value.tenant_id))?;

    let existing = ctx
        .state
        .membership
        .tenant(&value.tenant_id)
        .ok_or_else(|| not_found("update", "tenant", "ID", &value.tenant_id))?;

    value.tenant_key = existing.tenant_key;
    Ok(Processed {
        key: existing.tenant_key,
        command: Command::UpdateTenant(value),
    })
}

pub fn delete(ctx: &ProcessingContext<'_>, value: TenantValue) -> ProcessingResult {
    ctx.authorize(ResourceType::Tenant, PermissionType::Delete, Some(&value.tenant_id))?;

    if value.tenant_id == DEFAULT_TENANT_IDENTIFIER {
        return Err(Rejection::invalid_argument(format!(
            "Expected to delete tenant with ID '{DEFAULT_TENANT_IDENTIFIER}', but the default tenant cannot be deleted"
        )));
    }

    let existing = ctx
        .state
        .membership
        .tenant(&value.tenant_id)
        .ok_or_else(|| not_found("delete", "tenant", "ID", &value.tenant_id))?;

    Ok(Processed {
        key: existing.tenant_key,
        command: Command::DeleteTenant(TenantValue {
            tenant_key: existing.tenant_key,
            tenant_id: existing.tenant_id.clone(),
            name: existing.name.clone(),
            description: existing.description.clone(),
        }),
    })
}
