//! IDENTITY_SETUP.INITIALIZE
//!
//! Bootstraps a role together with its users, mapping rules, tenant and
//! permissions. Entities that already exist keep their key and are not
//! recreated; the role and tenant assignments are always ensured.

use super::authorization::check_permission_types;
use super::membership::allowed_members;
use super::{ProcessingContext, ProcessingResult, Processed};
use crate::command::{Command, IdentitySetupValue};
use keystone_authz::{Owner, OwnerType, PermissionType, Rejection, RelationType, ResourceType};
use std::collections::BTreeSet;

pub fn initialize(ctx: &ProcessingContext<'_>, mut value: IdentitySetupValue) -> ProcessingResult {
    ctx.authorize(ResourceType::Role, PermissionType::Create, None)?;

    let membership = &ctx.state.membership;

    value.role.role_key = match membership.role(&value.role.role_id) {
        Some(role) => role.role_key,
        None => ctx.next_key(),
    };
    for user in &mut value.users {
        user.user_key = match membership.user(&user.username) {
            Some(existing) => existing.user_key,
            None => ctx.next_key(),
        };
    }
    for rule in &mut value.mapping_rules {
        rule.mapping_rule_key = match membership.mapping_rule(&rule.mapping_rule_id) {
            Some(existing) => existing.mapping_rule_key,
            None => ctx.next_key(),
        };
    }
    if let Some(tenant) = &mut value.tenant {
        tenant.tenant_key = match membership.tenant(&tenant.tenant_id) {
            Some(existing) => existing.tenant_key,
            None => ctx.next_key(),
        };
    }

    let created = created_owners(&value);
    let exists = |owner: &Owner| created.contains(owner) || membership.owner_exists(owner);

    check_members(&value.role_members, RelationType::Role, &exists)?;
    if value.tenant.is_some() {
        check_members(&value.tenant_members, RelationType::Tenant, &exists)?;
    } else if !value.tenant_members.is_empty() {
        return Err(Rejection::invalid_argument(
            "Expected to assign tenant members during identity setup, but no tenant was given",
        ));
    }

    for authorization in &mut value.authorizations {
        check_permission_types(
            "create",
            authorization.resource_type,
            &authorization.permission_types,
        )?;
        let owner = authorization.owner();
        if !exists(&owner) {
            return Err(owner_not_found(&owner));
        }

        let scope = authorization.scope();
        authorization.authorization_key = match ctx.state.permissions.find(
            &owner,
            authorization.resource_type,
            &scope.resource_id,
        ) {
            Some(record) => record.authorization_key,
            None => ctx.next_key(),
        };
        authorization.resource_matcher = scope.matcher;
        authorization.resource_id = scope.resource_id;
    }

    Ok(Processed {
        key: value.role.role_key,
        command: Command::InitializeIdentity(value),
    })
}

/// Owners the command itself creates
fn created_owners(value: &IdentitySetupValue) -> BTreeSet<Owner> {
    let mut owners = BTreeSet::from([Owner::role(value.role.role_id.clone())]);
    owners.extend(value.users.iter().map(|user| Owner::user(user.username.clone())));
    owners.extend(
        value
            .mapping_rules
            .iter()
            .map(|rule| Owner::mapping_rule(rule.mapping_rule_id.clone())),
    );
    owners
}

fn check_members(
    members: &[Owner],
    relation: RelationType,
    exists: &impl Fn(&Owner) -> bool,
) -> ProcessingResult<()> {
    for member in members {
        if !allowed_members(relation).contains(&member.owner_type) {
            return Err(Rejection::invalid_argument(format!(
                "Expected to assign entity of type '{}' to {}, but entities of this type cannot be assigned",
                member.owner_type, relation
            )));
        }
        if member.owner_type != OwnerType::Client && !exists(member) {
            return Err(owner_not_found(member));
        }
    }
    Ok(())
}

fn owner_not_found(owner: &Owner) -> Rejection {
    Rejection::not_found(format!(
        "Expected to find owner with id: '{}', but none was found",
        owner.owner_id
    ))
}
