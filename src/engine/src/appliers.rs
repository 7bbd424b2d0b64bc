//! State changes of accepted identity commands
//!
//! Appliers run on the origin partition after processing and on every
//! other partition when the distributed command arrives. They never
//! validate and tolerate writes that already happened.

use crate::command::{AuthorizationValue, Command, EntityValue, PermissionsValue, UNASSIGNED_KEY};
use keystone_authz::{
    AuthorizationRecord, Group, IdentityState, MappingRule, Owner, RelationType, Role, Tenant,
    User,
};
use keystone_core::KeyGenerator;

/// Apply an accepted command to the identity state
pub fn apply(state: &mut IdentityState, command: &Command, keys: &KeyGenerator) {
    use Command::*;

    match command {
        CreateAuthorization(value) | UpdateAuthorization(value) => {
            state.permissions.put(authorization_record(value));
        }
        DeleteAuthorization(value) => {
            state.permissions.remove(value.authorization_key);
        }
        AddPermission(value) => add_permissions(state, value, keys),
        RemovePermission(value) => {
            let owner = value.owner();
            for (permission_type, resource_ids) in &value.permissions {
                for resource_id in resource_ids {
                    state.permissions.remove_permission(
                        &owner,
                        value.resource_type,
                        *permission_type,
                        resource_id,
                    );
                }
            }
        }

        CreateRole(value) | UpdateRole(value) => state.membership.put_role(Role {
            role_key: value.role_key,
            role_id: value.role_id.clone(),
            name: value.name.clone(),
            description: value.description.clone(),
        }),
        DeleteRole(value) => {
            state.membership.remove_role(&value.role_id);
            state.permissions.remove_owner(&Owner::role(value.role_id.clone()));
        }

        CreateGroup(value) | UpdateGroup(value) => state.membership.put_group(Group {
            group_key: value.group_key,
            group_id: value.group_id.clone(),
            name: value.name.clone(),
            description: value.description.clone(),
        }),
        DeleteGroup(value) => {
            state.membership.remove_group(&value.group_id);
            state.permissions.remove_owner(&Owner::group(value.group_id.clone()));
        }

        CreateTenant(value) | UpdateTenant(value) => state.membership.put_tenant(Tenant {
            tenant_key: value.tenant_key,
            tenant_id: value.tenant_id.clone(),
            name: value.name.clone(),
            description: value.description.clone(),
        }),
        DeleteTenant(value) => {
            state.membership.remove_tenant(&value.tenant_id);
        }

        AddRoleEntity(value) => add_entity(state, RelationType::Role, value),
        RemoveRoleEntity(value) => remove_entity(state, RelationType::Role, value),
        AddGroupEntity(value) => add_entity(state, RelationType::Group, value),
        RemoveGroupEntity(value) => remove_entity(state, RelationType::Group, value),
        AddTenantEntity(value) => add_entity(state, RelationType::Tenant, value),
        RemoveTenantEntity(value) => remove_entity(state, RelationType::Tenant, value),

        CreateMappingRule(value) | UpdateMappingRule(value) => {
            state.membership.put_mapping_rule(MappingRule {
                mapping_rule_key: value.mapping_rule_key,
                mapping_rule_id: value.mapping_rule_id.clone(),
                name: value.name.clone(),
                claim_name: value.claim_name.clone(),
                claim_value: value.claim_value.clone(),
            })
        }
        DeleteMappingRule(value) => {
            state.membership.remove_mapping_rule(&value.mapping_rule_id);
            state
                .permissions
                .remove_owner(&Owner::mapping_rule(value.mapping_rule_id.clone()));
        }

        CreateUser(value) | UpdateUser(value) => state.membership.put_user(User {
            user_key: value.user_key,
            username: value.username.clone(),
            name: value.name.clone(),
            email: value.email.clone(),
        }),
        DeleteUser(value) => {
            state.membership.remove_user(&value.username);
            state.permissions.remove_owner(&Owner::user(value.username.clone()));
        }

        InitializeIdentity(value) => {
            let membership = &mut state.membership;
            if membership.role(&value.role.role_id).is_none() {
                membership.put_role(Role {
                    role_key: value.role.role_key,
                    role_id: value.role.role_id.clone(),
                    name: value.role.name.clone(),
                    description: value.role.description.clone(),
                });
            }
            for user in &value.users {
                if membership.user(&user.username).is_none() {
                    membership.put_user(User {
                        user_key: user.user_key,
                        username: user.username.clone(),
                        name: user.name.clone(),
                        email: user.email.clone(),
                    });
                }
            }
            for rule in &value.mapping_rules {
                if membership.mapping_rule(&rule.mapping_rule_id).is_none() {
                    membership.put_mapping_rule(MappingRule {
                        mapping_rule_key: rule.mapping_rule_key,
                        mapping_rule_id: rule.mapping_rule_id.clone(),
                        name: rule.name.clone(),
                        claim_name: rule.claim_name.clone(),
                        claim_value: rule.claim_value.clone(),
                    });
                }
            }
            if let Some(tenant) = &value.tenant {
                if membership.tenant(&tenant.tenant_id).is_none() {
                    membership.put_tenant(Tenant {
                        tenant_key: tenant.tenant_key,
                        tenant_id: tenant.tenant_id.clone(),
                        name: tenant.name.clone(),
                        description: tenant.description.clone(),
                    });
                }
                for member in &value.tenant_members {
                    membership.insert_relation(member, RelationType::Tenant, &tenant.tenant_id);
                }
            }
            for member in &value.role_members {
                membership.insert_relation(member, RelationType::Role, &value.role.role_id);
            }

            for authorization in &value.authorizations {
                let owner = authorization.owner();
                let scope = authorization.scope();
                for permission_type in &authorization.permission_types {
                    state.permissions.add_permission(
                        &owner,
                        authorization.resource_type,
                        *permission_type,
                        &scope.resource_id,
                        authorization.authorization_key,
                    );
                }
            }
        }

        // No identity state
        CreateDeployment(_) | CreateProcessInstance(_) => {}
    }
}

fn authorization_record(value: &AuthorizationValue) -> AuthorizationRecord {
    let scope = value.scope();
    AuthorizationRecord {
        authorization_key: value.authorization_key,
        owner_id: value.owner_id.clone(),
        owner_type: value.owner_type,
        resource_type: value.resource_type,
        resource_matcher: scope.matcher,
        resource_id: scope.resource_id,
        permission_types: value.permission_types.clone(),
    }
}

fn add_permissions(state: &mut IdentityState, value: &PermissionsValue, keys: &KeyGenerator) {
    let owner = value.owner();
    for (permission_type, resource_ids) in &value.permissions {
        for resource_id in resource_ids {
            let new_key = match value.new_record_keys.get(resource_id) {
                Some(key) => *key,
                None if state
                    .permissions
                    .find(&owner, value.resource_type, resource_id)
                    .is_some() =>
                {
                    UNASSIGNED_KEY
                }
                None => keys.next_key(),
            };
            state.permissions.add_permission(
                &owner,
                value.resource_type,
                *permission_type,
                resource_id,
                new_key,
            );
        }
    }
}

fn add_entity(state: &mut IdentityState, relation: RelationType, value: &EntityValue) {
    state
        .membership
        .insert_relation(&value.entity(), relation, &value.relation_id);
}

fn remove_entity(state: &mut IdentityState, relation: RelationType, value: &EntityValue) {
    state
        .membership
        .delete_relation(&value.entity(), relation, &value.relation_id);
}
