//! Commands accepted by a partition
//!
//! Every command carries a value. The processor fills in generated keys and
//! the same value, now complete, becomes the event and is what gets
//! distributed to the other partitions.

use crate::record::{Intent, ValueType};
use keystone_authz::{
    AuthorizationScope, Owner, OwnerType, PermissionType, RelationType, ResourceMatcher,
    ResourceType,
};
use keystone_core::{Key, DEFAULT_TENANT_IDENTIFIER};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Key of a record that has not been assigned one yet
pub const UNASSIGNED_KEY: Key = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationValue {
    pub authorization_key: Key,
    pub owner_id: String,
    pub owner_type: OwnerType,
    pub resource_type: ResourceType,
    pub resource_matcher: ResourceMatcher,
    pub resource_id: String,
    pub permission_types: BTreeSet<PermissionType>,
}

impl AuthorizationValue {
    pub fn new(
        owner: Owner,
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        permission_types: impl IntoIterator<Item = PermissionType>,
    ) -> Self {
        let scope = AuthorizationScope::of(resource_id);
        Self {
            authorization_key: UNASSIGNED_KEY,
            owner_id: owner.owner_id,
            owner_type: owner.owner_type,
            resource_type,
            resource_matcher: scope.matcher,
            resource_id: scope.resource_id,
            permission_types: permission_types.into_iter().collect(),
        }
    }

    /// Refer to an existing authorization, for update and delete
    pub fn with_key(mut self, authorization_key: Key) -> Self {
        self.authorization_key = authorization_key;
        self
    }

    pub fn owner(&self) -> Owner {
        Owner::new(self.owner_type, self.owner_id.clone())
    }

    /// The matcher wins over the raw id: ANY always stores the wildcard
    pub fn scope(&self) -> AuthorizationScope {
        match self.resource_matcher {
            ResourceMatcher::Any => AuthorizationScope::wildcard(),
            ResourceMatcher::Id => AuthorizationScope::id(self.resource_id.clone()),
        }
    }
}

/// Permissions to add to or remove from one owner, per permission type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsValue {
    pub owner_id: String,
    pub owner_type: OwnerType,
    pub resource_type: ResourceType,
    pub permissions: BTreeMap<PermissionType, BTreeSet<String>>,
    /// Keys for records the command creates, by resource id
    pub new_record_keys: BTreeMap<String, Key>,
}

impl PermissionsValue {
    pub fn new(owner: Owner, resource_type: ResourceType) -> Self {
        Self {
            owner_id: owner.owner_id,
            owner_type: owner.owner_type,
            resource_type,
            permissions: BTreeMap::new(),
            new_record_keys: BTreeMap::new(),
        }
    }

    pub fn with_permission<I, S>(mut self, permission_type: PermissionType, resource_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions
            .entry(permission_type)
            .or_default()
            .extend(resource_ids.into_iter().map(Into::into));
        self
    }

    pub fn owner(&self) -> Owner {
        Owner::new(self.owner_type, self.owner_id.clone())
    }

    /// Every resource id mentioned by any permission
    pub fn resource_ids(&self) -> BTreeSet<String> {
        self.permissions.values().flatten().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleValue {
    pub role_key: Key,
    pub role_id: String,
    pub name: String,
    pub description: String,
}

impl RoleValue {
    pub fn new(role_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role_key: UNASSIGNED_KEY,
            role_id: role_id.into(),
            name: name.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupValue {
    pub group_key: Key,
    pub group_id: String,
    pub name: String,
    pub description: String,
}

impl GroupValue {
    pub fn new(group_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group_key: UNASSIGNED_KEY,
            group_id: group_id.into(),
            name: name.into(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantValue {
    pub tenant_key: Key,
    pub tenant_id: String,
    pub name: String,
    pub description: String,
}

impl TenantValue {
    pub fn new(tenant_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tenant_key: UNASSIGNED_KEY,
            tenant_id: tenant_id.into(),
            name: name.into(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRuleValue {
    pub mapping_rule_key: Key,
    pub mapping_rule_id: String,
    pub name: String,
    pub claim_name: String,
    pub claim_value: String,
}

impl MappingRuleValue {
    pub fn new(
        mapping_rule_id: impl Into<String>,
        claim_name: impl Into<String>,
        claim_value: impl Into<String>,
    ) -> Self {
        let mapping_rule_id = mapping_rule_id.into();
        Self {
            mapping_rule_key: UNASSIGNED_KEY,
            name: mapping_rule_id.clone(),
            mapping_rule_id,
            claim_name: claim_name.into(),
            claim_value: claim_value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserValue {
    pub user_key: Key,
    pub username: String,
    pub name: String,
    pub email: String,
}

impl UserValue {
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            user_key: UNASSIGNED_KEY,
            name: username.clone(),
            email: String::new(),
            username,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }
}

/// Membership of an entity in a role, group or tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityValue {
    /// Id of the role, group or tenant
    pub relation_id: String,
    pub entity_id: String,
    pub entity_type: OwnerType,
}

impl EntityValue {
    pub fn new(relation_id: impl Into<String>, entity: Owner) -> Self {
        Self {
            relation_id: relation_id.into(),
            entity_id: entity.owner_id,
            entity_type: entity.owner_type,
        }
    }

    pub fn entity(&self) -> Owner {
        Owner::new(self.entity_type, self.entity_id.clone())
    }
}

/// Bootstrap of a role with its members, permissions and tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySetupValue {
    pub role: RoleValue,
    pub users: Vec<UserValue>,
    pub mapping_rules: Vec<MappingRuleValue>,
    /// Assigned to `role`; entity types as for ROLE.ADD_ENTITY
    pub role_members: Vec<Owner>,
    pub tenant: Option<TenantValue>,
    pub tenant_members: Vec<Owner>,
    /// Granted to `role` unless already present
    pub authorizations: Vec<AuthorizationValue>,
}

impl IdentitySetupValue {
    pub fn new(role: RoleValue) -> Self {
        Self {
            role,
            users: Vec::new(),
            mapping_rules: Vec::new(),
            role_members: Vec::new(),
            tenant: None,
            tenant_members: Vec::new(),
            authorizations: Vec::new(),
        }
    }

    /// Default bootstrap: an `admin` role holding every permission on every
    /// resource type
    pub fn admin_role() -> Self {
        let authorizations = ResourceType::all()
            .iter()
            .map(|resource_type| {
                AuthorizationValue::new(
                    Owner::role("admin"),
                    *resource_type,
                    keystone_authz::WILDCARD,
                    resource_type.supported_permission_types(),
                )
            })
            .collect();
        Self {
            authorizations,
            ..Self::new(RoleValue::new("admin", "Admin"))
        }
    }

    pub fn with_user(mut self, user: UserValue) -> Self {
        self.role_members.push(Owner::user(user.username.clone()));
        self.users.push(user);
        self
    }

    pub fn with_mapping_rule(mut self, mapping_rule: MappingRuleValue) -> Self {
        self.role_members
            .push(Owner::mapping_rule(mapping_rule.mapping_rule_id.clone()));
        self.mapping_rules.push(mapping_rule);
        self
    }

    pub fn with_tenant(mut self, tenant: TenantValue) -> Self {
        self.tenant = Some(tenant);
        self
    }

    pub fn with_tenant_member(mut self, member: Owner) -> Self {
        self.tenant_members.push(member);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentValue {
    pub deployment_key: Key,
    /// Process ids defined by the deployed resources
    pub process_ids: BTreeSet<String>,
    pub tenant_id: String,
}

impl DeploymentValue {
    pub fn new<I, S>(process_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deployment_key: UNASSIGNED_KEY,
            process_ids: process_ids.into_iter().map(Into::into).collect(),
            tenant_id: DEFAULT_TENANT_IDENTIFIER.to_string(),
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInstanceValue {
    pub process_instance_key: Key,
    pub process_id: String,
    pub tenant_id: String,
}

impl ProcessInstanceValue {
    pub fn new(process_id: impl Into<String>) -> Self {
        Self {
            process_instance_key: UNASSIGNED_KEY,
            process_id: process_id.into(),
            tenant_id: DEFAULT_TENANT_IDENTIFIER.to_string(),
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }
}

/// A command together with its value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    CreateAuthorization(AuthorizationValue),
    UpdateAuthorization(AuthorizationValue),
    DeleteAuthorization(AuthorizationValue),
    AddPermission(PermissionsValue),
    RemovePermission(PermissionsValue),

    CreateRole(RoleValue),
    UpdateRole(RoleValue),
    DeleteRole(RoleValue),
    AddRoleEntity(EntityValue),
    RemoveRoleEntity(EntityValue),

    CreateGroup(GroupValue),
    UpdateGroup(GroupValue),
    DeleteGroup(GroupValue),
    AddGroupEntity(EntityValue),
    RemoveGroupEntity(EntityValue),

    CreateTenant(TenantValue),
    UpdateTenant(TenantValue),
    DeleteTenant(TenantValue),
    AddTenantEntity(EntityValue),
    RemoveTenantEntity(EntityValue),

    CreateMappingRule(MappingRuleValue),
    UpdateMappingRule(MappingRuleValue),
    DeleteMappingRule(MappingRuleValue),

    CreateUser(UserValue),
    UpdateUser(UserValue),
    DeleteUser(UserValue),

    InitializeIdentity(IdentitySetupValue),

    CreateDeployment(DeploymentValue),
    CreateProcessInstance(ProcessInstanceValue),
}

impl Command {
    pub fn value_type(&self) -> ValueType {
        use Command::*;
        match self {
            CreateAuthorization(_) | UpdateAuthorization(_) | DeleteAuthorization(_)
            | AddPermission(_) | RemovePermission(_) => ValueType::Authorization,
            CreateRole(_) | UpdateRole(_) | DeleteRole(_) | AddRoleEntity(_)
            | RemoveRoleEntity(_) => ValueType::Role,
            CreateGroup(_) | UpdateGroup(_) | DeleteGroup(_) | AddGroupEntity(_)
            | RemoveGroupEntity(_) => ValueType::Group,
            CreateTenant(_) | UpdateTenant(_) | DeleteTenant(_) | AddTenantEntity(_)
            | RemoveTenantEntity(_) => ValueType::Tenant,
            CreateMappingRule(_) | UpdateMappingRule(_) | DeleteMappingRule(_) => {
                ValueType::MappingRule
            }
            CreateUser(_) | UpdateUser(_) | DeleteUser(_) => ValueType::User,
            InitializeIdentity(_) => ValueType::IdentitySetup,
            CreateDeployment(_) => ValueType::Deployment,
            CreateProcessInstance(_) => ValueType::ProcessInstance,
        }
    }

    /// Intent of the command record
    pub fn intent(&self) -> Intent {
        use Command::*;
        match self {
            CreateAuthorization(_) | CreateRole(_) | CreateGroup(_) | CreateTenant(_)
            | CreateMappingRule(_) | CreateUser(_) | CreateDeployment(_)
            | CreateProcessInstance(_) => Intent::Create,
            UpdateAuthorization(_) | UpdateRole(_) | UpdateGroup(_) | UpdateTenant(_)
            | UpdateMappingRule(_) | UpdateUser(_) => Intent::Update,
            DeleteAuthorization(_) | DeleteRole(_) | DeleteGroup(_) | DeleteTenant(_)
            | DeleteMappingRule(_) | DeleteUser(_) => Intent::Delete,
            AddPermission(_) => Intent::AddPermission,
            RemovePermission(_) => Intent::RemovePermission,
            AddRoleEntity(_) | AddGroupEntity(_) | AddTenantEntity(_) => Intent::AddEntity,
            RemoveRoleEntity(_) | RemoveGroupEntity(_) | RemoveTenantEntity(_) => {
                Intent::RemoveEntity
            }
            InitializeIdentity(_) => Intent::Initialize,
        }
    }

    /// Intent of the event written when the command is accepted
    pub fn event_intent(&self) -> Intent {
        self.intent().event()
    }

    /// Identity commands replicate to every partition; the rest stay local
    pub fn is_distributed(&self) -> bool {
        !matches!(
            self,
            Command::CreateDeployment(_) | Command::CreateProcessInstance(_)
        )
    }

    /// Container relation of an ADD_ENTITY or REMOVE_ENTITY command
    pub fn relation(&self) -> Option<RelationType> {
        use Command::*;
        match self {
            AddRoleEntity(_) | RemoveRoleEntity(_) => Some(RelationType::Role),
            AddGroupEntity(_) | RemoveGroupEntity(_) => Some(RelationType::Group),
            AddTenantEntity(_) | RemoveTenantEntity(_) => Some(RelationType::Tenant),
            _ => None,
        }
    }
}
