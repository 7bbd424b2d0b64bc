//! Core authorization types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of entity that can own permissions or be a member of a role,
/// group or tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OwnerType {
    User,
    Client,
    Role,
    Group,
    MappingRule,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerType::User => "USER",
            OwnerType::Client => "CLIENT",
            OwnerType::Role => "ROLE",
            OwnerType::Group => "GROUP",
            OwnerType::MappingRule => "MAPPING_RULE",
        }
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission holder, keyed uniformly by `(owner_type, owner_id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Owner {
    pub owner_type: OwnerType,
    pub owner_id: String,
}

impl Owner {
    pub fn new(owner_type: OwnerType, owner_id: impl Into<String>) -> Self {
        Self {
            owner_type,
            owner_id: owner_id.into(),
        }
    }

    pub fn user(username: impl Into<String>) -> Self {
        Self::new(OwnerType::User, username)
    }

    pub fn role(role_id: impl Into<String>) -> Self {
        Self::new(OwnerType::Role, role_id)
    }

    pub fn group(group_id: impl Into<String>) -> Self {
        Self::new(OwnerType::Group, group_id)
    }

    pub fn mapping_rule(mapping_rule_id: impl Into<String>) -> Self {
        Self::new(OwnerType::MappingRule, mapping_rule_id)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner_type, self.owner_id)
    }
}

/// Operation a permission grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionType {
    Access,
    Create,
    CreateProcessInstance,
    CreateDecisionInstance,
    Read,
    ReadProcessDefinition,
    ReadProcessInstance,
    ReadUserTask,
    ReadDecisionDefinition,
    ReadDecisionInstance,
    Update,
    UpdateProcessInstance,
    UpdateUserTask,
    Delete,
    DeleteProcess,
    DeleteDrd,
    DeleteForm,
    DeleteResource,
    DeleteProcessInstance,
    DeleteDecisionInstance,
}

impl PermissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionType::Access => "ACCESS",
            PermissionType::Create => "CREATE",
            PermissionType::CreateProcessInstance => "CREATE_PROCESS_INSTANCE",
            PermissionType::CreateDecisionInstance => "CREATE_DECISION_INSTANCE",
            PermissionType::Read => "READ",
            PermissionType::ReadProcessDefinition => "READ_PROCESS_DEFINITION",
            PermissionType::ReadProcessInstance => "READ_PROCESS_INSTANCE",
            PermissionType::ReadUserTask => "READ_USER_TASK",
            PermissionType::ReadDecisionDefinition => "READ_DECISION_DEFINITION",
            PermissionType::ReadDecisionInstance => "READ_DECISION_INSTANCE",
            PermissionType::Update => "UPDATE",
            PermissionType::UpdateProcessInstance => "UPDATE_PROCESS_INSTANCE",
            PermissionType::UpdateUserTask => "UPDATE_USER_TASK",
            PermissionType::Delete => "DELETE",
            PermissionType::DeleteProcess => "DELETE_PROCESS",
            PermissionType::DeleteDrd => "DELETE_DRD",
            PermissionType::DeleteForm => "DELETE_FORM",
            PermissionType::DeleteResource => "DELETE_RESOURCE",
            PermissionType::DeleteProcessInstance => "DELETE_PROCESS_INSTANCE",
            PermissionType::DeleteDecisionInstance => "DELETE_DECISION_INSTANCE",
        }
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of resource a permission applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    Authorization,
    Component,
    DecisionDefinition,
    DecisionRequirementsDefinition,
    Deployment,
    Group,
    MappingRule,
    Message,
    ProcessDefinition,
    Resource,
    Role,
    System,
    Tenant,
    User,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Authorization => "AUTHORIZATION",
            ResourceType::Component => "COMPONENT",
            ResourceType::DecisionDefinition => "DECISION_DEFINITION",
            ResourceType::DecisionRequirementsDefinition => "DECISION_REQUIREMENTS_DEFINITION",
            ResourceType::Deployment => "DEPLOYMENT",
            ResourceType::Group => "GROUP",
            ResourceType::MappingRule => "MAPPING_RULE",
            ResourceType::Message => "MESSAGE",
            ResourceType::ProcessDefinition => "PROCESS_DEFINITION",
            ResourceType::Resource => "RESOURCE",
            ResourceType::Role => "ROLE",
            ResourceType::System => "SYSTEM",
            ResourceType::Tenant => "TENANT",
            ResourceType::User => "USER",
        }
    }

    /// Every resource type, in declaration order
    pub fn all() -> &'static [ResourceType] {
        &[
            ResourceType::Authorization,
            ResourceType::Component,
            ResourceType::DecisionDefinition,
            ResourceType::DecisionRequirementsDefinition,
            ResourceType::Deployment,
            ResourceType::Group,
            ResourceType::MappingRule,
            ResourceType::Message,
            ResourceType::ProcessDefinition,
            ResourceType::Resource,
            ResourceType::Role,
            ResourceType::System,
            ResourceType::Tenant,
            ResourceType::User,
        ]
    }

    /// Permission types that may be granted on this resource type
    pub fn supported_permission_types(&self) -> BTreeSet<PermissionType> {
        use PermissionType::*;

        let supported: &[PermissionType] = match self {
            ResourceType::Authorization
            | ResourceType::Group
            | ResourceType::MappingRule
            | ResourceType::Role
            | ResourceType::Tenant
            | ResourceType::User => &[Create, Read, Update, Delete],
            ResourceType::Component => &[Access],
            ResourceType::DecisionDefinition => &[
                CreateDecisionInstance,
                ReadDecisionDefinition,
                ReadDecisionInstance,
                DeleteDecisionInstance,
            ],
            ResourceType::DecisionRequirementsDefinition => &[Read],
            ResourceType::Deployment => &[Create, Read, Delete],
            ResourceType::Message => &[Create, Read],
            ResourceType::ProcessDefinition => &[
                CreateProcessInstance,
                ReadProcessDefinition,
                ReadProcessInstance,
                ReadUserTask,
                UpdateProcessInstance,
                UpdateUserTask,
                DeleteProcessInstance,
            ],
            ResourceType::Resource => &[
                Create,
                Read,
                DeleteDrd,
                DeleteForm,
                DeleteProcess,
                DeleteResource,
            ],
            ResourceType::System => &[Read, Update],
        };

        supported.iter().copied().collect()
    }

    pub fn supports(&self, permission_type: PermissionType) -> bool {
        self.supported_permission_types().contains(&permission_type)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render a set the way rejection messages list identifiers: `[a, b]`
pub fn format_set<T: fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
    let rendered: Vec<String> = items.into_iter().map(|item| item.to_string()).collect();
    format!("[{}]", rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_permission_types() {
        assert!(ResourceType::Deployment.supports(PermissionType::Create));
        assert!(!ResourceType::Deployment.supports(PermissionType::Update));
        assert!(ResourceType::ProcessDefinition.supports(PermissionType::CreateProcessInstance));
        assert!(ResourceType::Component.supports(PermissionType::Access));
        assert!(!ResourceType::Component.supports(PermissionType::Read));
    }

    #[test]
    fn test_every_resource_type_supports_something() {
        for resource_type in ResourceType::all() {
            assert!(!resource_type.supported_permission_types().is_empty());
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(OwnerType::MappingRule.to_string(), "MAPPING_RULE");
        assert_eq!(PermissionType::CreateProcessInstance.to_string(), "CREATE_PROCESS_INSTANCE");
        assert_eq!(ResourceType::ProcessDefinition.to_string(), "PROCESS_DEFINITION");
        assert_eq!(Owner::user("foo").to_string(), "USER:foo");
    }

    #[test]
    fn test_format_set_is_sorted_for_ordered_input() {
        let ids: BTreeSet<&str> = ["foo", "bar", "*"].into_iter().collect();
        assert_eq!(format_set(ids), "[*, bar, foo]");
        assert_eq!(format_set(Vec::<String>::new()), "[]");
    }
}
