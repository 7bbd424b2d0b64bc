//! Identity entities and the membership relation between them

use crate::types::{Owner, OwnerType};
use keystone_core::Key;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Container an entity can be a member of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationType {
    Role,
    Group,
    Tenant,
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelationType::Role => "ROLE",
            RelationType::Group => "GROUP",
            RelationType::Tenant => "TENANT",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_key: Key,
    pub username: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub role_key: Key,
    pub role_id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub group_key: Key,
    pub group_id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    pub mapping_rule_key: Key,
    pub mapping_rule_id: String,
    pub name: String,
    pub claim_name: String,
    pub claim_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_key: Key,
    pub tenant_id: String,
    pub name: String,
    pub description: String,
}

/// Entities plus `entity -> relation -> container ids` and its reverse
#[derive(Debug, Default)]
pub struct MembershipIndex {
    users: BTreeMap<String, User>,
    roles: BTreeMap<String, Role>,
    groups: BTreeMap<String, Group>,
    mapping_rules: BTreeMap<String, MappingRule>,
    tenants: BTreeMap<String, Tenant>,

    memberships: BTreeMap<Owner, BTreeMap<RelationType, BTreeSet<String>>>,
    members: BTreeMap<(RelationType, String), BTreeSet<Owner>>,

    version: u64,
}

impl MembershipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    // ==================== Entities ====================

    pub fn user(&self, username: &str) -> Option<&User> {
        self.users.get(username)
    }

    pub fn role(&self, role_id: &str) -> Option<&Role> {
        self.roles.get(role_id)
    }

    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.get(group_id)
    }

    pub fn mapping_rule(&self, mapping_rule_id: &str) -> Option<&MappingRule> {
        self.mapping_rules.get(mapping_rule_id)
    }

    pub fn tenant(&self, tenant_id: &str) -> Option<&Tenant> {
        self.tenants.get(tenant_id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn mapping_rules(&self) -> impl Iterator<Item = &MappingRule> {
        self.mapping_rules.values()
    }

    pub fn tenants(&self) -> impl Iterator<Item = &Tenant> {
        self.tenants.values()
    }

    /// Whether an owner of this type and id exists. Clients are
    /// authenticated externally and always count as existing.
    pub fn owner_exists(&self, owner: &Owner) -> bool {
        match owner.owner_type {
            OwnerType::User => self.users.contains_key(&owner.owner_id),
            OwnerType::Client => true,
            OwnerType::Role => self.roles.contains_key(&owner.owner_id),
            OwnerType::Group => self.groups.contains_key(&owner.owner_id),
            OwnerType::MappingRule => self.mapping_rules.contains_key(&owner.owner_id),
        }
    }

    /// Whether the container a relation points at exists
    pub fn relation_target_exists(&self, relation: RelationType, id: &str) -> bool {
        match relation {
            RelationType::Role => self.roles.contains_key(id),
            RelationType::Group => self.groups.contains_key(id),
            RelationType::Tenant => self.tenants.contains_key(id),
        }
    }

    pub fn put_user(&mut self, user: User) {
        self.users.insert(user.username.clone(), user);
        self.version += 1;
    }

    pub fn put_role(&mut self, role: Role) {
        self.roles.insert(role.role_id.clone(), role);
        self.version += 1;
    }

    pub fn put_group(&mut self, group: Group) {
        self.groups.insert(group.group_id.clone(), group);
        self.version += 1;
    }

    pub fn put_mapping_rule(&mut self, mapping_rule: MappingRule) {
        self.mapping_rules
            .insert(mapping_rule.mapping_rule_id.clone(), mapping_rule);
        self.version += 1;
    }

    pub fn put_tenant(&mut self, tenant: Tenant) {
        self.tenants.insert(tenant.tenant_id.clone(), tenant);
        self.version += 1;
    }

    /// Remove a user together with all of its memberships
    pub fn remove_user(&mut self, username: &str) -> Option<User> {
        let user = self.users.remove(username)?;
        self.remove_entity_memberships(&Owner::user(username));
        self.version += 1;
        Some(user)
    }

    /// Remove a role, its own memberships and every membership in it
    pub fn remove_role(&mut self, role_id: &str) -> Option<Role> {
        let role = self.roles.remove(role_id)?;
        self.remove_entity_memberships(&Owner::role(role_id));
        self.remove_all_members(RelationType::Role, role_id);
        self.version += 1;
        Some(role)
    }

    pub fn remove_group(&mut self, group_id: &str) -> Option<Group> {
        let group = self.groups.remove(group_id)?;
        self.remove_entity_memberships(&Owner::group(group_id));
        self.remove_all_members(RelationType::Group, group_id);
        self.version += 1;
        Some(group)
    }

    pub fn remove_mapping_rule(&mut self, mapping_rule_id: &str) -> Option<MappingRule> {
        let mapping_rule = self.mapping_rules.remove(mapping_rule_id)?;
        self.remove_entity_memberships(&Owner::mapping_rule(mapping_rule_id));
        self.version += 1;
        Some(mapping_rule)
    }

    pub fn remove_tenant(&mut self, tenant_id: &str) -> Option<Tenant> {
        let tenant = self.tenants.remove(tenant_id)?;
        self.remove_all_members(RelationType::Tenant, tenant_id);
        self.version += 1;
        Some(tenant)
    }

    // ==================== Relations ====================

    /// Add `entity` to a role, group or tenant. Returns false if it was
    /// already a member.
    pub fn insert_relation(&mut self, entity: &Owner, relation: RelationType, id: &str) -> bool {
        let inserted = self
            .memberships
            .entry(entity.clone())
            .or_default()
            .entry(relation)
            .or_default()
            .insert(id.to_string());
        if inserted {
            self.members
                .entry((relation, id.to_string()))
                .or_default()
                .insert(entity.clone());
            self.version += 1;
        }
        inserted
    }

    /// Returns false if `entity` was not a member
    pub fn delete_relation(&mut self, entity: &Owner, relation: RelationType, id: &str) -> bool {
        let removed = self
            .memberships
            .get_mut(entity)
            .and_then(|relations| relations.get_mut(&relation))
            .map(|ids| ids.remove(id))
            .unwrap_or(false);
        if !removed {
            return false;
        }

        self.prune_entity(entity, relation);
        let key = (relation, id.to_string());
        if let Some(members) = self.members.get_mut(&key) {
            members.remove(entity);
            if members.is_empty() {
                self.members.remove(&key);
            }
        }
        self.version += 1;
        true
    }

    pub fn has_relation(&self, entity: &Owner, relation: RelationType, id: &str) -> bool {
        self.memberships
            .get(entity)
            .and_then(|relations| relations.get(&relation))
            .map(|ids| ids.contains(id))
            .unwrap_or(false)
    }

    /// Container ids `entity` belongs to for one relation
    pub fn memberships(&self, entity: &Owner, relation: RelationType) -> BTreeSet<String> {
        self.memberships
            .get(entity)
            .and_then(|relations| relations.get(&relation))
            .cloned()
            .unwrap_or_default()
    }

    /// Entities that are members of a role, group or tenant
    pub fn members(&self, relation: RelationType, id: &str) -> BTreeSet<Owner> {
        self.members
            .get(&(relation, id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Every `(entity, relation, container id)` triple, ordered
    pub fn relations(&self) -> Vec<(Owner, RelationType, String)> {
        self.memberships
            .iter()
            .flat_map(|(entity, relations)| {
                relations.iter().flat_map(move |(relation, ids)| {
                    ids.iter().map(move |id| (entity.clone(), *relation, id.clone()))
                })
            })
            .collect()
    }

    fn remove_entity_memberships(&mut self, entity: &Owner) {
        let Some(relations) = self.memberships.remove(entity) else {
            return;
        };
        for (relation, ids) in relations {
            for id in ids {
                let key = (relation, id);
                if let Some(members) = self.members.get_mut(&key) {
                    members.remove(entity);
                    if members.is_empty() {
                        self.members.remove(&key);
                    }
                }
            }
        }
    }

    fn remove_all_members(&mut self, relation: RelationType, id: &str) {
        let Some(members) = self.members.remove(&(relation, id.to_string())) else {
            return;
        };
        for member in members {
            if let Some(ids) = self
                .memberships
                .get_mut(&member)
                .and_then(|relations| relations.get_mut(&relation))
            {
                ids.remove(id);
            }
            self.prune_entity(&member, relation);
        }
    }

    fn prune_entity(&mut self, entity: &Owner, relation: RelationType) {
        if let Some(relations) = self.memberships.get_mut(entity) {
            if relations.get(&relation).map(|ids| ids.is_empty()).unwrap_or(false) {
                relations.remove(&relation);
            }
            if relations.is_empty() {
                self.memberships.remove(entity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: &str) -> Role {
        Role {
            role_key: 1,
            role_id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn test_insert_relation_is_idempotent() {
        let mut index = MembershipIndex::new();
        let user = Owner::user("foo");

        assert!(index.insert_relation(&user, RelationType::Role, "admin"));
        assert!(!index.insert_relation(&user, RelationType::Role, "admin"));
        assert!(index.has_relation(&user, RelationType::Role, "admin"));
        assert_eq!(index.members(RelationType::Role, "admin"), BTreeSet::from([user]));
    }

    #[test]
    fn test_delete_relation_prunes_both_directions() {
        let mut index = MembershipIndex::new();
        let user = Owner::user("foo");
        index.insert_relation(&user, RelationType::Group, "ops");

        assert!(index.delete_relation(&user, RelationType::Group, "ops"));
        assert!(!index.delete_relation(&user, RelationType::Group, "ops"));
        assert!(index.memberships(&user, RelationType::Group).is_empty());
        assert!(index.members(RelationType::Group, "ops").is_empty());
        assert!(index.relations().is_empty());
    }

    #[test]
    fn test_remove_role_drops_memberships() {
        let mut index = MembershipIndex::new();
        index.put_role(role("admin"));
        let user = Owner::user("foo");
        let admin = Owner::role("admin");
        index.insert_relation(&user, RelationType::Role, "admin");
        index.insert_relation(&admin, RelationType::Tenant, "t1");

        assert!(index.remove_role("admin").is_some());
        assert!(index.memberships(&user, RelationType::Role).is_empty());
        assert!(index.members(RelationType::Tenant, "t1").is_empty());
        assert!(index.role("admin").is_none());
    }

    #[test]
    fn test_owner_exists() {
        let mut index = MembershipIndex::new();
        index.put_role(role("admin"));

        assert!(index.owner_exists(&Owner::role("admin")));
        assert!(!index.owner_exists(&Owner::role("other")));
        assert!(!index.owner_exists(&Owner::user("foo")));
        assert!(index.owner_exists(&Owner::new(OwnerType::Client, "any")));
    }

    #[test]
    fn test_version_advances_only_on_change() {
        let mut index = MembershipIndex::new();
        let user = Owner::user("foo");
        index.insert_relation(&user, RelationType::Tenant, "t1");
        let version = index.version();

        index.insert_relation(&user, RelationType::Tenant, "t1");
        assert_eq!(index.version(), version);

        index.delete_relation(&user, RelationType::Tenant, "t1");
        assert!(index.version() > version);
    }
}
