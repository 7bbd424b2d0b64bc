//! Permission grants indexed by owner

use crate::scope::{AuthorizationScope, ResourceMatcher};
use crate::types::{Owner, OwnerType, PermissionType, ResourceType};
use keystone_core::Key;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One authorization: a set of permissions an owner holds on one scope of a
/// resource type. Unique per `(owner, resource_type, resource_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub authorization_key: Key,
    pub owner_id: String,
    pub owner_type: OwnerType,
    pub resource_type: ResourceType,
    pub resource_matcher: ResourceMatcher,
    pub resource_id: String,
    pub permission_types: BTreeSet<PermissionType>,
}

impl AuthorizationRecord {
    pub fn owner(&self) -> Owner {
        Owner::new(self.owner_type, self.owner_id.clone())
    }

    pub fn scope(&self) -> AuthorizationScope {
        AuthorizationScope {
            matcher: self.resource_matcher,
            resource_id: self.resource_id.clone(),
        }
    }
}

type IdentityKey = (Owner, ResourceType, String);

/// Authorization records with owner and identity indices
#[derive(Debug, Default)]
pub struct PermissionStore {
    records: BTreeMap<Key, AuthorizationRecord>,
    by_owner: HashMap<Owner, BTreeSet<Key>>,
    by_identity: HashMap<IdentityKey, Key>,
    version: u64,
}

impl PermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in key order
    pub fn iter(&self) -> impl Iterator<Item = &AuthorizationRecord> {
        self.records.values()
    }

    pub fn get(&self, key: Key) -> Option<&AuthorizationRecord> {
        self.records.get(&key)
    }

    /// The record for an owner on one resource id, if any
    pub fn find(
        &self,
        owner: &Owner,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Option<&AuthorizationRecord> {
        self.by_identity
            .get(&(owner.clone(), resource_type, resource_id.to_string()))
            .and_then(|key| self.records.get(key))
    }

    /// Records owned directly by `owner`
    pub fn records_for_owner(&self, owner: &Owner) -> Vec<&AuthorizationRecord> {
        self.by_owner
            .get(owner)
            .map(|keys| keys.iter().filter_map(|key| self.records.get(key)).collect())
            .unwrap_or_default()
    }

    /// Scopes for which `owner` directly holds `permission_type`
    pub fn direct_scopes(
        &self,
        owner: &Owner,
        resource_type: ResourceType,
        permission_type: PermissionType,
    ) -> BTreeSet<AuthorizationScope> {
        self.records_for_owner(owner)
            .into_iter()
            .filter(|record| {
                record.resource_type == resource_type
                    && record.permission_types.contains(&permission_type)
            })
            .map(AuthorizationRecord::scope)
            .collect()
    }

    /// Insert or replace a record by key
    pub fn put(&mut self, record: AuthorizationRecord) {
        if let Some(previous) = self.records.get(&record.authorization_key).cloned() {
            self.unindex(&previous);
        }
        self.index(&record);
        self.records.insert(record.authorization_key, record);
        self.version += 1;
    }

    pub fn remove(&mut self, key: Key) -> Option<AuthorizationRecord> {
        let record = self.records.remove(&key)?;
        self.unindex(&record);
        self.version += 1;
        Some(record)
    }

    /// Grant `permission_type` on `resource_id`, creating the record under
    /// `new_key` when the owner has none for that resource id yet.
    /// Returns the key of the record holding the grant.
    pub fn add_permission(
        &mut self,
        owner: &Owner,
        resource_type: ResourceType,
        permission_type: PermissionType,
        resource_id: &str,
        new_key: Key,
    ) -> Key {
        let identity = (owner.clone(), resource_type, resource_id.to_string());
        if let Some(key) = self.by_identity.get(&identity).copied() {
            if let Some(record) = self.records.get_mut(&key) {
                record.permission_types.insert(permission_type);
                self.version += 1;
                return key;
            }
        }

        let scope = AuthorizationScope::of(resource_id);
        self.put(AuthorizationRecord {
            authorization_key: new_key,
            owner_id: owner.owner_id.clone(),
            owner_type: owner.owner_type,
            resource_type,
            resource_matcher: scope.matcher,
            resource_id: scope.resource_id,
            permission_types: BTreeSet::from([permission_type]),
        });
        new_key
    }

    /// Revoke a direct grant, deleting the record once it holds no
    /// permissions. Returns whether the grant existed.
    pub fn remove_permission(
        &mut self,
        owner: &Owner,
        resource_type: ResourceType,
        permission_type: PermissionType,
        resource_id: &str,
    ) -> bool {
        let identity = (owner.clone(), resource_type, resource_id.to_string());
        let Some(key) = self.by_identity.get(&identity).copied() else {
            return false;
        };
        let Some(record) = self.records.get_mut(&key) else {
            return false;
        };
        if !record.permission_types.remove(&permission_type) {
            return false;
        }
        let now_empty = record.permission_types.is_empty();
        self.version += 1;
        if now_empty {
            self.remove(key);
        }
        true
    }

    /// Delete every record owned by `owner`
    pub fn remove_owner(&mut self, owner: &Owner) -> Vec<Key> {
        let keys: Vec<Key> = self
            .by_owner
            .get(owner)
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default();
        for key in &keys {
            self.remove(*key);
        }
        keys
    }

    fn index(&mut self, record: &AuthorizationRecord) {
        let owner = record.owner();
        self.by_identity.insert(
            (owner.clone(), record.resource_type, record.resource_id.clone()),
            record.authorization_key,
        );
        self.by_owner
            .entry(owner)
            .or_default()
            .insert(record.authorization_key);
    }

    fn unindex(&mut self, record: &AuthorizationRecord) {
        let owner = record.owner();
        self.by_identity
            .remove(&(owner.clone(), record.resource_type, record.resource_id.clone()));
        if let Some(keys) = self.by_owner.get_mut(&owner) {
            keys.remove(&record.authorization_key);
            if keys.is_empty() {
                self.by_owner.remove(&owner);
            }
        }
    }
}
