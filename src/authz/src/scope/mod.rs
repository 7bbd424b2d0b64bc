//! Authorization scopes
//!
//! A scope is the resource-id half of a permission: either a single
//! resource id or the wildcard that covers every id of the resource type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The resource id stored for wildcard grants
pub const WILDCARD: &str = "*";

/// How an authorization selects resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceMatcher {
    /// Every resource of the type
    Any,
    /// The resource with the given id
    Id,
}

/// Resource selector of a single authorization
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuthorizationScope {
    pub matcher: ResourceMatcher,
    pub resource_id: String,
}

impl AuthorizationScope {
    /// Scope covering every resource id
    pub fn wildcard() -> Self {
        Self {
            matcher: ResourceMatcher::Any,
            resource_id: WILDCARD.to_string(),
        }
    }

    /// Scope covering exactly `resource_id`
    pub fn id(resource_id: impl Into<String>) -> Self {
        Self {
            matcher: ResourceMatcher::Id,
            resource_id: resource_id.into(),
        }
    }

    /// Parse a raw resource id, treating `*` as the wildcard
    pub fn of(resource_id: impl Into<String>) -> Self {
        let resource_id = resource_id.into();
        if resource_id == WILDCARD {
            Self::wildcard()
        } else {
            Self::id(resource_id)
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.matcher == ResourceMatcher::Any
    }

    /// Whether this scope authorizes `resource_id`
    pub fn covers(&self, resource_id: &str) -> bool {
        self.is_wildcard() || self.resource_id == resource_id
    }
}

impl fmt::Display for AuthorizationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_id)
    }
}
