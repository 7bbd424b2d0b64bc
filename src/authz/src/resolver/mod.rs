//! Authorization resolution
//!
//! Evaluates permission checks against a partition's [`IdentityState`].
//! The principal's owner closure is computed by walking the membership
//! graph:
//!
//! ```text
//! USER/CLIENT ──► GROUP ──► ROLE
//!     │                       ▲
//!     └──────────────────────┘
//! token claims ──► MAPPING_RULE ──► GROUP / ROLE
//! group claims ──► GROUP
//! ```
//!
//! Grants of every owner in the closure are then unioned per resource type
//! and permission type. Tenant membership is resolved over the same closure.

pub mod cache;
pub mod request;

pub use cache::{CacheStats, OwnerCache};
pub use request::{AuthorizationRequest, AuthorizedTenants};

use crate::claims;
use crate::config::SecurityConfig;
use crate::error::{Rejection, RejectionType};
use crate::principal::Principal;
use crate::scope::{AuthorizationScope, WILDCARD};
use crate::state::IdentityState;
use crate::store::RelationType;
use crate::types::{format_set, Owner, OwnerType, PermissionType, ResourceType};

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Outcome of a permission check
pub type AuthorizationResult = std::result::Result<(), Rejection>;

/// Reason used when `is_any_authorized` receives nothing to check
pub const NO_REQUESTS_MESSAGE: &str = "No authorization requests provided";

/// Permission evaluator for one partition
pub struct AuthorizationResolver {
    config: SecurityConfig,
    cache: Option<OwnerCache>,
}

impl AuthorizationResolver {
    pub fn new(config: SecurityConfig) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| OwnerCache::new(config.cache.clone()));

        debug!(
            authorizations = config.authorizations.enabled,
            multi_tenancy = config.multi_tenancy.checks_enabled,
            cache = config.cache.enabled,
            "AuthorizationResolver initialized"
        );

        Self { config, cache }
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(OwnerCache::stats)
    }

    /// Check one permission, then the tenant if the request carries one
    pub fn is_authorized(
        &self,
        state: &IdentityState,
        request: &AuthorizationRequest<'_>,
    ) -> AuthorizationResult {
        let authorizations_enabled = self.config.authorizations.enabled;
        let multi_tenancy_enabled = self.config.multi_tenancy.checks_enabled;

        if !authorizations_enabled && !multi_tenancy_enabled {
            return Ok(());
        }

        if request.principal.is_anonymous() {
            return Ok(());
        }

        let owners = self.owner_closure(state, request.principal);

        if authorizations_enabled {
            self.check_permission(state, &owners, request)?;
        }

        if multi_tenancy_enabled && request.is_tenant_owned_resource {
            if let Some(tenant_id) = &request.tenant_id {
                let tenants = Self::tenants_of(state, &owners);
                if !tenants.contains(tenant_id) {
                    return Err(Self::tenant_rejection(request, tenant_id));
                }
            }
        }

        Ok(())
    }

    /// Engine-issued commands pass unconditionally
    pub fn is_authorized_or_internal(
        &self,
        state: &IdentityState,
        request: &AuthorizationRequest<'_>,
    ) -> AuthorizationResult {
        if request.principal.internal {
            return Ok(());
        }
        self.is_authorized(state, request)
    }

    /// Passes if any request passes. Otherwise the reasons of all failed
    /// requests are joined; the rejection is NOT_FOUND only if every
    /// individual rejection was.
    pub fn is_any_authorized(
        &self,
        state: &IdentityState,
        requests: &[AuthorizationRequest<'_>],
    ) -> AuthorizationResult {
        if requests.is_empty() {
            return Err(Rejection::invalid_argument(NO_REQUESTS_MESSAGE));
        }

        let mut rejections = Vec::with_capacity(requests.len());
        for request in requests {
            match self.is_authorized_or_internal(state, request) {
                Ok(()) => return Ok(()),
                Err(rejection) => rejections.push(rejection),
            }
        }

        let rejection_type = if rejections
            .iter()
            .all(|r| r.rejection_type == RejectionType::NotFound)
        {
            RejectionType::NotFound
        } else {
            RejectionType::Forbidden
        };
        let reason = rejections
            .iter()
            .map(|r| r.reason.as_str())
            .collect::<Vec<_>>()
            .join("; and ");

        Err(Rejection::new(rejection_type, reason))
    }

    /// Every scope the principal holds `permission_type` on, inherited
    /// grants included
    pub fn get_all_authorized_scopes(
        &self,
        state: &IdentityState,
        request: &AuthorizationRequest<'_>,
    ) -> BTreeSet<AuthorizationScope> {
        if !self.config.authorizations.enabled
            || request.principal.is_anonymous()
            || request.principal.internal
        {
            return BTreeSet::from([AuthorizationScope::wildcard()]);
        }

        let owners = self.owner_closure(state, request.principal);
        Self::scopes_of(state, &owners, request.resource_type, request.permission_type)
    }

    /// Scopes granted directly to one owner, ignoring memberships
    pub fn get_direct_authorized_scopes(
        &self,
        state: &IdentityState,
        owner_type: OwnerType,
        owner_id: &str,
        resource_type: ResourceType,
        permission_type: PermissionType,
    ) -> BTreeSet<AuthorizationScope> {
        state.permissions.direct_scopes(
            &Owner::new(owner_type, owner_id),
            resource_type,
            permission_type,
        )
    }

    /// Tenants the principal is assigned to, directly or through its groups,
    /// roles and mapping rules
    pub fn get_authorized_tenant_ids(
        &self,
        state: &IdentityState,
        principal: &Principal,
    ) -> AuthorizedTenants {
        if principal.is_anonymous() || principal.internal {
            return AuthorizedTenants::Anonymous;
        }
        if !self.config.multi_tenancy.checks_enabled {
            return AuthorizedTenants::default_tenant();
        }

        let owners = self.owner_closure(state, principal);
        AuthorizedTenants::Authorized(Self::tenants_of(state, &owners))
    }

    /// Every owner whose grants apply to the principal
    pub fn owner_closure(&self, state: &IdentityState, principal: &Principal) -> Arc<BTreeSet<Owner>> {
        let version = state.version();

        if let Some(cache) = &self.cache {
            if let Some(owners) = cache.get(principal, version) {
                return owners;
            }
        }

        let owners = Arc::new(Self::compute_owner_closure(state, principal));
        debug!(owners = owners.len(), version, "Resolved owner closure");

        if let Some(cache) = &self.cache {
            cache.put(principal, version, owners.clone());
        }
        owners
    }

    fn compute_owner_closure(state: &IdentityState, principal: &Principal) -> BTreeSet<Owner> {
        let membership = &state.membership;
        let mut queue = VecDeque::new();

        if let Some(username) = &principal.username {
            queue.push_back(Owner::user(username.clone()));
        }
        if let Some(client_id) = &principal.client_id {
            queue.push_back(Owner::new(OwnerType::Client, client_id.clone()));
        }
        for rule in membership.mapping_rules() {
            if claims::matches(&principal.claims, &rule.claim_name, &rule.claim_value) {
                queue.push_back(Owner::mapping_rule(rule.mapping_rule_id.clone()));
            }
        }
        if let Some(groups) = &principal.group_claims {
            queue.extend(groups.iter().cloned().map(Owner::group));
        }

        let mut owners = BTreeSet::new();
        while let Some(owner) = queue.pop_front() {
            if owners.contains(&owner) {
                continue;
            }
            match owner.owner_type {
                OwnerType::User | OwnerType::Client | OwnerType::MappingRule => {
                    queue.extend(
                        membership
                            .memberships(&owner, RelationType::Group)
                            .into_iter()
                            .map(Owner::group),
                    );
                    queue.extend(
                        membership
                            .memberships(&owner, RelationType::Role)
                            .into_iter()
                            .map(Owner::role),
                    );
                }
                OwnerType::Group => {
                    queue.extend(
                        membership
                            .memberships(&owner, RelationType::Role)
                            .into_iter()
                            .map(Owner::role),
                    );
                }
                OwnerType::Role => {}
            }
            owners.insert(owner);
        }
        owners
    }

    fn check_permission(
        &self,
        state: &IdentityState,
        owners: &BTreeSet<Owner>,
        request: &AuthorizationRequest<'_>,
    ) -> AuthorizationResult {
        let scopes = Self::scopes_of(state, owners, request.resource_type, request.permission_type);

        let authorized = scopes.iter().any(AuthorizationScope::is_wildcard)
            || (!request.resource_ids.is_empty()
                && request
                    .resource_ids
                    .iter()
                    .all(|id| scopes.iter().any(|scope| scope.covers(id))));

        if authorized {
            Ok(())
        } else {
            Err(Rejection::forbidden(Self::forbidden_message(request)))
        }
    }

    fn scopes_of(
        state: &IdentityState,
        owners: &BTreeSet<Owner>,
        resource_type: ResourceType,
        permission_type: PermissionType,
    ) -> BTreeSet<AuthorizationScope> {
        owners
            .iter()
            .flat_map(|owner| {
                state
                    .permissions
                    .direct_scopes(owner, resource_type, permission_type)
            })
            .collect()
    }

    fn tenants_of(state: &IdentityState, owners: &BTreeSet<Owner>) -> BTreeSet<String> {
        owners
            .iter()
            .flat_map(|owner| state.membership.memberships(owner, RelationType::Tenant))
            .collect()
    }

    fn forbidden_message(request: &AuthorizationRequest<'_>) -> String {
        let mut message = format!(
            "Insufficient permissions to perform operation '{}' on resource '{}'",
            request.permission_type, request.resource_type
        );
        if !request.resource_ids.is_empty() {
            let mut required: BTreeSet<&str> =
                request.resource_ids.iter().map(String::as_str).collect();
            required.insert(WILDCARD);
            message.push_str(&format!(
                ", required resource identifiers are one of '{}'",
                format_set(required)
            ));
        }
        message
    }

    fn tenant_rejection(request: &AuthorizationRequest<'_>, tenant_id: &str) -> Rejection {
        if request.is_new_resource {
            Rejection::forbidden(format!(
                "Expected to perform operation '{}' on resource '{}' for tenant '{}', but user is not assigned to this tenant",
                request.permission_type, request.resource_type, tenant_id
            ))
        } else {
            Rejection::not_found(format!(
                "Expected to perform operation '{}' on resource '{}', but no resource was found for tenant '{}'",
                request.permission_type, request.resource_type, tenant_id
            ))
        }
    }
}
