//! DEPLOYMENT.CREATE
//!
//! Only the authorization side of a deployment is handled here: the caller
//! needs DEPLOYMENT:CREATE for every deployed process id, in the target
//! tenant. Deployments are partition-local and not distributed.

use super::{ProcessingContext, ProcessingResult, Processed};
use crate::command::{Command, DeploymentValue};
use keystone_authz::{AuthorizationRequest, PermissionType, Rejection, ResourceType};
use keystone_core::DEFAULT_TENANT_IDENTIFIER;

pub fn create(ctx: &ProcessingContext<'_>, mut value: DeploymentValue) -> ProcessingResult {
    if value.process_ids.is_empty() {
        return Err(Rejection::invalid_argument(
            "Expected to deploy at least one process, but no process ids were given",
        ));
    }
    value.tenant_id = resolve_tenant(ctx, "deploy resources", &value.tenant_id)?;

    let mut request = AuthorizationRequest::new(
        ctx.principal,
        ResourceType::Deployment,
        PermissionType::Create,
    )
    .with_tenant(value.tenant_id.clone())
    .new_resource();
    request.resource_ids = value.process_ids.clone();
    ctx.resolver.is_authorized_or_internal(ctx.state, &request)?;

    let key = ctx.next_key();
    value.deployment_key = key;
    Ok(Processed {
        key,
        command: Command::CreateDeployment(value),
    })
}

/// Fill in the default tenant and refuse other tenants while multi-tenancy
/// is disabled
pub(crate) fn resolve_tenant(
    ctx: &ProcessingContext<'_>,
    action: &str,
    tenant_id: &str,
) -> ProcessingResult<String> {
    if tenant_id.is_empty() {
        return Ok(DEFAULT_TENANT_IDENTIFIER.to_string());
    }
    if !ctx.multi_tenancy_enabled() && tenant_id != DEFAULT_TENANT_IDENTIFIER {
        return Err(Rejection::invalid_argument(format!(
            "Expected to {action} with tenant identifier '{tenant_id}', but multi-tenancy is disabled"
        )));
    }
    Ok(tenant_id.to_string())
}
