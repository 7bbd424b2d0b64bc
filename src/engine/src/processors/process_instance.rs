//! PROCESS_INSTANCE.CREATE
//!
//! Authorized by PROCESS_DEFINITION:CREATE_PROCESS_INSTANCE on the process
//! id, or by DEPLOYMENT:CREATE on it as the legacy grant. The process
//! definition already exists, so a tenant mismatch reads as NOT_FOUND.

use super::deployment::resolve_tenant;
use super::{ProcessingContext, ProcessingResult, Processed};
use crate::command::{Command, ProcessInstanceValue};
use keystone_authz::{AuthorizationRequest, PermissionType, Rejection, ResourceType};

pub fn create(ctx: &ProcessingContext<'_>, mut value: ProcessInstanceValue) -> ProcessingResult {
    if value.process_id.is_empty() {
        return Err(Rejection::invalid_argument(
            "Expected to create a process instance, but no process id was given",
        ));
    }
    value.tenant_id = resolve_tenant(ctx, "create a process instance", &value.tenant_id)?;

    let requests = [
        (ResourceType::ProcessDefinition, PermissionType::CreateProcessInstance),
        (ResourceType::Deployment, PermissionType::Create),
    ]
    .map(|(resource_type, permission_type)| {
        AuthorizationRequest::new(ctx.principal, resource_type, permission_type)
            .with_resource_id(value.process_id.clone())
            .with_tenant(value.tenant_id.clone())
    });
    ctx.resolver.is_any_authorized(ctx.state, &requests)?;

    let key = ctx.next_key();
    value.process_instance_key = key;
    Ok(Processed {
        key,
        command: Command::CreateProcessInstance(value),
    })
}
