//! Process-instance authorization across a cluster

use keystone_authz::{Owner, PermissionType, Principal, RejectionType, ResourceType, SecurityConfig};
use keystone_distribution::DistributionIntent;
use keystone_engine::{
    AuthorizationValue, Cluster, Command, CommandOutcome, DeploymentValue, EngineConfig,
    EntityValue, GroupValue, IdentitySetupValue, Intent, PermissionsValue, ProcessInstanceValue,
    TenantValue, UserValue, ValueType,
};

fn accept(cluster: &mut Cluster, command: Command, principal: &Principal) -> CommandOutcome {
    let outcome = cluster.submit_to_coordinator(command, principal).unwrap();
    assert!(outcome.is_accepted(), "rejected: {:?}", outcome.rejection());
    outcome
}

fn finished(cluster: &Cluster, distribution_key: u64) -> bool {
    cluster
        .coordinator()
        .unwrap()
        .log()
        .distribution(distribution_key)
        .iter()
        .any(|record| record.intent == Intent::Distribution(DistributionIntent::Finished))
}

#[test]
fn test_granted_user_starts_process_instances_on_every_partition() {
    let mut cluster = Cluster::new(3, EngineConfig::default()).unwrap();
    let admin = Principal::user("demo");

    // bootstrap
    accept(
        &mut cluster,
        Command::InitializeIdentity(IdentitySetupValue::admin_role().with_user(UserValue::new("demo"))),
        &Principal::internal(),
    );

    // administration as the bootstrapped admin
    accept(&mut cluster, Command::CreateUser(UserValue::new("foo")), &admin);
    let created = accept(
        &mut cluster,
        Command::CreateAuthorization(AuthorizationValue::new(
            Owner::user("foo"),
            ResourceType::Deployment,
            "*",
            [PermissionType::Create],
        )),
        &admin,
    );
    let added = accept(
        &mut cluster,
        Command::AddPermission(
            PermissionsValue::new(Owner::user("foo"), ResourceType::Deployment)
                .with_permission(PermissionType::Read, ["*"]),
        ),
        &admin,
    );
    assert_eq!(created.key(), added.key());

    cluster.settle(10).unwrap();
    assert!(cluster.is_converged());
    assert!(finished(&cluster, created.distribution_key().unwrap()));
    assert!(finished(&cluster, added.distribution_key().unwrap()));

    let foo = Principal::user("foo");
    for partition in cluster.topology().partitions() {
        let log = cluster.partition(partition).unwrap().log();
        assert_eq!(log.events(ValueType::Authorization, Intent::Created).len(), 1);
        assert_eq!(log.events(ValueType::Authorization, Intent::PermissionAdded).len(), 1);

        let outcome = cluster
            .submit(partition, Command::CreateProcessInstance(ProcessInstanceValue::new("p")), &foo)
            .unwrap();
        assert!(outcome.is_accepted(), "partition {partition}: {:?}", outcome.rejection());
    }

    // process instances stay on their partition
    assert_eq!(cluster.in_flight(), 0);
    assert!(cluster.is_idle());
}

#[test]
fn test_user_without_grant_is_forbidden() {
    let mut cluster = Cluster::new(2, EngineConfig::default()).unwrap();
    accept(&mut cluster, Command::CreateUser(UserValue::new("bar")), &Principal::internal());
    cluster.settle(10).unwrap();

    let outcome = cluster
        .submit(
            2,
            Command::CreateProcessInstance(ProcessInstanceValue::new("p")),
            &Principal::user("bar"),
        )
        .unwrap();

    let rejection = outcome.rejection().unwrap();
    assert_eq!(rejection.rejection_type, RejectionType::Forbidden);
    assert_eq!(
        rejection.reason,
        "Insufficient permissions to perform operation 'CREATE_PROCESS_INSTANCE' on resource 'PROCESS_DEFINITION', required resource identifiers are one of '[*, p]'; and Insufficient permissions to perform operation 'CREATE' on resource 'DEPLOYMENT', required resource identifiers are one of '[*, p]'"
    );
}

#[test]
fn test_grant_on_process_id_is_scoped() {
    let mut cluster = Cluster::new(1, EngineConfig::default()).unwrap();
    accept(&mut cluster, Command::CreateUser(UserValue::new("foo")), &Principal::internal());
    accept(
        &mut cluster,
        Command::AddPermission(
            PermissionsValue::new(Owner::user("foo"), ResourceType::ProcessDefinition)
                .with_permission(PermissionType::CreateProcessInstance, ["order"]),
        ),
        &Principal::internal(),
    );

    let foo = Principal::user("foo");
    let order = cluster
        .submit_to_coordinator(Command::CreateProcessInstance(ProcessInstanceValue::new("order")), &foo)
        .unwrap();
    assert!(order.is_accepted());

    let invoice = cluster
        .submit_to_coordinator(Command::CreateProcessInstance(ProcessInstanceValue::new("invoice")), &foo)
        .unwrap();
    assert_eq!(
        invoice.rejection().unwrap().rejection_type,
        RejectionType::Forbidden
    );
}

#[test]
fn test_deployment_needs_grant_on_every_process() {
    let mut cluster = Cluster::new(1, EngineConfig::default()).unwrap();
    accept(&mut cluster, Command::CreateUser(UserValue::new("foo")), &Principal::internal());
    accept(
        &mut cluster,
        Command::AddPermission(
            PermissionsValue::new(Owner::user("foo"), ResourceType::Deployment)
                .with_permission(PermissionType::Create, ["order"]),
        ),
        &Principal::internal(),
    );

    let foo = Principal::user("foo");
    let single = cluster
        .submit_to_coordinator(Command::CreateDeployment(DeploymentValue::new(["order"])), &foo)
        .unwrap();
    assert!(single.is_accepted());
    assert_eq!(single.distribution_key(), None);

    let both = cluster
        .submit_to_coordinator(
            Command::CreateDeployment(DeploymentValue::new(["order", "invoice"])),
            &foo,
        )
        .unwrap();
    assert!(!both.is_accepted());
}

// ============================================================================
// Tenant scoping
// ============================================================================

fn multi_tenant_cluster() -> Cluster {
    let config = EngineConfig::default()
        .with_security(SecurityConfig::enabled().with_multi_tenancy(true));
    let mut cluster = Cluster::new(2, config).unwrap();
    let internal = Principal::internal();

    accept(&mut cluster, Command::CreateUser(UserValue::new("foo")), &internal);
    accept(&mut cluster, Command::CreateTenant(TenantValue::new("acme", "Acme")), &internal);
    accept(&mut cluster, Command::CreateTenant(TenantValue::new("globex", "Globex")), &internal);
    accept(
        &mut cluster,
        Command::AddTenantEntity(EntityValue::new("acme", Owner::user("foo"))),
        &internal,
    );
    accept(
        &mut cluster,
        Command::AddPermission(
            PermissionsValue::new(Owner::user("foo"), ResourceType::Deployment)
                .with_permission(PermissionType::Create, ["*"]),
        ),
        &internal,
    );
    accept(
        &mut cluster,
        Command::AddPermission(
            PermissionsValue::new(Owner::user("foo"), ResourceType::ProcessDefinition)
                .with_permission(PermissionType::CreateProcessInstance, ["*"]),
        ),
        &internal,
    );
    cluster.settle(10).unwrap();
    cluster
}

fn start(cluster: &mut Cluster, tenant: &str) -> CommandOutcome {
    cluster
        .submit(
            2,
            Command::CreateProcessInstance(ProcessInstanceValue::new("p").with_tenant(tenant)),
            &Principal::user("foo"),
        )
        .unwrap()
}

#[test]
fn test_process_instance_in_assigned_tenant() {
    let mut cluster = multi_tenant_cluster();

    assert!(start(&mut cluster, "acme").is_accepted());
}

#[test]
fn test_process_instance_in_foreign_tenant_is_not_found() {
    let mut cluster = multi_tenant_cluster();

    let outcome = start(&mut cluster, "globex");

    let rejection = outcome.rejection().unwrap();
    assert_eq!(rejection.rejection_type, RejectionType::NotFound);
    assert_eq!(
        rejection.reason,
        "Expected to perform operation 'CREATE_PROCESS_INSTANCE' on resource 'PROCESS_DEFINITION', but no resource was found for tenant 'globex'; and Expected to perform operation 'CREATE' on resource 'DEPLOYMENT', but no resource was found for tenant 'globex'"
    );
}

#[test]
fn test_deployment_to_foreign_tenant_is_forbidden() {
    let mut cluster = multi_tenant_cluster();

    let outcome = cluster
        .submit(
            2,
            Command::CreateDeployment(DeploymentValue::new(["p"]).with_tenant("globex")),
            &Principal::user("foo"),
        )
        .unwrap();

    let rejection = outcome.rejection().unwrap();
    assert_eq!(rejection.rejection_type, RejectionType::Forbidden);
    assert_eq!(
        rejection.reason,
        "Expected to perform operation 'CREATE' on resource 'DEPLOYMENT' for tenant 'globex', but user is not assigned to this tenant"
    );
}

#[test]
fn test_tenant_access_through_group() {
    let mut cluster = multi_tenant_cluster();
    let internal = Principal::internal();
    accept(&mut cluster, Command::CreateGroup(GroupValue::new("partners", "Partners")), &internal);
    accept(
        &mut cluster,
        Command::AddGroupEntity(EntityValue::new("partners", Owner::user("foo"))),
        &internal,
    );
    accept(
        &mut cluster,
        Command::AddTenantEntity(EntityValue::new("globex", Owner::group("partners"))),
        &internal,
    );
    cluster.settle(10).unwrap();

    assert!(start(&mut cluster, "globex").is_accepted());
}

#[test]
fn test_explicit_tenant_rejected_without_multi_tenancy() {
    let mut cluster = Cluster::new(1, EngineConfig::default()).unwrap();

    let outcome = cluster
        .submit_to_coordinator(
            Command::CreateProcessInstance(ProcessInstanceValue::new("p").with_tenant("acme")),
            &Principal::internal(),
        )
        .unwrap();

    let rejection = outcome.rejection().unwrap();
    assert_eq!(rejection.rejection_type, RejectionType::InvalidArgument);
    assert_eq!(
        rejection.reason,
        "Expected to create a process instance with tenant identifier 'acme', but multi-tenancy is disabled"
    );
}
