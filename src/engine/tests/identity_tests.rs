//! ROLE, GROUP, TENANT, MAPPING_RULE, USER and IDENTITY_SETUP processing

use keystone_authz::{
    Owner, PermissionType, Principal, Rejection, RejectionType, RelationType, ResourceType,
};
use keystone_engine::{
    AuthorizationValue, Cluster, Command, CommandOutcome, EngineConfig, EntityValue, GroupValue,
    IdentitySetupValue, Intent, MappingRuleValue, PermissionsValue, ProcessInstanceValue,
    RoleValue, TenantValue, UserValue, ValueType,
};
use std::collections::BTreeSet;

fn cluster(partitions: u32) -> Cluster {
    Cluster::new(partitions, EngineConfig::default()).unwrap()
}

fn submit(cluster: &mut Cluster, command: Command) -> CommandOutcome {
    cluster
        .submit_to_coordinator(command, &Principal::internal())
        .unwrap()
}

fn accept(cluster: &mut Cluster, command: Command) -> CommandOutcome {
    let outcome = submit(cluster, command);
    assert!(outcome.is_accepted(), "rejected: {:?}", outcome.rejection());
    outcome
}

fn reject(cluster: &mut Cluster, command: Command) -> Rejection {
    submit(cluster, command)
        .rejection()
        .cloned()
        .expect("command should be rejected")
}

// ============================================================================
// ROLE
// ============================================================================

#[test]
fn test_create_role_twice_is_rejected() {
    let mut cluster = cluster(1);
    accept(&mut cluster, Command::CreateRole(RoleValue::new("ops", "Operations")));

    let rejection = reject(&mut cluster, Command::CreateRole(RoleValue::new("ops", "Other")));

    assert_eq!(rejection.rejection_type, RejectionType::AlreadyExists);
    assert_eq!(
        rejection.reason,
        "Expected to create role with ID 'ops', but a role with this ID already exists"
    );
}

#[test]
fn test_update_role_keeps_key() {
    let mut cluster = cluster(1);
    let created = accept(&mut cluster, Command::CreateRole(RoleValue::new("ops", "Operations")));

    let updated = accept(
        &mut cluster,
        Command::UpdateRole(RoleValue::new("ops", "Ops").with_description("on call")),
    );

    assert_eq!(created.key(), updated.key());
    let state = cluster.coordinator().unwrap().state();
    let role = state.membership.role("ops").unwrap();
    assert_eq!(role.name, "Ops");
    assert_eq!(role.description, "on call");
}

#[test]
fn test_update_unknown_role_is_not_found() {
    let mut cluster = cluster(1);

    let rejection = reject(&mut cluster, Command::UpdateRole(RoleValue::new("ops", "Ops")));

    assert_eq!(rejection.rejection_type, RejectionType::NotFound);
    assert_eq!(
        rejection.reason,
        "Expected to update role with ID 'ops', but a role with this ID does not exist"
    );
}

#[test]
fn test_delete_role_cascades_on_every_partition() {
    let mut cluster = cluster(3);
    accept(&mut cluster, Command::CreateUser(UserValue::new("foo")));
    accept(&mut cluster, Command::CreateRole(RoleValue::new("ops", "Operations")));
    accept(
        &mut cluster,
        Command::AddRoleEntity(EntityValue::new("ops", Owner::user("foo"))),
    );
    accept(
        &mut cluster,
        Command::AddPermission(
            PermissionsValue::new(Owner::role("ops"), ResourceType::Deployment)
                .with_permission(PermissionType::Create, ["*"]),
        ),
    );

    accept(&mut cluster, Command::DeleteRole(RoleValue::new("ops", "")));
    cluster.settle(10).unwrap();

    assert!(cluster.is_converged());
    for partition in cluster.partitions() {
        let state = partition.state();
        assert!(state.membership.role("ops").is_none());
        assert!(state
            .membership
            .memberships(&Owner::user("foo"), RelationType::Role)
            .is_empty());
        assert!(state.permissions.is_empty());
    }
}

// ============================================================================
// Membership
// ============================================================================

#[test]
fn test_add_entity_to_unknown_role_is_not_found() {
    let mut cluster = cluster(1);
    accept(&mut cluster, Command::CreateUser(UserValue::new("foo")));

    let rejection = reject(
        &mut cluster,
        Command::AddRoleEntity(EntityValue::new("ops", Owner::user("foo"))),
    );

    assert_eq!(rejection.rejection_type, RejectionType::NotFound);
    assert_eq!(
        rejection.reason,
        "Expected to update role with ID 'ops', but a role with this ID does not exist"
    );
}

#[test]
fn test_add_unknown_entity_is_not_found() {
    let mut cluster = cluster(1);
    accept(&mut cluster, Command::CreateRole(RoleValue::new("ops", "Operations")));

    let rejection = reject(
        &mut cluster,
        Command::AddRoleEntity(EntityValue::new("ops", Owner::user("ghost"))),
    );

    assert_eq!(rejection.rejection_type, RejectionType::NotFound);
    assert_eq!(
        rejection.reason,
        "Expected to add an entity with ID 'ghost' and type 'USER' to role with ID 'ops', but the entity doesn't exist"
    );
}

#[test]
fn test_add_entity_twice_is_rejected_and_remove_twice_is_not_found() {
    let mut cluster = cluster(1);
    accept(&mut cluster, Command::CreateUser(UserValue::new("foo")));
    accept(&mut cluster, Command::CreateGroup(GroupValue::new("team", "Team")));

    let add = Command::AddGroupEntity(EntityValue::new("team", Owner::user("foo")));
    let remove = Command::RemoveGroupEntity(EntityValue::new("team", Owner::user("foo")));

    accept(&mut cluster, add.clone());
    assert_eq!(
        reject(&mut cluster, add).rejection_type,
        RejectionType::AlreadyExists
    );

    accept(&mut cluster, remove.clone());
    let rejection = reject(&mut cluster, remove);
    assert_eq!(rejection.rejection_type, RejectionType::NotFound);
    assert_eq!(
        rejection.reason,
        "Expected to remove entity with ID 'foo' from group with ID 'team', but the entity is not assigned to this group"
    );
}

#[test]
fn test_group_cannot_contain_groups() {
    let mut cluster = cluster(1);
    accept(&mut cluster, Command::CreateGroup(GroupValue::new("outer", "Outer")));
    accept(&mut cluster, Command::CreateGroup(GroupValue::new("inner", "Inner")));

    let rejection = reject(
        &mut cluster,
        Command::AddGroupEntity(EntityValue::new("outer", Owner::group("inner"))),
    );

    assert_eq!(rejection.rejection_type, RejectionType::InvalidArgument);
}

#[test]
fn test_membership_change_requires_update_on_the_container() {
    let mut cluster = cluster(1);
    accept(&mut cluster, Command::CreateUser(UserValue::new("foo")));
    accept(&mut cluster, Command::CreateRole(RoleValue::new("ops", "Operations")));
    accept(
        &mut cluster,
        Command::AddPermission(
            PermissionsValue::new(Owner::user("foo"), ResourceType::Role)
                .with_permission(PermissionType::Update, ["ops"]),
        ),
    );
    accept(&mut cluster, Command::CreateRole(RoleValue::new("admin", "Admin")));

    let allowed = cluster
        .submit_to_coordinator(
            Command::AddRoleEntity(EntityValue::new("ops", Owner::user("foo"))),
            &Principal::user("foo"),
        )
        .unwrap();
    assert!(allowed.is_accepted());

    let denied = cluster
        .submit_to_coordinator(
            Command::AddRoleEntity(EntityValue::new("admin", Owner::user("foo"))),
            &Principal::user("foo"),
        )
        .unwrap();
    let rejection = denied.rejection().unwrap();
    assert_eq!(rejection.rejection_type, RejectionType::Forbidden);
    assert_eq!(
        rejection.reason,
        "Insufficient permissions to perform operation 'UPDATE' on resource 'ROLE', required resource identifiers are one of '[*, admin]'"
    );
}

// ============================================================================
// TENANT
// ============================================================================

#[test]
fn test_tenant_lifecycle() {
    let mut cluster = cluster(2);
    accept(&mut cluster, Command::CreateTenant(TenantValue::new("acme", "Acme")));
    accept(&mut cluster, Command::CreateUser(UserValue::new("foo")));
    accept(
        &mut cluster,
        Command::AddTenantEntity(EntityValue::new("acme", Owner::user("foo"))),
    );
    cluster.settle(10).unwrap();

    let target = cluster.partition(2).unwrap();
    assert_eq!(
        target
            .state()
            .membership
            .memberships(&Owner::user("foo"), RelationType::Tenant),
        BTreeSet::from(["acme".to_string()])
    );

    accept(&mut cluster, Command::DeleteTenant(TenantValue::new("acme", "")));
    cluster.settle(10).unwrap();
    assert!(cluster.is_converged());
    assert!(cluster
        .partition(2)
        .unwrap()
        .state()
        .membership
        .tenant("acme")
        .is_none());
}

#[test]
fn test_default_tenant_cannot_be_deleted() {
    let mut cluster = cluster(1);

    let rejection = reject(&mut cluster, Command::DeleteTenant(TenantValue::new("<default>", "")));

    assert_eq!(rejection.rejection_type, RejectionType::InvalidArgument);
}

#[test]
fn test_tenant_without_id_is_invalid() {
    let mut cluster = cluster(1);

    let rejection = reject(&mut cluster, Command::CreateTenant(TenantValue::new("", "Nameless")));

    assert_eq!(rejection.rejection_type, RejectionType::InvalidArgument);
}

// ============================================================================
// MAPPING_RULE and USER
// ============================================================================

#[test]
fn test_mapping_rule_claim_is_unique() {
    let mut cluster = cluster(1);
    accept(
        &mut cluster,
        Command::CreateMappingRule(MappingRuleValue::new("engineers", "department", "eng")),
    );

    let rejection = reject(
        &mut cluster,
        Command::CreateMappingRule(MappingRuleValue::new("developers", "department", "eng")),
    );

    assert_eq!(rejection.rejection_type, RejectionType::AlreadyExists);
    assert_eq!(
        rejection.reason,
        "Expected to create mapping rule with claimName 'department' and claimValue 'eng', but a mapping rule with this claim already exists"
    );
}

#[test]
fn test_mapping_rule_grants_apply_to_matching_claims() {
    let mut cluster = cluster(1);
    accept(
        &mut cluster,
        Command::CreateMappingRule(MappingRuleValue::new("engineers", "department", "eng")),
    );
    accept(
        &mut cluster,
        Command::AddPermission(
            PermissionsValue::new(Owner::mapping_rule("engineers"), ResourceType::User)
                .with_permission(PermissionType::Create, ["*"]),
        ),
    );

    let engineer = Principal::user("someone").with_claim("department", "eng");
    let outcome = cluster
        .submit_to_coordinator(Command::CreateUser(UserValue::new("foo")), &engineer)
        .unwrap();
    assert!(outcome.is_accepted());

    let outsider = Principal::user("someone").with_claim("department", "sales");
    let outcome = cluster
        .submit_to_coordinator(Command::CreateUser(UserValue::new("bar")), &outsider)
        .unwrap();
    assert_eq!(
        outcome.rejection().unwrap().rejection_type,
        RejectionType::Forbidden
    );
}

#[test]
fn test_delete_user_removes_its_grants_and_memberships() {
    let mut cluster = cluster(1);
    accept(&mut cluster, Command::CreateUser(UserValue::new("foo").with_email("foo@example.com")));
    accept(&mut cluster, Command::CreateGroup(GroupValue::new("team", "Team")));
    accept(
        &mut cluster,
        Command::AddGroupEntity(EntityValue::new("team", Owner::user("foo"))),
    );
    accept(
        &mut cluster,
        Command::CreateAuthorization(AuthorizationValue::new(
            Owner::user("foo"),
            ResourceType::Deployment,
            "*",
            [PermissionType::Create],
        )),
    );

    accept(&mut cluster, Command::DeleteUser(UserValue::new("foo")));

    let state = cluster.coordinator().unwrap().state();
    assert!(state.membership.user("foo").is_none());
    assert!(state.permissions.is_empty());
    assert!(state
        .membership
        .members(RelationType::Group, "team")
        .is_empty());
}

#[test]
fn test_create_user_twice_is_rejected() {
    let mut cluster = cluster(1);
    accept(&mut cluster, Command::CreateUser(UserValue::new("foo")));

    let rejection = reject(&mut cluster, Command::CreateUser(UserValue::new("foo")));

    assert_eq!(
        rejection.reason,
        "Expected to create user with username 'foo', but a user with this username already exists"
    );
}

// ============================================================================
// IDENTITY_SETUP
// ============================================================================

#[test]
fn test_admin_setup_grants_everything() {
    let mut cluster = cluster(3);
    accept(
        &mut cluster,
        Command::InitializeIdentity(
            IdentitySetupValue::admin_role().with_user(UserValue::new("demo")),
        ),
    );
    cluster.settle(10).unwrap();
    assert!(cluster.is_converged());

    let admin = Principal::user("demo");
    for partition in [1, 2, 3] {
        let outcome = cluster
            .submit(
                partition,
                Command::CreateProcessInstance(ProcessInstanceValue::new(format!("p{partition}"))),
                &admin,
            )
            .unwrap();
        assert!(outcome.is_accepted());
    }
    let outcome = cluster
        .submit_to_coordinator(Command::CreateRole(RoleValue::new("r", "R")), &admin)
        .unwrap();
    assert!(outcome.is_accepted());
}

#[test]
fn test_setup_is_idempotent() {
    let mut cluster = cluster(2);
    let setup = IdentitySetupValue::admin_role().with_user(UserValue::new("demo"));

    let first = accept(&mut cluster, Command::InitializeIdentity(setup.clone()));
    let second = accept(&mut cluster, Command::InitializeIdentity(setup));
    cluster.settle(10).unwrap();

    assert_eq!(first.key(), second.key());
    assert!(cluster.is_converged());
    let state = cluster.coordinator().unwrap().state();
    assert_eq!(state.membership.roles().count(), 1);
    assert_eq!(state.membership.users().count(), 1);
    assert_eq!(state.permissions.len(), ResourceType::all().len());
    assert_eq!(
        cluster
            .coordinator()
            .unwrap()
            .log()
            .events(ValueType::IdentitySetup, Intent::Initialized)
            .len(),
        2
    );
}

#[test]
fn test_setup_assigns_existing_user_to_existing_role() {
    let mut cluster = cluster(1);
    accept(&mut cluster, Command::CreateRole(RoleValue::new("admin", "Admin")));
    accept(&mut cluster, Command::CreateUser(UserValue::new("demo")));

    accept(
        &mut cluster,
        Command::InitializeIdentity(
            IdentitySetupValue::admin_role().with_user(UserValue::new("demo")),
        ),
    );

    let state = cluster.coordinator().unwrap().state();
    assert!(state
        .membership
        .has_relation(&Owner::user("demo"), RelationType::Role, "admin"));
}

#[test]
fn test_setup_with_tenant() {
    let mut cluster = cluster(1);

    accept(
        &mut cluster,
        Command::InitializeIdentity(
            IdentitySetupValue::new(RoleValue::new("viewer", "Viewer"))
                .with_user(UserValue::new("demo"))
                .with_tenant(TenantValue::new("acme", "Acme"))
                .with_tenant_member(Owner::user("demo")),
        ),
    );

    let state = cluster.coordinator().unwrap().state();
    assert!(state.membership.tenant("acme").is_some());
    assert!(state
        .membership
        .has_relation(&Owner::user("demo"), RelationType::Tenant, "acme"));
}

#[test]
fn test_setup_rejects_tenant_members_without_tenant() {
    let mut cluster = cluster(1);

    let rejection = reject(
        &mut cluster,
        Command::InitializeIdentity(
            IdentitySetupValue::new(RoleValue::new("viewer", "Viewer"))
                .with_user(UserValue::new("demo"))
                .with_tenant_member(Owner::user("demo")),
        ),
    );

    assert_eq!(rejection.rejection_type, RejectionType::InvalidArgument);
}

#[test]
fn test_setup_rejects_unknown_member() {
    let mut cluster = cluster(1);
    let mut setup = IdentitySetupValue::new(RoleValue::new("viewer", "Viewer"));
    setup.role_members.push(Owner::group("ghosts"));

    let rejection = reject(&mut cluster, Command::InitializeIdentity(setup));

    assert_eq!(rejection.rejection_type, RejectionType::NotFound);
    assert_eq!(
        rejection.reason,
        "Expected to find owner with id: 'ghosts', but none was found"
    );
}
