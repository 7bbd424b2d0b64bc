//! Convergence and ordering of distributed identity commands

use keystone_authz::{Owner, PermissionType, Principal, RejectionType, ResourceType};
use keystone_distribution::{DistributionIntent, DistributionMessage, RedistributionConfig};
use keystone_engine::{
    Cluster, Command, CommandOutcome, EngineConfig, EntityValue, Intent, PermissionsValue,
    RoleValue, UserValue, ValueType,
};
use proptest::prelude::*;
use std::time::Duration;

fn config() -> EngineConfig {
    EngineConfig::default().with_distribution(RedistributionConfig {
        scan_interval_ms: 10,
        initial_retry_delay_ms: 100,
        max_retry_delay_ms: 400,
    })
}

fn cluster(partitions: u32) -> Cluster {
    Cluster::new(partitions, config()).unwrap()
}

fn accept(cluster: &mut Cluster, command: Command) -> CommandOutcome {
    let outcome = cluster
        .submit_to_coordinator(command, &Principal::internal())
        .unwrap();
    assert!(outcome.is_accepted(), "rejected: {:?}", outcome.rejection());
    outcome
}

fn applied(cluster: &Cluster, partition: u32) -> Vec<Command> {
    cluster
        .partition(partition)
        .unwrap()
        .log()
        .applied_commands()
        .into_iter()
        .cloned()
        .collect()
}

fn distribution_intents(cluster: &Cluster, distribution_key: u64) -> Vec<Intent> {
    cluster
        .coordinator()
        .unwrap()
        .log()
        .distribution(distribution_key)
        .into_iter()
        .map(|record| record.intent)
        .collect()
}

fn is_distribute_to(envelope: &keystone_engine::Envelope, target: u32) -> bool {
    envelope.to == target
        && matches!(envelope.message(), Some(DistributionMessage::Distribute { .. }))
}

// ============================================================================
// Convergence
// ============================================================================

#[test]
fn test_identity_commands_converge_on_every_partition() {
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

    cluster.settle(10).unwrap();

    assert!(cluster.is_idle());
    assert!(cluster.is_converged());
    for partition in cluster.partitions() {
        assert!(partition.state().membership.user("foo").is_some());
        assert_eq!(partition.state().permissions.len(), 1);
    }
}

#[test]
fn test_distribution_lifecycle_is_recorded_on_origin() {
    let mut cluster = cluster(3);

    let outcome = accept(&mut cluster, Command::CreateUser(UserValue::new("foo")));
    let distribution_key = outcome.distribution_key().unwrap();
    cluster.settle(10).unwrap();

    let intents = distribution_intents(&cluster, distribution_key);
    let count = |intent: DistributionIntent| {
        intents
            .iter()
            .filter(|i| **i == Intent::Distribution(intent))
            .count()
    };
    assert_eq!(intents.first(), Some(&Intent::Distribution(DistributionIntent::Started)));
    assert_eq!(intents.last(), Some(&Intent::Distribution(DistributionIntent::Finished)));
    assert_eq!(count(DistributionIntent::Enqueued), 2);
    assert_eq!(count(DistributionIntent::Distributing), 2);
    assert_eq!(count(DistributionIntent::Acknowledged), 2);
    assert_eq!(count(DistributionIntent::Finished), 1);
}

#[test]
fn test_single_partition_finishes_immediately() {
    let mut cluster = cluster(1);

    let outcome = accept(&mut cluster, Command::CreateUser(UserValue::new("foo")));

    assert!(cluster.is_idle());
    assert_eq!(cluster.in_flight(), 0);
    let intents = distribution_intents(&cluster, outcome.distribution_key().unwrap());
    assert_eq!(
        intents,
        vec![
            Intent::Distribution(DistributionIntent::Started),
            Intent::Distribution(DistributionIntent::Finished),
        ]
    );
}

#[test]
fn test_identity_commands_are_only_accepted_by_coordinator() {
    let mut cluster = cluster(3);

    let outcome = cluster
        .submit(2, Command::CreateRole(RoleValue::new("ops", "B")), &Principal::internal())
        .unwrap();

    let rejection = outcome.rejection().unwrap();
    assert_eq!(rejection.rejection_type, RejectionType::InvalidArgument);
    assert_eq!(
        rejection.reason,
        "Expected to process command 'ROLE.CREATE' on partition '2', but identity commands are only accepted by the coordinator partition '1'"
    );
    assert_eq!(cluster.in_flight(), 0);
    assert!(cluster.partition(2).unwrap().state().membership.role("ops").is_none());
    assert_eq!(cluster.partition(2).unwrap().log().rejections().len(), 1);
}

#[test]
fn test_conflicting_creates_resolve_on_coordinator() {
    let mut cluster = cluster(3);

    let first = cluster
        .submit(1, Command::CreateRole(RoleValue::new("ops", "A")), &Principal::internal())
        .unwrap();
    let second = cluster
        .submit(2, Command::CreateRole(RoleValue::new("ops", "B")), &Principal::internal())
        .unwrap();
    let retried = cluster
        .submit_to_coordinator(Command::CreateRole(RoleValue::new("ops", "B")), &Principal::internal())
        .unwrap();
    cluster.settle(10).unwrap();

    assert!(first.is_accepted());
    assert!(!second.is_accepted());
    assert_eq!(
        retried.rejection().map(|r| r.rejection_type),
        Some(RejectionType::AlreadyExists)
    );
    assert!(cluster.is_converged());
    for partition in cluster.partitions() {
        let role = partition.state().membership.role("ops").unwrap();
        assert_eq!(role.name, "A");
        assert_eq!(Some(role.role_key), first.key());
    }
}

// ============================================================================
// Ordering under redistribution
// ============================================================================

#[test]
fn test_lost_distribution_blocks_its_successors() {
    let mut cluster = cluster(3);
    let mut dropped = false;
    cluster.intercept(move |envelope| {
        if !dropped && is_distribute_to(envelope, 2) {
            dropped = true;
            return true;
        }
        false
    });

    accept(&mut cluster, Command::CreateRole(RoleValue::new("ops", "Operations")));
    accept(&mut cluster, Command::CreateUser(UserValue::new("foo")));
    accept(
        &mut cluster,
        Command::AddRoleEntity(EntityValue::new("ops", Owner::user("foo"))),
    );
    cluster.pump().unwrap();

    // partition 3 got everything, partition 2 waits for the lost head
    assert!(applied(&cluster, 2).is_empty());
    assert_eq!(applied(&cluster, 3), applied(&cluster, 1));

    cluster.settle(10).unwrap();

    assert_eq!(applied(&cluster, 2), applied(&cluster, 1));
    assert!(cluster.is_converged());
}

#[test]
fn test_lost_acknowledgment_does_not_reapply() {
    let mut cluster = cluster(3);
    let mut dropped = false;
    cluster.intercept(move |envelope| {
        if !dropped && envelope.is_acknowledge() && envelope.from == 2 {
            dropped = true;
            return true;
        }
        false
    });

    let outcome = accept(&mut cluster, Command::CreateUser(UserValue::new("foo")));
    cluster.pump().unwrap();
    assert!(!cluster.is_idle());

    cluster.settle(10).unwrap();

    let target = cluster.partition(2).unwrap();
    assert_eq!(target.log().events(ValueType::User, Intent::Created).len(), 1);
    assert_eq!(target.metrics().duplicates_received.get(), 1);
    let intents = distribution_intents(&cluster, outcome.distribution_key().unwrap());
    assert_eq!(intents.last(), Some(&Intent::Distribution(DistributionIntent::Finished)));
}

#[test]
fn test_nothing_is_resent_before_the_retry_delay() {
    let mut cluster = cluster(2);
    cluster.intercept(|envelope| !envelope.is_acknowledge());

    accept(&mut cluster, Command::CreateUser(UserValue::new("foo")));
    cluster.pump().unwrap();

    cluster.advance_clock(Duration::from_millis(50));
    assert_eq!(cluster.redistribute().unwrap(), 0);

    cluster.advance_clock(Duration::from_millis(50));
    assert_eq!(cluster.redistribute().unwrap(), 1);
}

#[test]
fn test_unsettled_cluster_reports_error() {
    let mut cluster = cluster(2);
    cluster.intercept(|_| true);

    accept(&mut cluster, Command::CreateUser(UserValue::new("foo")));

    assert!(cluster.settle(3).is_err());
    assert!(!cluster.is_converged());

    cluster.clear_interceptor();
    cluster.settle(3).unwrap();
    assert!(cluster.is_converged());
}

// ============================================================================
// Property: exactly-once in-order application under message loss
// ============================================================================

fn identity_command() -> impl Strategy<Value = Command> {
    let user = prop::sample::select(vec!["u1", "u2", "u3"]);
    let role = prop::sample::select(vec!["r1", "r2"]);
    prop_oneof![
        user.clone().prop_map(|u| Command::CreateUser(UserValue::new(u))),
        user.clone().prop_map(|u| Command::DeleteUser(UserValue::new(u))),
        role.clone().prop_map(|r| Command::CreateRole(RoleValue::new(r, r))),
        role.clone().prop_map(|r| Command::DeleteRole(RoleValue::new(r, r))),
        (role.clone(), user.clone()).prop_map(|(r, u)| {
            Command::AddRoleEntity(EntityValue::new(r, Owner::user(u)))
        }),
        (role.clone(), user.clone()).prop_map(|(r, u)| {
            Command::RemoveRoleEntity(EntityValue::new(r, Owner::user(u)))
        }),
        (user.clone(), any::<bool>()).prop_map(|(u, add)| {
            let value = PermissionsValue::new(Owner::user(u), ResourceType::Deployment)
                .with_permission(PermissionType::Create, ["*"]);
            if add {
                Command::AddPermission(value)
            } else {
                Command::RemovePermission(value)
            }
        }),
    ]
}

proptest! {
    #[test]
    fn prop_partitions_apply_in_origin_order(
        commands in prop::collection::vec(identity_command(), 1..20),
        drops in prop::collection::vec(any::<bool>(), 0..64),
    ) {
        let mut cluster = cluster(3);
        let mut drops = drops.into_iter();
        cluster.intercept(move |_| drops.next().unwrap_or(false));

        for command in commands {
            // rejections are fine, only accepted commands are distributed
            cluster
                .submit_to_coordinator(command, &Principal::internal())
                .unwrap();
            cluster.pump().unwrap();
        }
        cluster.settle(200).unwrap();

        let expected = applied(&cluster, 1);
        prop_assert_eq!(&applied(&cluster, 2), &expected);
        prop_assert_eq!(&applied(&cluster, 3), &expected);
        prop_assert!(cluster.is_converged());
    }
}
