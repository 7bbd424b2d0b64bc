//! Authorization resolver benchmarks
//!
//! Measures permission checks through a role/group hierarchy with and
//! without the owner closure cache.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use keystone_authz::{
    AuthorizationRequest, AuthorizationResolver, IdentityState, Owner, PermissionType, Principal,
    RelationType, ResourceType, SecurityConfig,
};

fn build_state(groups: usize) -> IdentityState {
    let mut state = IdentityState::new();
    let user = Owner::user("bench");
    for i in 0..groups {
        let group_id = format!("group-{}", i);
        let role_id = format!("role-{}", i);
        state
            .membership
            .insert_relation(&user, RelationType::Group, &group_id);
        state
            .membership
            .insert_relation(&Owner::group(group_id), RelationType::Role, &role_id);
        state.permissions.add_permission(
            &Owner::role(role_id),
            ResourceType::Deployment,
            PermissionType::Create,
            &format!("process-{}", i),
            i as u64 + 1,
        );
    }
    state
}

fn bench_is_authorized(c: &mut Criterion) {
    let mut group = c.benchmark_group("is_authorized");

    for groups in [1usize, 10, 100] {
        let state = build_state(groups);
        let principal = Principal::user("bench");
        let target = format!("process-{}", groups - 1);

        for cached in [true, false] {
            let mut config = SecurityConfig::enabled();
            config.cache.enabled = cached;
            let resolver = AuthorizationResolver::new(config);
            let label = if cached { "cached" } else { "uncached" };

            group.bench_with_input(BenchmarkId::new(label, groups), &groups, |b, _| {
                b.iter(|| {
                    let request = AuthorizationRequest::new(
                        &principal,
                        ResourceType::Deployment,
                        PermissionType::Create,
                    )
                    .with_resource_id(target.clone());
                    black_box(resolver.is_authorized(&state, &request))
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_is_authorized);
criterion_main!(benches);
