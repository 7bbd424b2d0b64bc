//! MAPPING_RULE commands
//!
//! A claim `(claim_name, claim_value)` may be mapped by at most one rule.

use super::{already_exists, not_found, ProcessingContext, ProcessingResult, Processed};
use crate::command::{Command, MappingRuleValue};
use keystone_authz::{PermissionType, Rejection, ResourceType};

pub fn create(ctx: &ProcessingContext<'_>, mut value: MappingRuleValue) -> ProcessingResult {
    ctx.authorize(ResourceType::MappingRule, PermissionType::Create, None)?;

    if ctx
        .state
        .membership
        .mapping_rule(&value.mapping_rule_id)
        .is_some()
    {
        return Err(already_exists("mapping rule", "ID", &value.mapping_rule_id));
    }
    check_claim_unused("create", ctx, &value)?;

    let key = ctx.next_key();
    value.mapping_rule_key = key;
    Ok(Processed {
        key,
        command: Command::CreateMappingRule(value),
    })
}

pub fn update(ctx: &ProcessingContext<'_>, mut value: MappingRuleValue) -> ProcessingResult {
    ctx.authorize(
        ResourceType::MappingRule,
        PermissionType::Update,
        Some(&value.mapping_rule_id),
    )?;

    let existing = ctx
        .state
        .membership
        .mapping_rule(&value.mapping_rule_id)
        .ok_or_else(|| not_found("update", "mapping rule", "ID", &value.mapping_rule_id))?;
    check_claim_unused("update", ctx, &value)?;

    value.mapping_rule_key = existing.mapping_rule_key;
    Ok(Processed {
        key: existing.mapping_rule_key,
        command: Command::UpdateMappingRule(value),
    })
}

pub fn delete(ctx: &ProcessingContext<'_>, value: MappingRuleValue) -> ProcessingResult {
    ctx.authorize(
        ResourceType::MappingRule,
        PermissionType::Delete,
        Some(&value.mapping_rule_id),
    )?;

    let existing = ctx
        .state
        .membership
        .mapping_rule(&value.mapping_rule_id)
        .ok_or_else(|| not_found("delete", "mapping rule", "ID", &value.mapping_rule_id))?;

    Ok(Processed {
        key: existing.mapping_rule_key,
        command: Command::DeleteMappingRule(MappingRuleValue {
            mapping_rule_key: existing.mapping_rule_key,
            mapping_rule_id: existing.mapping_rule_id.clone(),
            name: existing.name.clone(),
            claim_name: existing.claim_name.clone(),
            claim_value: existing.claim_value.clone(),
        }),
    })
}

fn check_claim_unused(
    action: &str,
    ctx: &ProcessingContext<'_>,
    value: &MappingRuleValue,
) -> ProcessingResult<()> {
    let taken = ctx.state.membership.mapping_rules().any(|rule| {
        rule.mapping_rule_id != value.mapping_rule_id
            && rule.claim_name == value.claim_name
            && rule.claim_value == value.claim_value
    });
    if taken {
        return Err(Rejection::already_exists(format!(
            "Expected to {action} mapping rule with claimName '{}' and claimValue '{}', but a mapping rule with this claim already exists",
            value.claim_name, value.claim_value
        )));
    }
    Ok(())
}
