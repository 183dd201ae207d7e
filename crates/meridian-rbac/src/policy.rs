//! Ties role template expansion, deny-first evaluation, allow matching,
//! and option-combination together into `evaluate()`. A principal's
//! `EffectivePolicy` is the union of every role's allow rules (minus any
//! matching deny rule) plus the most restrictive combination of every
//! role's options.

use crate::expr::{EvalContext, Expr};
use crate::labels::matches_label_map;
use meridian_core::model::{LabelMatcher, RoleOptions, RoleSpec, RuleSet, Traits};
use std::collections::BTreeMap;

pub struct AuthContext<'a> {
    pub traits: &'a Traits,
    pub resource_kind: &'a str,
    pub resource_labels: &'a BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct EffectivePolicy {
    pub options: RoleOptions,
    allow: Vec<RuleSet>,
    deny: Vec<RuleSet>,
}

impl EffectivePolicy {
    /// Folds a principal's assigned roles into one effective policy.
    /// Per-rule-set predicate/label expansion happens lazily at
    /// `evaluate()` time, since it depends on the resource being checked.
    pub fn from_roles(roles: &[RoleSpec]) -> Self {
        let mut iter = roles.iter();
        let first = iter.next();
        let mut options = first.map(|r| r.options.clone()).unwrap_or(RoleOptions {
            max_session_ttl: chrono::Duration::zero(),
            require_mfa: false,
            port_forwarding: false,
            record_session: false,
            lock_mode: meridian_core::model::LockMode::BestEffort,
            pin_source_ip: false,
        });
        let mut allow = first.map(|r| r.allow.clone()).unwrap_or_default();
        let mut deny = first.map(|r| r.deny.clone()).unwrap_or_default();

        for role in iter {
            options = options.combine(&role.options);
            allow.extend(role.allow.clone());
            deny.extend(role.deny.clone());
        }

        Self { options, allow, deny }
    }
}

/// Returns true if `ctx` is permitted: no deny rule matches, and at least
/// one allow rule matches. Deny is checked first and wins outright.
pub fn evaluate(policy: &EffectivePolicy, ctx: &AuthContext) -> bool {
    if policy.deny.iter().any(|rs| rule_matches(rs, ctx)) {
        return false;
    }
    policy.allow.iter().any(|rs| rule_matches(rs, ctx))
}

fn rule_matches(rule: &RuleSet, ctx: &AuthContext) -> bool {
    if !rule.resource_kinds.is_empty()
        && !rule.resource_kinds.iter().any(|k| k == ctx.resource_kind)
    {
        return false;
    }

    if !matches_labels(&rule.label_matchers, ctx) {
        return false;
    }

    if let Some(src) = &rule.predicate {
        match Expr::parse(src) {
            Ok(expr) => {
                let eval_ctx = EvalContext {
                    user_traits: ctx.traits,
                    resource_labels: ctx.resource_labels,
                };
                if !expr.eval(&eval_ctx) {
                    return false;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to parse rule predicate, treating as non-match");
                return false;
            }
        }
    }

    true
}

fn matches_labels(matchers: &[LabelMatcher], ctx: &AuthContext) -> bool {
    matches_label_map(matchers, ctx.resource_labels, ctx.traits)
}
