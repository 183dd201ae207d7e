//! Access Monitoring Rules: pre-configured predicates evaluated against
//! a newly filed request's requester traits and reason. Matching rules
//! cast an automatic review with a documented reason, reusing
//! `meridian_rbac::Expr` rather than a second predicate language.

use crate::ReviewDecision;
use meridian_core::model::Traits;
use meridian_rbac::expr::{EvalContext, Expr};
use regex::Regex;
use std::collections::BTreeMap;

pub struct AutoReviewRule {
    pub description: String,
    pub predicate: String,
    pub reason_pattern: Option<String>,
    pub decision: ReviewDecision,
}

impl AutoReviewRule {
    pub fn matches(&self, traits: &Traits, reason: Option<&str>) -> bool {
        if let Some(pattern) = &self.reason_pattern {
            let Some(reason) = reason else { return false };
            match Regex::new(pattern) {
                Ok(re) if re.is_match(reason) => {}
                _ => return false,
            }
        }

        let expr = match Expr::parse(&self.predicate) {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(error = %err, "auto-review rule predicate failed to parse, treating as non-match");
                return false;
            }
        };
        let empty_labels: BTreeMap<String, String> = BTreeMap::new();
        let ctx = EvalContext {
            user_traits: traits,
            resource_labels: &empty_labels,
        };
        expr.eval(&ctx)
    }
}
