//! Maps a leaf cluster's incoming roles to the root cluster's own role
//! names via a configured list of regex rules, evaluated top to bottom;
//! the first match wins.

use meridian_core::ids::RoleName;
use regex::Regex;

#[derive(Debug, Clone)]
pub struct RoleMappingRule {
    pub remote_pattern: Regex,
    pub local_role: RoleName,
}

#[derive(Debug, Clone, Default)]
pub struct RoleMapper {
    rules: Vec<RoleMappingRule>,
}

impl RoleMapper {
    pub fn new(rules: Vec<RoleMappingRule>) -> Self {
        Self { rules }
    }

    /// Maps every remote role that matches at least one rule; unmatched
    /// remote roles are dropped, not passed through, so a misconfigured
    /// trust relationship fails closed rather than granting unintended
    /// local roles.
    pub fn map_roles(&self, remote_roles: &[String]) -> Vec<RoleName> {
        let mut mapped = Vec::new();
        for remote in remote_roles {
            for rule in &self.rules {
                if rule.remote_pattern.is_match(remote) && !mapped.contains(&rule.local_role) {
                    mapped.push(rule.local_role.clone());
                }
            }
        }
        mapped
    }
}
