//! Whether a failed canary halts the rest of the rollout.

use crate::report::VersionReport;

pub trait RolloutStrategy: Send + Sync {
    /// Given the canary reports collected so far for one group, decides
    /// whether the coordinator should unlock the rest of that group.
    fn should_continue(&self, target_version: &str, canary_reports: &[VersionReport]) -> bool;
}

/// Proceeds only once every canary has reported the target version.
pub struct HaltOnError;

impl RolloutStrategy for HaltOnError {
    fn should_continue(&self, target_version: &str, canary_reports: &[VersionReport]) -> bool {
        !canary_reports.is_empty() && canary_reports.iter().all(|r| r.matches_target(target_version))
    }
}

/// Proceeds once the rollout window's schedule allows it, regardless of
/// whether every canary succeeded; a lagging or failed canary is logged
/// but does not block the group.
pub struct TimeBased;

impl RolloutStrategy for TimeBased {
    fn should_continue(&self, _target_version: &str, canary_reports: &[VersionReport]) -> bool {
        !canary_reports.is_empty()
    }
}
