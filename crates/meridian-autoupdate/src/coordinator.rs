//! Walks update groups in order: picks canaries, waits for their version
//! reports, and only then unlocks the rest of the group.

use crate::config::{AutoupdateConfig, UpdateGroup};
use crate::report::VersionReport;
use crate::strategy::RolloutStrategy;
use meridian_core::ids::ResourceId;
use meridian_core::{ErrorKind, MeridianError};
use rand::seq::SliceRandom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Pending,
    CanaryInProgress,
    Unlocked,
    Halted,
}

pub struct GroupProgress {
    pub group: UpdateGroup,
    pub canaries: Vec<ResourceId>,
    pub state: GroupState,
}

pub struct RolloutCoordinator {
    config: AutoupdateConfig,
    target: String,
    groups: Vec<GroupProgress>,
}

impl RolloutCoordinator {
    pub fn new(config: AutoupdateConfig, target: impl Into<String>) -> Self {
        let groups = config
            .groups
            .iter()
            .cloned()
            .map(|group| GroupProgress { group, canaries: Vec::new(), state: GroupState::Pending })
            .collect();
        Self { config, target: target.into(), groups }
    }

    /// Selects up to `canary_count` agents at random from the next
    /// pending group and marks it in-progress. Returns `None` once every
    /// group has been unlocked or halted.
    pub fn select_canaries<R: rand::Rng>(&mut self, rng: &mut R) -> Option<&[ResourceId]> {
        let count = self.config.canary_count as usize;
        let idx = self.groups.iter().position(|g| g.state == GroupState::Pending)?;

        let group = &mut self.groups[idx];
        let pick = count.min(group.group.agents.len());
        let chosen: Vec<ResourceId> = group.group.agents.choose_multiple(rng, pick).cloned().collect();
        group.canaries = chosen;
        group.state = GroupState::CanaryInProgress;
        Some(&group.canaries)
    }

    /// Evaluates the in-progress group's canary reports against
    /// `strategy`, unlocking or halting the group accordingly. Errors if
    /// no group is currently awaiting canary results.
    pub fn evaluate_canaries(
        &mut self,
        strategy: &dyn RolloutStrategy,
        reports: &[VersionReport],
    ) -> Result<GroupState, MeridianError> {
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.state == GroupState::CanaryInProgress)
            .ok_or_else(|| MeridianError::new(ErrorKind::FailedPrecondition, "no group is awaiting canary results"))?;

        let canary_reports: Vec<VersionReport> = reports
            .iter()
            .filter(|r| group.canaries.contains(&r.agent))
            .cloned()
            .collect();

        group.state = if strategy.should_continue(&self.target, &canary_reports) {
            GroupState::Unlocked
        } else {
            GroupState::Halted
        };
        Ok(group.state)
    }

    pub fn group_states(&self) -> Vec<(String, GroupState)> {
        self.groups.iter().map(|g| (g.group.name.clone(), g.state)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RolloutStrategyKind, UpdateSchedule};
    use crate::strategy::HaltOnError;

    fn config(agents: Vec<&str>, canary_count: u8) -> AutoupdateConfig {
        AutoupdateConfig::new(
            vec![UpdateGroup { name: "prod".into(), agents: agents.into_iter().map(ResourceId::new).collect() }],
            UpdateSchedule { days: vec![1, 2, 3], start_hour: 2 },
            canary_count,
            RolloutStrategyKind::HaltOnError,
        )
        .unwrap()
    }

    #[test]
    fn canary_selection_never_exceeds_group_size() {
        let mut coordinator = RolloutCoordinator::new(config(vec!["n1", "n2", "n3"], 5), "1.2.3");
        let mut rng = rand::thread_rng();
        let canaries = coordinator.select_canaries(&mut rng).unwrap();
        assert_eq!(canaries.len(), 3);
    }

    #[test]
    fn canary_selection_caps_at_configured_count() {
        let mut coordinator = RolloutCoordinator::new(config(vec!["n1", "n2", "n3", "n4", "n5", "n6", "n7"], 5), "1.2.3");
        let mut rng = rand::thread_rng();
        let canaries = coordinator.select_canaries(&mut rng).unwrap();
        assert_eq!(canaries.len(), 5);
    }

    #[test]
    fn successful_canaries_unlock_the_group() {
        let mut coordinator = RolloutCoordinator::new(config(vec!["n1", "n2"], 5), "1.2.3");
        let mut rng = rand::thread_rng();
        coordinator.select_canaries(&mut rng);
        let canary_ids = coordinator.groups[0].canaries.clone();
        let reports: Vec<VersionReport> = canary_ids
            .iter()
            .map(|id| VersionReport { agent: id.clone(), version: "1.2.3".into(), os: "linux".into(), arch: "amd64".into(), uuid: "u".into() })
            .collect();
        let state = coordinator.evaluate_canaries(&HaltOnError, &reports).unwrap();
        assert_eq!(state, GroupState::Unlocked);
    }

    #[test]
    fn failing_canary_halts_the_group() {
        let mut coordinator = RolloutCoordinator::new(config(vec!["n1", "n2"], 5), "1.2.3");
        let mut rng = rand::thread_rng();
        coordinator.select_canaries(&mut rng);
        let canary_ids = coordinator.groups[0].canaries.clone();
        let reports = vec![VersionReport { agent: canary_ids[0].clone(), version: "1.2.2".into(), os: "linux".into(), arch: "amd64".into(), uuid: "u".into() }];
        let state = coordinator.evaluate_canaries(&HaltOnError, &reports).unwrap();
        assert_eq!(state, GroupState::Halted);
    }
}
