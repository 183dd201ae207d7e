//! `AutoupdateConfig`/`AutoupdateVersion`: the two pieces of admin
//! intent the coordinator acts on. A group walks in the order it was
//! declared; each holds its own member list so group membership doesn't
//! depend on label matching the way resource access does.

use meridian_core::ids::ResourceId;
use meridian_core::{ErrorKind, MeridianError};

pub const MAX_CANARY_COUNT: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutStrategyKind {
    HaltOnError,
    TimeBased,
}

#[derive(Debug, Clone)]
pub struct UpdateSchedule {
    /// Days of week (0 = Sunday .. 6 = Saturday) the rollout is allowed to advance on.
    pub days: Vec<u8>,
    pub start_hour: u8,
}

#[derive(Debug, Clone)]
pub struct UpdateGroup {
    pub name: String,
    pub agents: Vec<ResourceId>,
}

#[derive(Debug, Clone)]
pub struct AutoupdateConfig {
    pub groups: Vec<UpdateGroup>,
    pub schedule: UpdateSchedule,
    pub canary_count: u8,
    pub strategy: RolloutStrategyKind,
}

impl AutoupdateConfig {
    pub fn new(
        groups: Vec<UpdateGroup>,
        schedule: UpdateSchedule,
        canary_count: u8,
        strategy: RolloutStrategyKind,
    ) -> Result<Self, MeridianError> {
        if canary_count > MAX_CANARY_COUNT {
            return Err(MeridianError::new(
                ErrorKind::InvalidArgument,
                format!("canary_count {canary_count} exceeds the maximum of {MAX_CANARY_COUNT}"),
            ));
        }
        Ok(Self { groups, schedule, canary_count, strategy })
    }
}

#[derive(Debug, Clone)]
pub struct AutoupdateVersion {
    pub target: String,
}
