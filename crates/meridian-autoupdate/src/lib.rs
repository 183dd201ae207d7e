//! Managed-update coordinator: declares a desired agent version per
//! update group, walks groups in order picking random canaries, and only
//! unlocks the rest of a group once its canaries report in.

pub mod config;
pub mod coordinator;
pub mod report;
pub mod strategy;

pub use config::{AutoupdateConfig, AutoupdateVersion, RolloutStrategyKind, UpdateGroup, UpdateSchedule, MAX_CANARY_COUNT};
pub use coordinator::{GroupState, RolloutCoordinator};
pub use report::VersionReport;
pub use strategy::{HaltOnError, RolloutStrategy, TimeBased};
