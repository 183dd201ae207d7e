//! CA rotation as an explicit state-machine value, rather than
//! exceptions/flags scattered through the CA code. Each
//! transition takes the current phase and a proposed phase and either
//! advances or raises `FailedPrecondition`.

use chrono::{DateTime, Duration, Utc};
use meridian_core::{ErrorKind, MeridianError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationPhase {
    Standby,
    Init,
    UpdateClients,
    UpdateServers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationState {
    pub phase: RotationPhase,
    pub since: DateTime<Utc>,
    pub grace: Duration,
}

impl RotationState {
    pub fn standby(now: DateTime<Utc>) -> Self {
        Self {
            phase: RotationPhase::Standby,
            since: now,
            grace: Duration::zero(),
        }
    }

    /// Progresses strictly: `standby -> init -> update_clients ->
    /// update_servers -> standby`. Rollback from
    /// `init` back to `standby` is allowed; once past `init`, progression
    /// is one-way. A phase may only advance once its grace window has
    /// elapsed.
    pub fn advance(
        &self,
        to: RotationPhase,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> Result<RotationState, MeridianError> {
        if now < self.since + self.grace {
            return Err(MeridianError::failed_precondition(format!(
                "rotation grace window has not elapsed: {:?} -> {:?}",
                self.phase, to
            )));
        }

        let legal = match (self.phase, to) {
            (RotationPhase::Standby, RotationPhase::Init) => true,
            (RotationPhase::Init, RotationPhase::UpdateClients) => true,
            (RotationPhase::Init, RotationPhase::Standby) => true, // rollback
            (RotationPhase::UpdateClients, RotationPhase::UpdateServers) => true,
            (RotationPhase::UpdateServers, RotationPhase::Standby) => true,
            _ => false,
        };

        if !legal {
            return Err(MeridianError::failed_precondition(format!(
                "illegal rotation transition {:?} -> {:?}",
                self.phase, to
            )));
        }

        Ok(RotationState {
            phase: to,
            since: now,
            grace,
        })
    }

    /// During `init`, the exported public bundle carries both the active
    /// and the additional-trusted key.
    pub fn exposes_dual_keys(&self) -> bool {
        matches!(self.phase, RotationPhase::Init)
    }
}
