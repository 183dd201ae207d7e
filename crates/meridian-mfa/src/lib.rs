//! Per-session MFA challenges: a one-time token with a short TTL is
//! stored in a dedicated keyspace (`mfa/challenge/<id>`) and consumed
//! atomically via the store's CAS delete. Double-use maps the second
//! CAS failure to `AlreadyExists` rather than leaking the real
//! `CompareFailed` cause.

use chrono::{DateTime, Duration, Utc};
use meridian_core::ids::{DeviceId, UserId};
use meridian_core::model::MfaDeviceKind;
use meridian_core::{ErrorKind, MeridianError};
use meridian_store::Backend;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const CHALLENGE_TTL: Duration = Duration::seconds(60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub user: UserId,
    pub device: Option<DeviceId>,
    pub kind: MfaDeviceKind,
    /// Set for SSO-provider MFA: the IdP's `acr_values` claim, kept
    /// alongside the challenge so the single-use cert issued on
    /// completion can carry it forward.
    pub acr_values: Option<String>,
    pub expires_at: DateTime<Utc>,
}

pub struct MfaGate {
    store: Arc<dyn Backend>,
}

impl MfaGate {
    pub fn new(store: Arc<dyn Backend>) -> Self {
        Self { store }
    }

    pub async fn issue_challenge(
        &self,
        user: UserId,
        device: Option<DeviceId>,
        kind: MfaDeviceKind,
        acr_values: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Challenge, MeridianError> {
        let challenge = Challenge {
            id: uuid::Uuid::new_v4().to_string(),
            user,
            device,
            kind,
            acr_values,
            expires_at: now + CHALLENGE_TTL,
        };
        let key = challenge_key(&challenge.id);
        let value = serde_json::to_vec(&challenge).expect("Challenge always serializes");
        self.store
            .create_or_update(&key, value, Some(meridian_core::ids::Revision::NONE))
            .await?;
        Ok(challenge)
    }

    /// Consumes a challenge exactly once: fetches it, checks expiry, then
    /// deletes it conditioned on the revision just read. If another
    /// caller wins the race (or already consumed it), the CAS failure is
    /// translated to `AlreadyExists` so callers don't need to know about
    /// store-level revision conflicts.
    pub async fn consume_challenge(&self, id: &str, now: DateTime<Utc>) -> Result<Challenge, MeridianError> {
        let key = challenge_key(id);
        let item = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| MeridianError::not_found(format!("mfa challenge {id} not found")))?;

        let challenge: Challenge = serde_json::from_slice(&item.value)
            .map_err(|e| MeridianError::with_source(ErrorKind::FailedPrecondition, "corrupt mfa challenge record", e))?;

        if challenge.expires_at <= now {
            return Err(MeridianError::new(ErrorKind::DeadlineExceeded, "mfa challenge has expired"));
        }

        match self.store.delete(&key, Some(item.revision)).await {
            Ok(()) => Ok(challenge),
            Err(err) if err.kind == ErrorKind::CompareFailed => Err(MeridianError::already_exists(format!(
                "mfa challenge {id} was already consumed"
            ))),
            Err(err) => Err(err),
        }
    }
}

fn challenge_key(id: &str) -> String {
    format!("mfa/challenge/{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_store::memory::MemoryBackend;

    #[tokio::test]
    async fn challenge_consumes_exactly_once() {
        let store: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let gate = MfaGate::new(store);
        let now = Utc::now();

        let challenge = gate
            .issue_challenge(UserId::new("alice"), None, MfaDeviceKind::Webauthn, None, now)
            .await
            .unwrap();

        gate.consume_challenge(&challenge.id, now).await.unwrap();
        let err = gate.consume_challenge(&challenge.id, now).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn expired_challenge_is_rejected() {
        let store: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let gate = MfaGate::new(store);
        let now = Utc::now();

        let challenge = gate
            .issue_challenge(UserId::new("alice"), None, MfaDeviceKind::Totp, None, now)
            .await
            .unwrap();

        let err = gate
            .consume_challenge(&challenge.id, now + Duration::seconds(61))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DeadlineExceeded);
    }
}
