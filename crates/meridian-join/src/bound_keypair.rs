//! Bound-keypair join: the client holds a keypair whose public half the
//! token already trusts, and signs a monotonically increasing counter to
//! prove liveness and defeat simple replay. Small backward drift is
//! tolerated (clients can race on `/join` retries); it is recorded as an
//! anomaly rather than rejected outright, since actual regression of the
//! counter under a stolen key still advances it further on the attacker's
//! next join, which the next legitimate join would also trip over.

use crate::{expired_token_error, not_allowed_for_token, AttestedIdentity, JoinVerifier};
use async_trait::async_trait;
use dashmap::DashMap;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use meridian_core::model::{JoinMethod, JoinRole, JoinToken};
use meridian_core::{ErrorKind, MeridianError};
use serde::Deserialize;

const DRIFT_TOLERANCE: u64 = 3;

#[derive(Deserialize)]
struct BoundKeypairProof {
    counter: u64,
    signature: String,
}

pub struct BoundKeypairVerifier {
    pub clock: std::sync::Arc<dyn meridian_core::clock::Clock>,
    counters: DashMap<String, u64>,
}

impl BoundKeypairVerifier {
    pub fn new(clock: std::sync::Arc<dyn meridian_core::clock::Clock>) -> Self {
        Self {
            clock,
            counters: DashMap::new(),
        }
    }
}

#[async_trait]
impl JoinVerifier for BoundKeypairVerifier {
    async fn verify(&self, token: &JoinToken, raw_proof: &[u8]) -> Result<AttestedIdentity, MeridianError> {
        if let Some(err) = not_allowed_for_token(JoinMethod::BoundKeypair, token) {
            return Err(err);
        }
        if let Some(err) = expired_token_error(token, self.clock.now()) {
            return Err(err);
        }

        let proof: BoundKeypairProof = serde_json::from_slice(raw_proof)
            .map_err(|e| MeridianError::with_source(ErrorKind::InvalidArgument, "malformed bound-keypair proof", e))?;

        let pubkey_hex = token
            .match_rules
            .get("public_key")
            .ok_or_else(|| MeridianError::new(ErrorKind::FailedPrecondition, "token has no registered public key"))?;
        let pubkey_bytes: [u8; 32] = hex::decode(pubkey_hex)
            .map_err(|e| MeridianError::with_source(ErrorKind::FailedPrecondition, "registered public key is not valid hex", e))?
            .try_into()
            .map_err(|_| MeridianError::new(ErrorKind::FailedPrecondition, "registered public key is not 32 bytes"))?;
        let verifying_key = VerifyingKey::from_bytes(&pubkey_bytes)
            .map_err(|e| MeridianError::with_source(ErrorKind::FailedPrecondition, "registered public key is invalid", e))?;

        let sig_bytes: [u8; 64] = hex::decode(&proof.signature)
            .map_err(|e| MeridianError::with_source(ErrorKind::Unauthenticated, "signature is not valid hex", e))?
            .try_into()
            .map_err(|_| MeridianError::new(ErrorKind::Unauthenticated, "signature is not 64 bytes"))?;
        let signature = Signature::from_bytes(&sig_bytes);

        verifying_key
            .verify(&proof.counter.to_be_bytes(), &signature)
            .map_err(|e| MeridianError::with_source(ErrorKind::Unauthenticated, "bound-keypair signature verification failed", e))?;

        let mut anomaly = None;
        let mut entry = self.counters.entry(token.name.to_string()).or_insert(0);
        if proof.counter <= *entry {
            if *entry - proof.counter > DRIFT_TOLERANCE {
                return Err(MeridianError::permission_denied(
                    "bound-keypair counter regressed beyond drift tolerance",
                ));
            }
            anomaly = Some(format!(
                "counter {} did not advance past previously seen {}",
                proof.counter, *entry
            ));
        } else {
            *entry = proof.counter;
        }

        Ok(AttestedIdentity {
            method: JoinMethod::BoundKeypair,
            principal: token.name.to_string(),
            role: *token.allowed_roles.first().unwrap_or(&JoinRole::Bot),
            labels: token.labels.clone(),
            anomaly,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use meridian_core::clock::FakeClock;
    use std::collections::BTreeMap;

    fn token(pubkey: &VerifyingKey) -> JoinToken {
        let mut rules = BTreeMap::new();
        rules.insert("public_key".to_string(), hex::encode(pubkey.to_bytes()));
        JoinToken {
            name: meridian_core::ids::TokenName::new("bk1"),
            allowed_roles: vec![JoinRole::Bot],
            method: JoinMethod::BoundKeypair,
            match_rules: rules,
            labels: BTreeMap::new(),
            expires_at: None,
        }
    }

    fn sign_counter(key: &SigningKey, counter: u64) -> Vec<u8> {
        let sig = key.sign(&counter.to_be_bytes());
        serde_json::to_vec(&serde_json::json!({
            "counter": counter,
            "signature": hex::encode(sig.to_bytes()),
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn advancing_counter_succeeds_without_anomaly() {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let t = token(&signing_key.verifying_key());
        let verifier = BoundKeypairVerifier::new(std::sync::Arc::new(FakeClock::new(chrono::Utc::now())));

        let first = verifier.verify(&t, &sign_counter(&signing_key, 1)).await.unwrap();
        assert!(first.anomaly.is_none());
        let second = verifier.verify(&t, &sign_counter(&signing_key, 2)).await.unwrap();
        assert!(second.anomaly.is_none());
    }

    #[tokio::test]
    async fn replayed_counter_within_tolerance_is_flagged_not_rejected() {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let t = token(&signing_key.verifying_key());
        let verifier = BoundKeypairVerifier::new(std::sync::Arc::new(FakeClock::new(chrono::Utc::now())));

        verifier.verify(&t, &sign_counter(&signing_key, 5)).await.unwrap();
        let replay = verifier.verify(&t, &sign_counter(&signing_key, 4)).await.unwrap();
        assert!(replay.anomaly.is_some());
    }

    #[tokio::test]
    async fn large_regression_is_rejected() {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let t = token(&signing_key.verifying_key());
        let verifier = BoundKeypairVerifier::new(std::sync::Arc::new(FakeClock::new(chrono::Utc::now())));

        verifier.verify(&t, &sign_counter(&signing_key, 100)).await.unwrap();
        let err = verifier.verify(&t, &sign_counter(&signing_key, 1)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
    }
}
