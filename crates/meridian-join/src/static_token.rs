//! The simplest join method: the proof is just the shared secret itself,
//! compared to the token's configured value with constant-time equality.

use crate::{expired_token_error, not_allowed_for_token, AttestedIdentity, JoinVerifier};
use async_trait::async_trait;
use meridian_core::model::{JoinMethod, JoinToken};
use meridian_core::{ErrorKind, MeridianError};

pub struct StaticTokenVerifier {
    pub clock: std::sync::Arc<dyn meridian_core::clock::Clock>,
}

#[async_trait]
impl JoinVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &JoinToken, raw_proof: &[u8]) -> Result<AttestedIdentity, MeridianError> {
        if let Some(err) = not_allowed_for_token(JoinMethod::StaticSecret, token) {
            return Err(err);
        }
        if let Some(err) = expired_token_error(token, self.clock.now()) {
            return Err(err);
        }

        let expected = token
            .match_rules
            .get("secret")
            .ok_or_else(|| MeridianError::new(ErrorKind::FailedPrecondition, "token has no configured secret"))?;

        if !constant_time_eq(expected.as_bytes(), raw_proof) {
            return Err(MeridianError::permission_denied("static join secret does not match"));
        }

        Ok(AttestedIdentity {
            method: JoinMethod::StaticSecret,
            principal: token.name.to_string(),
            role: *token.allowed_roles.first().unwrap_or(&meridian_core::model::JoinRole::Node),
            labels: token.labels.clone(),
            anomaly: None,
        })
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::clock::FakeClock;
    use std::collections::BTreeMap;

    fn token(secret: &str) -> JoinToken {
        let mut rules = BTreeMap::new();
        rules.insert("secret".to_string(), secret.to_string());
        JoinToken {
            name: meridian_core::ids::TokenName::new("t1"),
            allowed_roles: vec![meridian_core::model::JoinRole::Node],
            method: JoinMethod::StaticSecret,
            match_rules: rules,
            labels: BTreeMap::new(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn matching_secret_succeeds() {
        let verifier = StaticTokenVerifier {
            clock: std::sync::Arc::new(FakeClock::new(chrono::Utc::now())),
        };
        let t = token("s3cr3t");
        let identity = verifier.verify(&t, b"s3cr3t").await.unwrap();
        assert_eq!(identity.principal, "t1");
    }

    #[tokio::test]
    async fn mismatched_secret_is_denied() {
        let verifier = StaticTokenVerifier {
            clock: std::sync::Arc::new(FakeClock::new(chrono::Utc::now())),
        };
        let t = token("s3cr3t");
        let err = verifier.verify(&t, b"wrong").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
    }
}
