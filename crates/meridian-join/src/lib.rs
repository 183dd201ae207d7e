//! One `JoinVerifier` implementation per supported proof-of-identity
//! method. Every verifier takes the token's configured match rules plus
//! the caller-supplied proof and returns an `AttestedIdentity` or a
//! rejection; callers (typically `meridian-auth`) turn a successful
//! attestation into a host or bot certificate via `meridian-issuer`.

pub mod bound_keypair;
pub mod jwks;
pub mod oidc;
pub mod static_token;

use async_trait::async_trait;
use meridian_core::model::{JoinMethod, JoinRole, JoinToken};
use meridian_core::MeridianError;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct AttestedIdentity {
    pub method: JoinMethod,
    pub principal: String,
    pub role: JoinRole,
    pub labels: BTreeMap<String, String>,
    /// Set when the proof was technically valid but something about it
    /// (a counter going backwards, a replayed nonce within tolerance)
    /// warrants an audit trail even though the join itself succeeds.
    pub anomaly: Option<String>,
}

#[async_trait]
pub trait JoinVerifier: Send + Sync {
    async fn verify(&self, token: &JoinToken, raw_proof: &[u8]) -> Result<AttestedIdentity, MeridianError>;
}

pub use bound_keypair::BoundKeypairVerifier;
pub use oidc::{AzureVerifier, GcpVerifier, IamVerifier, KubernetesVerifier, OidcVerifier};
pub use static_token::StaticTokenVerifier;

pub fn not_allowed_for_token(method: JoinMethod, token: &JoinToken) -> Option<MeridianError> {
    if token.method != method {
        return Some(MeridianError::new(
            meridian_core::ErrorKind::PermissionDenied,
            format!("token {} does not allow join method {method:?}", token.name),
        ));
    }
    None
}

pub fn expired_token_error(token: &JoinToken, now: chrono::DateTime<chrono::Utc>) -> Option<MeridianError> {
    if token.is_expired(now) {
        return Some(MeridianError::new(
            meridian_core::ErrorKind::PermissionDenied,
            format!("join token {} has expired", token.name),
        ));
    }
    None
}
