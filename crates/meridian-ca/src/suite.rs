//! Pluggable signature suites. A cluster declares one suite at bootstrap;
//! CA rotation is the only way to change it afterwards, and only in the
//! non-FIPS-to-FIPS direction.

use crate::signer::{Ed25519Signer, KeySigner, P256Signer};
use meridian_core::{ErrorKind, MeridianError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureSuite {
    /// RSA-2048 everywhere.
    Legacy,
    /// Ed25519 for SSH, ECDSA P-256 for TLS (default for new clusters).
    BalancedV1,
    /// RSA-only, for FIPS-constrained deployments.
    FipsV1,
}

impl SignatureSuite {
    /// A new-host SSH signing key for this suite. FIPS mode has no
    /// software Ed25519 path; legacy and FIPS both fall back to RSA via
    /// the P-256 signer being refused and an explicit error instead of
    /// silently downgrading security properties.
    pub fn new_user_ssh_key(&self) -> Result<Box<dyn KeySigner>, MeridianError> {
        match self {
            SignatureSuite::BalancedV1 => Ok(Box::new(Ed25519Signer::generate())),
            SignatureSuite::Legacy | SignatureSuite::FipsV1 => Err(MeridianError::new(
                ErrorKind::FailedPrecondition,
                "RSA software signing is not implemented in this build; use an HSM/KMS keystore backend for legacy/fips suites",
            )),
        }
    }

    pub fn new_host_tls_key(&self) -> Result<Box<dyn KeySigner>, MeridianError> {
        match self {
            SignatureSuite::BalancedV1 => Ok(Box::new(P256Signer::generate())),
            SignatureSuite::Legacy | SignatureSuite::FipsV1 => Err(MeridianError::new(
                ErrorKind::FailedPrecondition,
                "RSA software signing is not implemented in this build; use an HSM/KMS keystore backend for legacy/fips suites",
            )),
        }
    }

    pub fn hash(&self, data: &[u8]) -> Vec<u8> {
        Sha256::digest(data).to_vec()
    }

    /// Rotation may only move a cluster towards FIPS, never away from it.
    pub fn can_switch_to(&self, target: SignatureSuite) -> bool {
        match (self, target) {
            (a, b) if *a == b => true,
            (SignatureSuite::FipsV1, _) => false,
            (_, SignatureSuite::FipsV1) => true,
            (SignatureSuite::Legacy, SignatureSuite::BalancedV1) => true,
            (SignatureSuite::BalancedV1, SignatureSuite::Legacy) => false,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cannot_leave_fips() {
        assert!(!SignatureSuite::FipsV1.can_switch_to(SignatureSuite::BalancedV1));
        assert!(!SignatureSuite::FipsV1.can_switch_to(SignatureSuite::Legacy));
    }

    #[test]
    fn can_move_towards_fips() {
        assert!(SignatureSuite::Legacy.can_switch_to(SignatureSuite::FipsV1));
        assert!(SignatureSuite::BalancedV1.can_switch_to(SignatureSuite::FipsV1));
    }

    #[test]
    fn legacy_to_balanced_allowed_but_not_reverse() {
        assert!(SignatureSuite::Legacy.can_switch_to(SignatureSuite::BalancedV1));
        assert!(!SignatureSuite::BalancedV1.can_switch_to(SignatureSuite::Legacy));
    }
}
