//! `KeySigner`: the signer is never handed raw private-key bytes when
//! backed by HSM/KMS, it calls the provider with a digest and gets a
//! signature back. `SoftwareSigner` is the only implementation that
//! actually holds key material, and zeroizes it on drop.

use ed25519_dalek::{Signer as _, SigningKey};
use meridian_core::{ErrorKind, MeridianError};
use p256::ecdsa::{signature::Signer as _, Signature as P256Signature, SigningKey as P256SigningKey};
use zeroize::Zeroize;

#[derive(Debug, Clone)]
pub struct Signature(pub Vec<u8>);

pub trait KeySigner: Send + Sync {
    fn sign(&self, digest: &[u8]) -> Result<Signature, MeridianError>;
    fn public_key(&self) -> Vec<u8>;
}

/// Ed25519 software signer, used for the SSH certificate suite by default
/// wherever a non-RSA algorithm is legal.
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            key: SigningKey::generate(&mut rng),
        }
    }
}

impl Drop for Ed25519Signer {
    fn drop(&mut self) {
        let mut bytes = self.key.to_bytes();
        bytes.zeroize();
    }
}

impl KeySigner for Ed25519Signer {
    fn sign(&self, digest: &[u8]) -> Result<Signature, MeridianError> {
        Ok(Signature(self.key.sign(digest).to_bytes().to_vec()))
    }

    fn public_key(&self) -> Vec<u8> {
        self.key.verifying_key().to_bytes().to_vec()
    }
}

/// ECDSA P-256 software signer, used for the TLS certificate suite by
/// default, and mandatory under FIPS mode.
pub struct P256Signer {
    key: P256SigningKey,
}

impl P256Signer {
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            key: P256SigningKey::random(&mut rng),
        }
    }
}

impl KeySigner for P256Signer {
    fn sign(&self, digest: &[u8]) -> Result<Signature, MeridianError> {
        let sig: P256Signature = self.key.sign(digest);
        Ok(Signature(sig.to_der().as_bytes().to_vec()))
    }

    fn public_key(&self) -> Vec<u8> {
        use p256::elliptic_curve::sec1::ToEncodedPoint;
        self.key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }
}

/// Placeholder for a PKCS#11-backed signer: the concurrency cap from spec
/// §4.2 ("bound the number of outstanding PKCS#11 sessions") lives on the
/// `Pkcs11Keystore` that owns a pool of these, not on the signer itself.
pub struct Pkcs11Signer {
    pub slot_label: String,
    pub key_id: Vec<u8>,
}

impl KeySigner for Pkcs11Signer {
    fn sign(&self, _digest: &[u8]) -> Result<Signature, MeridianError> {
        Err(MeridianError::new(
            ErrorKind::Unavailable,
            format!(
                "pkcs11 signer for slot {} not wired to a cryptoki session in this build",
                self.slot_label
            ),
        ))
    }

    fn public_key(&self) -> Vec<u8> {
        Vec::new()
    }
}

/// Backwards-compatible alias used by `keystore::CertAuthority` for the
/// key that is actually loaded in memory (software path).
pub type SoftwareSigner = Ed25519Signer;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_signer_roundtrips() {
        use sha2::Digest;
        let signer = Ed25519Signer::generate();
        let digest = sha2::Sha256::digest(b"hello");
        let sig = signer.sign(&digest).unwrap();
        assert!(!sig.0.is_empty());
    }
}
