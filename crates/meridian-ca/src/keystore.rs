//! CA keystore configuration: `software` (key material stored in the
//! cluster state, encrypted-at-rest by the caller), `pkcs11` (HSM), or a
//! cloud KMS. `CertAuthority` is the per-(cluster, type) record holding
//! the active key plus zero-or-more additional-trusted keys populated
//! during the `init` rotation phase.

use crate::rotation::RotationState;
use crate::signer::{Ed25519Signer, KeySigner};
use meridian_core::model::CaType;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeystoreBackend {
    Software,
    Pkcs11,
    CloudKms,
}

/// An opaque handle into whatever actually holds the private key. For the
/// `software` backend this wraps a live `KeySigner`; for `pkcs11`/
/// `CloudKms` it is only ever a label the real system would use to look
/// up a remote session; no key bytes cross this boundary.
#[derive(Clone)]
pub struct KeyHandle {
    pub label: String,
    pub public_key: Vec<u8>,
    pub signer: Arc<dyn KeySigner>,
}

impl KeyHandle {
    pub fn software(label: impl Into<String>) -> Self {
        let signer = Ed25519Signer::generate();
        let public_key = signer.public_key();
        Self {
            label: label.into(),
            public_key,
            signer: Arc::new(signer),
        }
    }
}

/// One CA: `(cluster, type)` with an active key and any additional-trusted
/// keys carried through an in-progress rotation.
pub struct CertAuthority {
    pub ca_type: CaType,
    pub backend: KeystoreBackend,
    pub active: KeyHandle,
    pub additional_trusted: Vec<KeyHandle>,
    pub rotation: RotationState,
}

impl CertAuthority {
    pub fn bootstrap(ca_type: CaType, backend: KeystoreBackend, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            ca_type,
            backend,
            active: KeyHandle::software(format!("{ca_type:?}-active")),
            additional_trusted: Vec::new(),
            rotation: RotationState::standby(now),
        }
    }

    /// The public bundle returned by `/webapi/auth/export`: the active
    /// key, plus the additional-trusted key while a rotation is in its
    /// `init` phase.
    pub fn exported_public_keys(&self) -> Vec<Vec<u8>> {
        let mut keys = vec![self.active.public_key.clone()];
        if self.rotation.exposes_dual_keys() {
            keys.extend(self.additional_trusted.iter().map(|k| k.public_key.clone()));
        }
        keys
    }

    /// Enter the `init` phase: generate a new key, keep the old one
    /// trusted. Called once `RotationState::advance(Init, ...)` has
    /// itself succeeded.
    pub fn begin_init(&mut self, new_rotation: RotationState) {
        let new_active = KeyHandle::software(format!("{:?}-{}", self.ca_type, uuid_suffix()));
        let old_active = std::mem::replace(&mut self.active, new_active);
        self.additional_trusted.push(old_active);
        self.rotation = new_rotation;
    }

    pub fn set_rotation(&mut self, new_rotation: RotationState) {
        if matches!(new_rotation.phase, crate::rotation::RotationPhase::Standby) {
            self.additional_trusted.clear();
        }
        self.rotation = new_rotation;
    }
}

fn uuid_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::RotationPhase;

    #[test]
    fn init_exposes_both_keys_standby_exposes_one() {
        let now = chrono::Utc::now();
        let mut ca = CertAuthority::bootstrap(CaType::User, KeystoreBackend::Software, now);
        assert_eq!(ca.exported_public_keys().len(), 1);

        let rotation = ca
            .rotation
            .advance(RotationPhase::Init, now, chrono::Duration::zero())
            .unwrap();
        ca.begin_init(rotation);
        assert_eq!(ca.exported_public_keys().len(), 2);

        let back_to_standby = ca
            .rotation
            .advance(RotationPhase::Standby, now, chrono::Duration::zero())
            .unwrap();
        ca.set_rotation(back_to_standby);
        assert_eq!(ca.exported_public_keys().len(), 1);
    }
}
