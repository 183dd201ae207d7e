//! At-rest encryption for recording parts: a random 256-bit data key per
//! part, wrapped by a [`KmsWrapper`] and stored alongside the part so
//! playback can unwrap it again. AEAD over the frame body uses the same
//! `aes-gcm` crate the rest of this workspace uses for encrypted state.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use meridian_core::{ErrorKind, MeridianError};

pub const DATA_KEY_LEN: usize = 32;

/// Wraps and unwraps per-part data keys. A cloud KMS implementation
/// (AWS KMS, GCP KMS) is a trait boundary only here; `SoftwareKms` is the
/// provided no-HSM implementation, analogous to `meridian-ca`'s software
/// keystore.
#[async_trait]
pub trait KmsWrapper: Send + Sync {
    /// Wraps a freshly generated data key, returning an opaque key id to
    /// store in the part header and the wrapped key bytes.
    async fn wrap_key(&self, plaintext_key: &[u8; DATA_KEY_LEN]) -> Result<(String, Vec<u8>), MeridianError>;

    /// Unwraps a previously wrapped key, given the key id from the part header.
    async fn unwrap_key(&self, key_id: &str, wrapped: &[u8]) -> Result<[u8; DATA_KEY_LEN], MeridianError>;
}

/// A no-HSM `KmsWrapper` that encrypts the data key under a master key
/// held in process memory. Suitable for single-node or test clusters;
/// production clusters are expected to implement `KmsWrapper` against a
/// real cloud KMS instead.
pub struct SoftwareKms {
    master: Aes256Gcm,
    key_id: String,
}

impl SoftwareKms {
    pub fn new(master_key: [u8; DATA_KEY_LEN], key_id: impl Into<String>) -> Self {
        Self {
            master: Aes256Gcm::new_from_slice(&master_key).expect("key length is 32"),
            key_id: key_id.into(),
        }
    }
}

#[async_trait]
impl KmsWrapper for SoftwareKms {
    async fn wrap_key(&self, plaintext_key: &[u8; DATA_KEY_LEN]) -> Result<(String, Vec<u8>), MeridianError> {
        let nonce = Aes256Gcm::generate_nonce(OsRng);
        let ciphertext = self
            .master
            .encrypt(&nonce, plaintext_key.as_slice())
            .map_err(|e| MeridianError::new(ErrorKind::Unavailable, format!("wrap data key: {e}")))?;
        let mut wrapped = Vec::with_capacity(nonce.len() + ciphertext.len());
        wrapped.extend_from_slice(nonce.as_slice());
        wrapped.extend_from_slice(&ciphertext);
        Ok((self.key_id.clone(), wrapped))
    }

    async fn unwrap_key(&self, key_id: &str, wrapped: &[u8]) -> Result<[u8; DATA_KEY_LEN], MeridianError> {
        if key_id != self.key_id {
            return Err(MeridianError::new(ErrorKind::NotFound, format!("unknown kms key id {key_id}")));
        }
        if wrapped.len() < 12 {
            return Err(MeridianError::invalid_argument("wrapped key too short"));
        }
        let (nonce_bytes, ciphertext) = wrapped.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plain = self
            .master
            .decrypt(nonce, ciphertext)
            .map_err(|e| MeridianError::new(ErrorKind::Unavailable, format!("unwrap data key: {e}")))?;
        plain
            .try_into()
            .map_err(|_| MeridianError::invalid_argument("unwrapped key has wrong length"))
    }
}

pub fn generate_data_key() -> [u8; DATA_KEY_LEN] {
    let key = Aes256Gcm::generate_key(OsRng);
    key.into()
}

pub fn seal(data_key: &[u8; DATA_KEY_LEN], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), MeridianError> {
    let cipher = Aes256Gcm::new_from_slice(data_key).expect("key length is 32");
    let nonce = Aes256Gcm::generate_nonce(OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| MeridianError::new(ErrorKind::Unavailable, format!("encrypt part: {e}")))?;
    Ok((nonce.to_vec(), ciphertext))
}

pub fn open(data_key: &[u8; DATA_KEY_LEN], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, MeridianError> {
    let cipher = Aes256Gcm::new_from_slice(data_key).expect("key length is 32");
    let nonce = Nonce::from_slice(nonce);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| MeridianError::new(ErrorKind::InvalidArgument, format!("decrypt part: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn software_kms_wrap_unwrap_round_trips() {
        let kms = SoftwareKms::new([7u8; 32], "software:local");
        let data_key = generate_data_key();
        let (key_id, wrapped) = kms.wrap_key(&data_key).await.unwrap();
        let unwrapped = kms.unwrap_key(&key_id, &wrapped).await.unwrap();
        assert_eq!(data_key, unwrapped);
    }

    #[test]
    fn seal_open_round_trips() {
        let data_key = generate_data_key();
        let (nonce, ciphertext) = seal(&data_key, b"frame bytes").unwrap();
        let plain = open(&data_key, &nonce, &ciphertext).unwrap();
        assert_eq!(plain, b"frame bytes");
    }

    #[tokio::test]
    async fn unwrap_with_wrong_key_id_is_rejected() {
        let kms = SoftwareKms::new([7u8; 32], "software:local");
        let data_key = generate_data_key();
        let (_, wrapped) = kms.wrap_key(&data_key).await.unwrap();
        assert!(kms.unwrap_key("software:other", &wrapped).await.is_err());
    }
}
