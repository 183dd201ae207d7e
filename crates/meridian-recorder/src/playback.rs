//! Sequential playback: fetches a session's parts in order and decrypts
//! them incrementally, yielding the original frame stream.

use crate::crypto::KmsWrapper;
use crate::frame::Frame;
use crate::part;
use crate::store::ObjectStore;
use meridian_core::MeridianError;

pub struct Player<'a> {
    store: &'a dyn ObjectStore,
    kms: Option<&'a dyn KmsWrapper>,
}

impl<'a> Player<'a> {
    pub fn new(store: &'a dyn ObjectStore, kms: Option<&'a dyn KmsWrapper>) -> Self {
        Self { store, kms }
    }

    /// Reads every part under `session_prefix` in lexical (part-number)
    /// order and returns the concatenated, decrypted frame stream.
    pub async fn read_session(&self, session_prefix: &str) -> Result<Vec<Frame>, MeridianError> {
        let keys = self.store.list_parts(session_prefix).await?;
        let mut frames = Vec::new();
        for key in keys {
            let bytes = self.store.get_part(&key).await?;
            frames.extend(part::decode_part(self.kms, &bytes).await?);
        }
        Ok(frames)
    }
}
