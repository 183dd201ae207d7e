//! Buffers frames into fixed-size parts, encrypts them when a
//! [`KmsWrapper`] is configured, and hands the finished bytes to an
//! [`ObjectStore`].

use crate::crypto::{self, KmsWrapper};
use crate::frame::{self, Frame, FLAG_ENCRYPTED, FORMAT_VERSION, MAGIC, NONCE_LEN};
use crate::store::ObjectStore;
use meridian_core::{ErrorKind, MeridianError};
use std::sync::Arc;

pub const DEFAULT_PART_SIZE: usize = 16 * 1024 * 1024;

pub struct PartWriter {
    store: Arc<dyn ObjectStore>,
    kms: Option<Arc<dyn KmsWrapper>>,
    session_prefix: String,
    part_size: usize,
    buffered: Vec<Frame>,
    buffered_bytes: usize,
    next_part: u32,
}

impl PartWriter {
    pub fn new(store: Arc<dyn ObjectStore>, kms: Option<Arc<dyn KmsWrapper>>, session_prefix: impl Into<String>) -> Self {
        Self {
            store,
            kms,
            session_prefix: session_prefix.into(),
            part_size: DEFAULT_PART_SIZE,
            buffered: Vec::new(),
            buffered_bytes: 0,
            next_part: 0,
        }
    }

    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size;
        self
    }

    /// Buffers one frame, flushing a part if this pushes the buffer past
    /// the configured part size.
    pub async fn push(&mut self, frame: Frame) -> Result<(), MeridianError> {
        self.buffered_bytes += frame.data.len() + 13;
        self.buffered.push(frame);
        if self.buffered_bytes >= self.part_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Flushes any buffered frames as a final, possibly under-sized part.
    pub async fn finish(mut self) -> Result<(), MeridianError> {
        self.flush().await
    }

    async fn flush(&mut self) -> Result<(), MeridianError> {
        if self.buffered.is_empty() {
            return Ok(());
        }
        let body = frame::encode_frames(&self.buffered);
        let encoded = self.encode_part(&body).await?;
        let key = format!("{}/part-{:06}", self.session_prefix, self.next_part);
        self.store.put_part(&key, encoded).await?;
        self.next_part += 1;
        self.buffered.clear();
        self.buffered_bytes = 0;
        Ok(())
    }

    async fn encode_part(&self, body: &[u8]) -> Result<Vec<u8>, MeridianError> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_be_bytes());

        match &self.kms {
            None => {
                out.extend_from_slice(&0u16.to_be_bytes());
                out.extend_from_slice(body);
            }
            Some(kms) => {
                let data_key = crypto::generate_data_key();
                let (key_id, wrapped_key) = kms.wrap_key(&data_key).await?;
                let (nonce, ciphertext) = crypto::seal(&data_key, body)?;

                out.extend_from_slice(&FLAG_ENCRYPTED.to_be_bytes());
                out.extend_from_slice(&(key_id.len() as u16).to_be_bytes());
                out.extend_from_slice(key_id.as_bytes());
                out.extend_from_slice(&(wrapped_key.len() as u16).to_be_bytes());
                out.extend_from_slice(&wrapped_key);
                out.extend_from_slice(&nonce);
                out.extend_from_slice(&ciphertext);
            }
        }
        Ok(out)
    }
}

/// Decodes one part, decrypting it first if the flags indicate
/// encryption, and returns the frame stream it carried.
pub async fn decode_part(kms: Option<&dyn KmsWrapper>, bytes: &[u8]) -> Result<Vec<Frame>, MeridianError> {
    if bytes.len() < 8 + 2 + 2 {
        return Err(MeridianError::invalid_argument("recording part too short"));
    }
    if &bytes[0..8] != MAGIC {
        return Err(MeridianError::invalid_argument("recording part has bad magic"));
    }
    let _version = u16::from_be_bytes(bytes[8..10].try_into().unwrap());
    let flags = u16::from_be_bytes(bytes[10..12].try_into().unwrap());
    let rest = &bytes[12..];

    if flags & FLAG_ENCRYPTED == 0 {
        return frame::decode_frames(rest);
    }

    let kms = kms.ok_or_else(|| MeridianError::new(ErrorKind::FailedPrecondition, "part is encrypted but no kms wrapper configured"))?;
    if rest.len() < 2 {
        return Err(MeridianError::invalid_argument("truncated encrypted part header"));
    }
    let key_id_len = u16::from_be_bytes(rest[0..2].try_into().unwrap()) as usize;
    let rest = &rest[2..];
    if rest.len() < key_id_len {
        return Err(MeridianError::invalid_argument("truncated kms key id"));
    }
    let key_id = std::str::from_utf8(&rest[..key_id_len])
        .map_err(|_| MeridianError::invalid_argument("kms key id is not utf-8"))?;
    let rest = &rest[key_id_len..];

    if rest.len() < 2 {
        return Err(MeridianError::invalid_argument("truncated wrapped key header"));
    }
    let wrapped_len = u16::from_be_bytes(rest[0..2].try_into().unwrap()) as usize;
    let rest = &rest[2..];
    if rest.len() < wrapped_len + NONCE_LEN {
        return Err(MeridianError::invalid_argument("truncated wrapped key or nonce"));
    }
    let wrapped_key = &rest[..wrapped_len];
    let rest = &rest[wrapped_len..];
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let data_key = kms.unwrap_key(key_id, wrapped_key).await?;
    let plaintext = crypto::open(&data_key, nonce, ciphertext)?;
    frame::decode_frames(&plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SoftwareKms;
    use crate::frame::FrameKind;
    use crate::store::FilesystemObjectStore;

    fn frame(n: u64) -> Frame {
        Frame { ts_ns: n, kind: FrameKind::Print, data: vec![b'x'; 100] }
    }

    #[tokio::test]
    async fn unencrypted_part_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FilesystemObjectStore::new(dir.path()));
        let mut writer = PartWriter::new(store.clone(), None, "session-1").with_part_size(1_000_000);
        for i in 0..5 {
            writer.push(frame(i)).await.unwrap();
        }
        writer.finish().await.unwrap();

        let bytes = store.get_part("session-1/part-000000").await.unwrap();
        let frames = decode_part(None, &bytes).await.unwrap();
        assert_eq!(frames.len(), 5);
    }

    #[tokio::test]
    async fn encrypted_part_round_trips_and_requires_kms_to_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FilesystemObjectStore::new(dir.path()));
        let kms: Arc<dyn KmsWrapper> = Arc::new(SoftwareKms::new([3u8; 32], "software:local"));
        let mut writer = PartWriter::new(store.clone(), Some(kms.clone()), "session-2").with_part_size(1_000_000);
        for i in 0..3 {
            writer.push(frame(i)).await.unwrap();
        }
        writer.finish().await.unwrap();

        let bytes = store.get_part("session-2/part-000000").await.unwrap();
        assert!(decode_part(None, &bytes).await.is_err());
        let frames = decode_part(Some(kms.as_ref()), &bytes).await.unwrap();
        assert_eq!(frames.len(), 3);
    }

    #[tokio::test]
    async fn small_part_size_splits_into_multiple_parts() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FilesystemObjectStore::new(dir.path()));
        let mut writer = PartWriter::new(store.clone(), None, "session-3").with_part_size(250);
        for i in 0..10 {
            writer.push(frame(i)).await.unwrap();
        }
        writer.finish().await.unwrap();

        assert!(store.get_part("session-3/part-000000").await.is_ok());
        assert!(store.get_part("session-3/part-000001").await.is_ok());
    }
}
