//! A 12,345-frame, ~40 MB encrypted session: the default 16 MB part
//! size splits it into three parts, and playback reassembles the exact
//! frame stream an offline reader would see after decryption.

use meridian_recorder::crypto::{KmsWrapper, SoftwareKms};
use meridian_recorder::frame::{Frame, FrameKind};
use meridian_recorder::part::PartWriter;
use meridian_recorder::playback::Player;
use meridian_recorder::store::FilesystemObjectStore;
use std::sync::Arc;

const FRAME_COUNT: u64 = 12_345;
const FRAME_PAYLOAD_LEN: usize = 3_277;

#[tokio::test]
async fn encrypted_session_splits_into_three_parts_and_plays_back_identically() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FilesystemObjectStore::new(dir.path()));
    let kms: Arc<dyn KmsWrapper> = Arc::new(SoftwareKms::new([5u8; 32], "software:session-kms"));

    let mut writer = PartWriter::new(store.clone(), Some(kms.clone()), "session-scenario-6");
    for i in 0..FRAME_COUNT {
        writer
            .push(Frame { ts_ns: i, kind: FrameKind::Print, data: vec![b'f'; FRAME_PAYLOAD_LEN] })
            .await
            .unwrap();
    }
    writer.finish().await.unwrap();

    let parts = store.list_parts("session-scenario-6").await.unwrap();
    assert_eq!(parts.len(), 3, "default 16 MB chunking should produce 3 parts: {parts:?}");

    let player = Player::new(store.as_ref(), Some(kms.as_ref()));
    let frames = player.read_session("session-scenario-6").await.unwrap();
    assert_eq!(frames.len(), FRAME_COUNT as usize);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.ts_ns, i as u64);
        assert_eq!(frame.data.len(), FRAME_PAYLOAD_LEN);
    }

    let total_plaintext_bytes: usize = frames.iter().map(|f| f.data.len()).sum();
    assert!(total_plaintext_bytes > 38_000_000 && total_plaintext_bytes < 42_000_000);

    let raw_first_part = store.get_part(&parts[0]).await.unwrap();
    assert!(meridian_recorder::part::decode_part(None, &raw_first_part).await.is_err(), "part must not be readable without the kms wrapper");
}
