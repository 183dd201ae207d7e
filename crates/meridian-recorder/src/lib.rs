//! Session-recording: frame encoding, part chunking and object storage,
//! at-rest encryption, and sequential playback.

pub mod crypto;
pub mod frame;
pub mod part;
pub mod playback;
pub mod store;

pub use crypto::{KmsWrapper, SoftwareKms};
pub use frame::{Frame, FrameKind};
pub use part::PartWriter;
pub use playback::Player;
pub use store::{FilesystemObjectStore, ObjectStore};
