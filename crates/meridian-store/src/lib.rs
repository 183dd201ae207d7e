//! The cluster state store: an ordered key/value map with prefix scans,
//! conditional put/delete by revision, lease-backed TTL entries, and a
//! tailable change feed delivered in commit order.
//!
//! Two backends ship: [`sled_backend::SledBackend`] (the default, embedded
//! B-tree file) and [`memory::MemoryBackend`] (every other crate's unit
//! tests run against this one so they never touch disk).

pub mod lease;
pub mod memory;
pub mod sled_backend;

use async_trait::async_trait;
use meridian_core::ids::Revision;
use meridian_core::{ErrorKind, MeridianError};
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Clone)]
pub struct Item {
    pub key: String,
    pub value: Vec<u8>,
    pub revision: Revision,
}

#[derive(Debug, Clone)]
pub enum Event {
    Put(Item),
    Delete { key: String, revision: Revision },
    /// Emitted when the backend has dropped events under backpressure;
    /// the consumer MUST re-list the prefix before resuming.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseId(pub u64);

/// The store's RPC contract. `async_trait` is used rather than
/// hand-written boxed futures, matching how this workspace's other
/// async trait boundaries are written.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Item>, MeridianError>;

    async fn list(
        &self,
        prefix: &str,
        limit: usize,
        start_key: Option<&str>,
    ) -> Result<(Vec<Item>, Option<String>), MeridianError>;

    /// `expected_revision == Some(Revision::NONE)` means "must not already
    /// exist"; `None` means unconditional write.
    async fn create_or_update(
        &self,
        key: &str,
        value: Vec<u8>,
        expected_revision: Option<Revision>,
    ) -> Result<Revision, MeridianError>;

    async fn delete(
        &self,
        key: &str,
        expected_revision: Option<Revision>,
    ) -> Result<(), MeridianError>;

    async fn watch(
        &self,
        prefix: &str,
        from_revision: Option<Revision>,
    ) -> Result<ReceiverStream<Event>, MeridianError>;

    async fn keep_alive(&self, lease: LeaseId) -> Result<chrono::DateTime<chrono::Utc>, MeridianError>;

    /// Used by `/readyz` to reflect backend reachability.
    async fn ping(&self) -> Result<(), MeridianError>;
}

pub(crate) fn conflict(key: &str) -> MeridianError {
    MeridianError::new(
        ErrorKind::CompareFailed,
        format!("revision mismatch for key {key}"),
    )
}

pub(crate) fn not_found(key: &str) -> MeridianError {
    MeridianError::not_found(format!("key not found: {key}"))
}
