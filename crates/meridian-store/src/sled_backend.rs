//! Embedded B-tree file backend, backed by `sled`, the default
//! `software` backend a single-node or small-cluster deployment runs
//! with. Remote backends (CockroachDB/DynamoDB/etcd) are deliberately
//! left as a `Backend` trait boundary only: the contract in `lib.rs` is
//! what a remote implementation would satisfy. This file follows the
//! same shape any `sled`-backed component does: open once at a
//! configured path, one writer mutex, a counter key for revisions.

use crate::{conflict, lease::LeaseTable, not_found, Backend, Event, Item, LeaseId};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use meridian_core::ids::Revision;
use meridian_core::{ErrorKind, MeridianError};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const WATCH_BUFFER: usize = 256;
const REVISION_KEY: &str = "__meridian_revision_counter__";

struct Watcher {
    prefix: String,
    tx: mpsc::Sender<Event>,
}

pub struct SledBackend {
    db: sled::Db,
    write_lock: Mutex<()>,
    revision_counter: AtomicU64,
    watchers: DashMap<u64, Watcher>,
    watcher_counter: AtomicU64,
    leases: LeaseTable,
}

impl SledBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MeridianError> {
        let db = sled::open(path).map_err(|e| {
            MeridianError::with_source(ErrorKind::Unavailable, "failed to open sled store", e)
        })?;
        let revision_counter = db
            .get(REVISION_KEY)
            .ok()
            .flatten()
            .and_then(|v| v.as_ref().try_into().ok().map(u64::from_be_bytes))
            .unwrap_or(0);
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
            revision_counter: AtomicU64::new(revision_counter),
            watchers: DashMap::new(),
            watcher_counter: AtomicU64::new(0),
            leases: LeaseTable::new(ChronoDuration::seconds(30)),
        })
    }

    fn next_revision(&self) -> Result<Revision, MeridianError> {
        let rev = self.revision_counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.db
            .insert(REVISION_KEY, &rev.to_be_bytes())
            .map_err(|e| {
                MeridianError::with_source(ErrorKind::Unavailable, "revision persist failed", e)
            })?;
        Ok(Revision(rev))
    }

    fn encode(value: &[u8], revision: Revision) -> Vec<u8> {
        let mut buf = Vec::with_capacity(value.len() + 8);
        buf.extend_from_slice(&revision.0.to_be_bytes());
        buf.extend_from_slice(value);
        buf
    }

    fn decode(key: &str, raw: sled::IVec) -> Item {
        let revision = u64::from_be_bytes(raw[..8].try_into().expect("corrupt revision header"));
        Item {
            key: key.to_string(),
            value: raw[8..].to_vec(),
            revision: Revision(revision),
        }
    }

    fn notify(&self, event: Event, key: &str) {
        let mut dead = Vec::new();
        for entry in self.watchers.iter() {
            if key.starts_with(entry.value().prefix.as_str()) {
                match entry.value().tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        let _ = entry.value().tx.try_send(Event::Reset);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => dead.push(*entry.key()),
                }
            }
        }
        for id in dead {
            self.watchers.remove(&id);
        }
    }
}

#[async_trait]
impl Backend for SledBackend {
    async fn get(&self, key: &str) -> Result<Option<Item>, MeridianError> {
        let raw = self.db.get(key).map_err(|e| {
            MeridianError::with_source(ErrorKind::Unavailable, "sled get failed", e)
        })?;
        Ok(raw.map(|raw| Self::decode(key, raw)))
    }

    async fn list(
        &self,
        prefix: &str,
        limit: usize,
        start_key: Option<&str>,
    ) -> Result<(Vec<Item>, Option<String>), MeridianError> {
        let mut items = Vec::new();
        for entry in self.db.scan_prefix(prefix) {
            let (k, v) = entry.map_err(|e| {
                MeridianError::with_source(ErrorKind::Unavailable, "sled scan failed", e)
            })?;
            let key = String::from_utf8_lossy(&k).to_string();
            if key == REVISION_KEY {
                continue;
            }
            if let Some(start) = start_key {
                if key.as_str() <= start {
                    continue;
                }
            }
            items.push(Self::decode(&key, v));
        }
        let next_key = if limit > 0 && items.len() > limit {
            items.truncate(limit);
            items.last().map(|i| i.key.clone())
        } else {
            None
        };
        Ok((items, next_key))
    }

    async fn create_or_update(
        &self,
        key: &str,
        value: Vec<u8>,
        expected_revision: Option<Revision>,
    ) -> Result<Revision, MeridianError> {
        let _guard = self.write_lock.lock().expect("sled write lock poisoned");
        let current = self
            .db
            .get(key)
            .map_err(|e| MeridianError::with_source(ErrorKind::Unavailable, "sled get failed", e))?
            .map(|raw| Self::decode(key, raw).revision);

        if let Some(expected) = expected_revision {
            let mismatch = match (expected, current) {
                (Revision::NONE, None) => false,
                (Revision::NONE, Some(_)) => true,
                (exp, Some(cur)) => exp != cur,
                (_, None) => true,
            };
            if mismatch {
                return Err(conflict(key));
            }
        }

        let revision = self.next_revision()?;
        self.db
            .insert(key, Self::encode(&value, revision))
            .map_err(|e| MeridianError::with_source(ErrorKind::Unavailable, "sled put failed", e))?;
        self.notify(
            Event::Put(Item {
                key: key.to_string(),
                value,
                revision,
            }),
            key,
        );
        Ok(revision)
    }

    async fn delete(
        &self,
        key: &str,
        expected_revision: Option<Revision>,
    ) -> Result<(), MeridianError> {
        let _guard = self.write_lock.lock().expect("sled write lock poisoned");
        let current = self
            .db
            .get(key)
            .map_err(|e| MeridianError::with_source(ErrorKind::Unavailable, "sled get failed", e))?
            .map(|raw| Self::decode(key, raw).revision);
        match current {
            None => return Err(not_found(key)),
            Some(cur) => {
                if let Some(expected) = expected_revision {
                    if expected != cur {
                        return Err(conflict(key));
                    }
                }
            }
        }
        self.db
            .remove(key)
            .map_err(|e| MeridianError::with_source(ErrorKind::Unavailable, "sled del failed", e))?;
        let revision = self.next_revision()?;
        self.notify(
            Event::Delete {
                key: key.to_string(),
                revision,
            },
            key,
        );
        Ok(())
    }

    async fn watch(
        &self,
        prefix: &str,
        _from_revision: Option<Revision>,
    ) -> Result<ReceiverStream<Event>, MeridianError> {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let id = self.watcher_counter.fetch_add(1, Ordering::SeqCst);
        self.watchers.insert(
            id,
            Watcher {
                prefix: prefix.to_string(),
                tx,
            },
        );
        Ok(ReceiverStream::new(rx))
    }

    async fn keep_alive(
        &self,
        lease: LeaseId,
    ) -> Result<chrono::DateTime<chrono::Utc>, MeridianError> {
        self.leases
            .keep_alive(lease, Utc::now())
            .ok_or_else(|| MeridianError::not_found("lease not found"))
    }

    async fn ping(&self) -> Result<(), MeridianError> {
        self.db
            .was_recovered();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrips_through_a_temp_file() {
        let dir = tempfile_dir();
        let backend = SledBackend::open(&dir).unwrap();
        let rev = backend
            .create_or_update("k", b"v".to_vec(), Some(Revision::NONE))
            .await
            .unwrap();
        let item = backend.get("k").await.unwrap().unwrap();
        assert_eq!(item.revision, rev);
        assert_eq!(item.value, b"v");
        std::fs::remove_dir_all(dir).ok();
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("meridian-store-test-{}", uuid_like()));
        p
    }

    fn uuid_like() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64
    }
}
