//! In-memory backend used by every other crate's unit tests (and by the
//! six end-to-end scenario tests in `bin/meridian-auth/tests/`) so they
//! never need a sled file on disk.

use crate::{conflict, lease::LeaseTable, not_found, Backend, Event, Item, LeaseId};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use meridian_core::ids::Revision;
use meridian_core::MeridianError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const WATCH_BUFFER: usize = 256;

struct Watcher {
    prefix: String,
    tx: mpsc::Sender<Event>,
}

pub struct MemoryBackend {
    data: Mutex<BTreeMap<String, (Vec<u8>, Revision)>>,
    revision_counter: AtomicU64,
    watchers: DashMap<u64, Watcher>,
    watcher_counter: AtomicU64,
    leases: LeaseTable,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(BTreeMap::new()),
            revision_counter: AtomicU64::new(0),
            watchers: DashMap::new(),
            watcher_counter: AtomicU64::new(0),
            leases: LeaseTable::new(ChronoDuration::seconds(30)),
        }
    }

    fn next_revision(&self) -> Revision {
        Revision(self.revision_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn notify(&self, event: Event, key: &str) {
        let mut dead = Vec::new();
        for entry in self.watchers.iter() {
            if key.starts_with(entry.value().prefix.as_str()) {
                match entry.value().tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        // Backlog exceeded: tell the consumer to re-list
                        // rather than silently dropping.
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
impl Backend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Item>, MeridianError> {
        let data = self.data.lock().expect("memory backend lock poisoned");
        Ok(data.get(key).map(|(value, revision)| Item {
            key: key.to_string(),
            value: value.clone(),
            revision: *revision,
        }))
    }

    async fn list(
        &self,
        prefix: &str,
        limit: usize,
        start_key: Option<&str>,
    ) -> Result<(Vec<Item>, Option<String>), MeridianError> {
        let data = self.data.lock().expect("memory backend lock poisoned");
        let mut items: Vec<Item> = data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .filter(|(k, _)| start_key.map_or(true, |s| k.as_str() > s))
            .map(|(k, (v, r))| Item {
                key: k.clone(),
                value: v.clone(),
                revision: *r,
            })
            .collect();
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
        let mut data = self.data.lock().expect("memory backend lock poisoned");
        let current = data.get(key).map(|(_, r)| *r);
        if let Some(expected) = expected_revision {
            let exists_mismatch = match (expected, current) {
                (Revision::NONE, None) => false,
                (Revision::NONE, Some(_)) => true,
                (exp, Some(cur)) => exp != cur,
                (_, None) => true,
            };
            if exists_mismatch {
                return Err(conflict(key));
            }
        }
        let revision = self.next_revision();
        data.insert(key.to_string(), (value.clone(), revision));
        drop(data);
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
        let mut data = self.data.lock().expect("memory backend lock poisoned");
        match data.get(key) {
            None => return Err(not_found(key)),
            Some((_, cur)) => {
                if let Some(expected) = expected_revision {
                    if expected != *cur {
                        return Err(conflict(key));
                    }
                }
            }
        }
        data.remove(key);
        let revision = self.next_revision();
        drop(data);
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
        Ok(())
    }
}
