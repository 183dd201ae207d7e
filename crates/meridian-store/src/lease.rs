//! Lease-backed TTL support shared by every `Backend` implementation.
//! A lease is just a deadline keyed by an opaque id; `KeepAlive` extends
//! it, and a background reaper (owned by each backend) removes entries
//! whose lease has expired.

use crate::LeaseId;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct LeaseTable {
    next_id: AtomicU64,
    deadlines: DashMap<u64, DateTime<Utc>>,
    default_ttl: Duration,
}

impl LeaseTable {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            deadlines: DashMap::new(),
            default_ttl,
        }
    }

    pub fn grant(&self, now: DateTime<Utc>) -> LeaseId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.deadlines.insert(id, now + self.default_ttl);
        LeaseId(id)
    }

    pub fn keep_alive(&self, lease: LeaseId, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let deadline = now + self.default_ttl;
        self.deadlines
            .get_mut(&lease.0)
            .map(|mut d| {
                *d = deadline;
                deadline
            })
    }

    /// A heartbeat/lock/request entry is observable only until its
    /// deadline, after that it is dead to every reader, regardless of
    /// whether the reaper has physically removed the key yet.
    pub fn is_expired(&self, lease: LeaseId, now: DateTime<Utc>) -> bool {
        match self.deadlines.get(&lease.0) {
            Some(d) => *d <= now,
            None => true,
        }
    }

    pub fn expired_leases(&self, now: DateTime<Utc>) -> Vec<u64> {
        self.deadlines
            .iter()
            .filter(|e| *e.value() <= now)
            .map(|e| *e.key())
            .collect()
    }

    pub fn remove(&self, lease: LeaseId) {
        self.deadlines.remove(&lease.0);
    }
}
