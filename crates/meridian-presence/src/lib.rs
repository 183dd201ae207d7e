//! Tracks resource heartbeats and runs pluggable active health checks.
//! Expiry uses the same `Liveness` helper the tunnel hub uses for agent
//! connections, so "is this resource still here" means the same thing
//! whether it's asked by the reverse-tunnel or by the heartbeat table.

pub mod health;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use meridian_core::ids::ResourceId;
use meridian_core::model::{Health, Heartbeat};
pub use meridian_tunnel::Liveness;

pub use health::HealthChecker;

pub struct PresenceTable {
    entries: DashMap<ResourceId, Heartbeat>,
}

impl PresenceTable {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    pub fn record(&self, heartbeat: Heartbeat) {
        self.entries.insert(heartbeat.name.clone(), heartbeat);
    }

    pub fn get(&self, resource: &ResourceId) -> Option<Heartbeat> {
        self.entries.get(resource).map(|e| e.clone())
    }

    pub fn expire_stale(&self, now: DateTime<Utc>) -> Vec<ResourceId> {
        let expired: Vec<ResourceId> = self
            .entries
            .iter()
            .filter(|e| e.expires_at <= now)
            .map(|e| e.key().clone())
            .collect();
        for id in &expired {
            self.entries.remove(id);
        }
        expired
    }

    /// Picks the healthiest replica among candidates: `Healthy` beats
    /// `Degraded` beats `Unreachable`; ties broken by first-seen order.
    pub fn pick_replica(&self, candidates: &[ResourceId]) -> Option<ResourceId> {
        candidates
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| (id.clone(), e.health)))
            .min_by_key(|(_, health)| match health {
                Health::Healthy => 0,
                Health::Degraded => 1,
                Health::Unreachable => 2,
            })
            .map(|(id, _)| id)
    }
}

impl Default for PresenceTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn heartbeat(name: &str, health: Health, expires_at: DateTime<Utc>) -> Heartbeat {
        Heartbeat {
            kind: meridian_core::model::ResourceKind::Node,
            name: ResourceId::new(name),
            hostname: name.to_string(),
            labels: BTreeMap::new(),
            addresses: vec!["10.0.0.1:3022".into()],
            health,
            version: "1.0.0".into(),
            expires_at,
        }
    }

    #[test]
    fn pick_replica_prefers_healthy_over_degraded() {
        let table = PresenceTable::new();
        let now = Utc::now();
        table.record(heartbeat("n1", Health::Degraded, now + chrono::Duration::seconds(60)));
        table.record(heartbeat("n2", Health::Healthy, now + chrono::Duration::seconds(60)));

        let picked = table.pick_replica(&[ResourceId::new("n1"), ResourceId::new("n2")]);
        assert_eq!(picked, Some(ResourceId::new("n2")));
    }

    #[test]
    fn expire_stale_removes_past_deadline_entries() {
        let table = PresenceTable::new();
        let now = Utc::now();
        table.record(heartbeat("n1", Health::Healthy, now - chrono::Duration::seconds(1)));
        table.record(heartbeat("n2", Health::Healthy, now + chrono::Duration::seconds(60)));

        let expired = table.expire_stale(now);
        assert_eq!(expired, vec![ResourceId::new("n1")]);
        assert!(table.get(&ResourceId::new("n2")).is_some());
    }
}
