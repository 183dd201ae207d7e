//! Reverse-tunnel routing, inverted from ordinary service discovery: the
//! agent dials the proxy and holds the connection open, and the proxy
//! dispatches user channels down it. `TunnelHub` generalizes the
//! teacher's satellite registry (`DashMap<node_id, SatelliteInfo>` plus
//! a per-node task channel and a pending-task oneshot map) from "AGI
//! satellite dispatch" to "agent reverse-tunnel with proxy-dispatched
//! user channels".

pub mod liveness;
pub mod peering;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use meridian_core::ids::ResourceId;
use meridian_core::{ErrorKind, MeridianError};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};

pub use liveness::Liveness;
pub use peering::PeerPool;

/// A request to open a user channel to a specific agent, dispatched by
/// the proxy. `opened` resolves once the agent has accepted or rejected
/// it; the caller then streams bytes over `data`-side plumbing owned
/// elsewhere (the session layer), not modeled here.
pub struct ChannelRequest {
    pub channel_id: String,
    pub capability: String,
    pub opened: oneshot::Sender<Result<(), MeridianError>>,
}

pub struct AgentConnection {
    pub resource: ResourceId,
    pub capabilities: Vec<String>,
    pub last_heartbeat: DateTime<Utc>,
    channel_tx: mpsc::Sender<ChannelRequest>,
    /// Bounds in-flight channels per agent so one slow agent cannot
    /// starve the hub's dispatch loop.
    permits: Arc<Semaphore>,
}

pub struct TunnelHub {
    agents: DashMap<ResourceId, AgentConnection>,
    heartbeat_interval: chrono::Duration,
    grace: chrono::Duration,
}

impl TunnelHub {
    pub fn new(heartbeat_interval: chrono::Duration, grace: chrono::Duration) -> Self {
        Self {
            agents: DashMap::new(),
            heartbeat_interval,
            grace,
        }
    }

    pub fn register(
        &self,
        resource: ResourceId,
        capabilities: Vec<String>,
        channel_tx: mpsc::Sender<ChannelRequest>,
        max_in_flight: usize,
        now: DateTime<Utc>,
    ) {
        self.agents.insert(
            resource.clone(),
            AgentConnection {
                resource,
                capabilities,
                last_heartbeat: now,
                channel_tx,
                permits: Arc::new(Semaphore::new(max_in_flight)),
            },
        );
    }

    pub fn unregister(&self, resource: &ResourceId) {
        self.agents.remove(resource);
    }

    pub fn heartbeat(&self, resource: &ResourceId, now: DateTime<Utc>) -> Result<(), MeridianError> {
        self.agents
            .get_mut(resource)
            .map(|mut a| a.last_heartbeat = now)
            .ok_or_else(|| MeridianError::not_found(format!("agent {resource} is not connected")))
    }

    /// Agents with no heartbeat inside `heartbeat_interval + grace` are
    /// considered gone; callers should `unregister` them.
    pub fn expired_agents(&self, now: DateTime<Utc>) -> Vec<ResourceId> {
        let deadline = self.heartbeat_interval + self.grace;
        self.agents
            .iter()
            .filter(|entry| now - entry.last_heartbeat > deadline)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Dispatches a proxy-originated channel to the first connected
    /// agent with the requested capability, honoring its backpressure
    /// semaphore. Returns `ResourceExhausted` if the agent has no spare
    /// capacity rather than queuing unboundedly.
    pub async fn dispatch(&self, capability: &str, channel_id: String) -> Result<(), MeridianError> {
        let agent = self
            .agents
            .iter()
            .find(|a| a.capabilities.iter().any(|c| c == capability))
            .map(|a| (a.key().clone(), a.channel_tx.clone(), Arc::clone(&a.permits)))
            .ok_or_else(|| MeridianError::not_found(format!("no connected agent offers capability '{capability}'")))?;

        let (resource, tx, permits) = agent;
        let permit = permits
            .try_acquire_owned()
            .map_err(|_| MeridianError::resource_exhausted(format!("agent {resource} has no spare channel capacity")))?;

        let (opened_tx, opened_rx) = oneshot::channel();
        tx.send(ChannelRequest { channel_id, capability: capability.to_string(), opened: opened_tx })
            .await
            .map_err(|_| MeridianError::unavailable(format!("agent {resource} disconnected mid-dispatch")))?;

        let result = opened_rx
            .await
            .map_err(|_| MeridianError::unavailable(format!("agent {resource} closed without a response")))?;
        drop(permit);
        result
    }

    pub fn connected_count(&self) -> usize {
        self.agents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_routes_to_matching_capability() {
        let hub = TunnelHub::new(chrono::Duration::seconds(10), chrono::Duration::seconds(5));
        let (tx, mut rx) = mpsc::channel(4);
        hub.register(ResourceId::new("node1"), vec!["ssh".into()], tx, 2, Utc::now());

        tokio::spawn(async move {
            if let Some(req) = rx.recv().await {
                let _ = req.opened.send(Ok(()));
            }
        });

        hub.dispatch("ssh", "chan1".into()).await.unwrap();
    }

    #[tokio::test]
    async fn dispatch_to_unknown_capability_is_not_found() {
        let hub = TunnelHub::new(chrono::Duration::seconds(10), chrono::Duration::seconds(5));
        let err = hub.dispatch("kube", "chan1".into()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn expired_agents_are_identified_past_grace() {
        let hub = TunnelHub::new(chrono::Duration::seconds(10), chrono::Duration::seconds(5));
        let (tx, _rx) = mpsc::channel(1);
        let now = Utc::now();
        hub.register(ResourceId::new("node1"), vec!["ssh".into()], tx, 1, now);

        assert!(hub.expired_agents(now + chrono::Duration::seconds(5)).is_empty());
        assert_eq!(hub.expired_agents(now + chrono::Duration::seconds(20)).len(), 1);
    }
}
