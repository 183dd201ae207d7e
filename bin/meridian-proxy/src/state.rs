//! Shared state for the Proxy binary: the reverse-tunnel hub agents
//! dial into, the presence table of resources they advertise, and the
//! inter-proxy peering pool used when the target agent is connected to
//! a different proxy than the one serving the client.

use meridian_core::ClusterContext;
use meridian_tunnel::{PeerPool, TunnelHub};
use std::sync::Arc;

pub struct ProxyState {
    pub ctx: ClusterContext,
    pub hub: Arc<TunnelHub>,
    pub presence: Arc<meridian_presence::PresenceTable>,
    pub peers: Arc<PeerPool>,
    /// Caps how many channels a single agent connection may have open
    /// at once; passed to `TunnelHub::register` for each new session.
    pub max_channels_per_agent: usize,
}

impl ProxyState {
    pub fn new(ctx: ClusterContext) -> Self {
        let heartbeat_interval = chrono::Duration::seconds(ctx.config.heartbeat_interval_secs as i64);
        let grace = heartbeat_interval;
        Self {
            hub: Arc::new(TunnelHub::new(heartbeat_interval, grace)),
            presence: Arc::new(meridian_presence::PresenceTable::new()),
            peers: Arc::new(PeerPool::new(std::time::Duration::from_secs(ctx.config.peering_keepalive_secs))),
            max_channels_per_agent: 32,
            ctx,
        }
    }
}
