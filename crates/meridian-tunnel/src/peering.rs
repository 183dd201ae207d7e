//! Inter-proxy peering: a parallel gRPC channel per peer proxy, used
//! when the agent holding the target resource is connected to a
//! different proxy than the one serving the client. One pool entry per
//! peer address, reused across requests rather than dialed per-request.

use dashmap::DashMap;
use meridian_core::{ErrorKind, MeridianError};
use tonic::transport::{Channel, Endpoint};

pub struct PeerPool {
    channels: DashMap<String, Channel>,
    keepalive: std::time::Duration,
}

impl PeerPool {
    pub fn new(keepalive: std::time::Duration) -> Self {
        Self {
            channels: DashMap::new(),
            keepalive,
        }
    }

    pub async fn channel_for(&self, peer_addr: &str) -> Result<Channel, MeridianError> {
        if let Some(ch) = self.channels.get(peer_addr) {
            return Ok(ch.clone());
        }

        let endpoint = Endpoint::from_shared(peer_addr.to_string())
            .map_err(|e| MeridianError::with_source(ErrorKind::InvalidArgument, "invalid peer proxy address", e))?
            .keep_alive_timeout(self.keepalive)
            .tcp_keepalive(Some(self.keepalive));

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| MeridianError::with_source(ErrorKind::Unavailable, format!("failed to connect to peer {peer_addr}"), e))?;

        self.channels.insert(peer_addr.to_string(), channel.clone());
        Ok(channel)
    }

    pub fn drop_peer(&self, peer_addr: &str) {
        self.channels.remove(peer_addr);
    }
}

impl Default for PeerPool {
    fn default() -> Self {
        Self::new(std::time::Duration::from_secs(60))
    }
}
