//! Shared heartbeat-interval/grace-window liveness check, used
//! identically by the tunnel hub (agent connections) and by
//! `meridian-presence` (resource heartbeats) so both components agree
//! on what "alive" means.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy)]
pub struct Liveness {
    pub heartbeat_interval: Duration,
    pub grace: Duration,
}

impl Liveness {
    pub fn new(heartbeat_interval: Duration, grace: Duration) -> Self {
        Self { heartbeat_interval, grace }
    }

    pub fn is_expired(&self, last_seen: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - last_seen > self.heartbeat_interval + self.grace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_past_interval_plus_grace() {
        let liveness = Liveness::new(Duration::seconds(10), Duration::seconds(5));
        let now = Utc::now();
        assert!(!liveness.is_expired(now, now + Duration::seconds(14)));
        assert!(liveness.is_expired(now, now + Duration::seconds(16)));
    }
}
