//! Shared types for the meridian control plane: identifiers, the data model
//! from the core specification, the cluster-wide error kind, and the
//! environment/config layer every other crate builds on.

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod model;

pub use clock::Clock;
pub use config::ClusterConfig;
pub use error::{ErrorKind, MeridianError};
pub use ids::*;

use std::sync::Arc;

/// Threaded through every component at construction instead of relying on
/// package-level singletons (clock, rng seed, config) the way the source
/// material does. Tests inject a fake `Clock`.
#[derive(Clone)]
pub struct ClusterContext {
    pub cluster_id: ClusterId,
    pub config: Arc<ClusterConfig>,
    pub clock: Arc<dyn Clock>,
}

impl ClusterContext {
    pub fn new(cluster_id: ClusterId, config: ClusterConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cluster_id,
            config: Arc::new(config),
            clock,
        }
    }

    #[cfg(test)]
    pub fn for_test() -> Self {
        Self::new(
            ClusterId::new("test-cluster"),
            ClusterConfig::default(),
            Arc::new(clock::SystemClock),
        )
    }
}

/// Initializes the `tracing` subscriber from `RUST_LOG`/`MERIDIAN_LOG`.
/// Each binary calls this explicitly at the top of `main()` rather than
/// relying on a ctor-style auto-init.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("MERIDIAN_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
