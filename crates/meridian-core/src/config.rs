//! Cluster-wide configuration. Environment variables keep the same
//! names operator tooling expects; a `cluster.toml` file (loaded via
//! the `config` crate) layers cluster-level defaults beneath them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_user_cert_ttl_hours() -> i64 {
    12
}

fn default_bot_max_ttl_days() -> i64 {
    7
}

fn default_hsm_sign_timeout_secs() -> u64 {
    10
}

fn default_peering_keepalive_secs() -> u64 {
    60
}

fn default_dial_timeout_secs() -> u64 {
    30
}

fn default_recording_part_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_jwks_cache_secs() -> u64 {
    5 * 60
}

/// `TELEPORT_HOME`-equivalent settings plus the cluster's operating
/// timeouts. Loaded once at boot via [`ClusterConfig::load`] and passed
/// by `Arc` reference from then on (see `meridian_core::ClusterContext`),
/// never re-read per call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// MERIDIAN_HOME (the `TELEPORT_HOME` analogue): state dir root.
    #[serde(default = "default_home")]
    pub home: String,

    /// Heartbeat interval for agents and reverse-tunnel liveness (default 30s).
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Default user certificate TTL (default 12h).
    #[serde(default = "default_user_cert_ttl_hours")]
    pub user_cert_ttl_hours: i64,

    /// Hard cap on bot certificate TTL extension (default 7 days).
    #[serde(default = "default_bot_max_ttl_days")]
    pub bot_max_ttl_days: i64,

    /// HSM signing deadline (default 10s).
    #[serde(default = "default_hsm_sign_timeout_secs")]
    pub hsm_sign_timeout_secs: u64,

    /// Inter-proxy peering keepalive (default 60s).
    #[serde(default = "default_peering_keepalive_secs")]
    pub peering_keepalive_secs: u64,

    /// Connection dial timeout (default 30s).
    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,

    /// Size of a session-recording upload part before it is flushed
    /// (default 16 MiB).
    #[serde(default = "default_recording_part_bytes")]
    pub recording_part_bytes: usize,

    /// JWKS cache TTL for OIDC join methods (default 5 min).
    #[serde(default = "default_jwks_cache_secs")]
    pub jwks_cache_secs: u64,

    /// MERIDIAN_ENABLE_MYSQL_HEALTH_CHECKS (the
    /// `TELEPORT_ENABLE_MYSQL_DB_HEALTH_CHECKS` analogue).
    #[serde(default)]
    pub enable_mysql_health_checks: bool,

    /// MERIDIAN_UNSTABLE_DISABLE_AWS_FIPS analogue, kept for operator
    /// scripts that toggle it.
    #[serde(default)]
    pub unstable_disable_aws_fips: bool,
}

fn default_home() -> String {
    std::env::var("MERIDIAN_HOME").unwrap_or_else(|_| "/var/lib/meridian".to_string())
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            user_cert_ttl_hours: default_user_cert_ttl_hours(),
            bot_max_ttl_days: default_bot_max_ttl_days(),
            hsm_sign_timeout_secs: default_hsm_sign_timeout_secs(),
            peering_keepalive_secs: default_peering_keepalive_secs(),
            dial_timeout_secs: default_dial_timeout_secs(),
            recording_part_bytes: default_recording_part_bytes(),
            jwks_cache_secs: default_jwks_cache_secs(),
            enable_mysql_health_checks: false,
            unstable_disable_aws_fips: false,
        }
    }
}

impl ClusterConfig {
    /// Layers `$MERIDIAN_HOME/cluster.toml` (if present) under environment
    /// variables, then falls back to defaults, expressed through the
    /// `config` crate's builder rather than hand-rolled `env_*` helpers.
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();
        let home = default_home();
        let file_path = format!("{home}/cluster.toml");

        let builder = config::Config::builder()
            .add_source(config::File::with_name(&file_path).required(false))
            .add_source(config::Environment::with_prefix("MERIDIAN").separator("_"));

        match builder.build() {
            Ok(c) => c.try_deserialize().or_else(|_| Ok(Self::default())),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn hsm_sign_timeout(&self) -> Duration {
        Duration::from_secs(self.hsm_sign_timeout_secs)
    }

    pub fn peering_keepalive(&self) -> Duration {
        Duration::from_secs(self.peering_keepalive_secs)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_secs)
    }
}
