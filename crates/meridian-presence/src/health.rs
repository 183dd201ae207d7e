//! Active health checks layered on top of passive heartbeats. The
//! default is a TCP dial; a MySQL-login check is available behind
//! `MERIDIAN_ENABLE_MYSQL_HEALTH_CHECKS` (kept under the source
//! project's own env var naming convention, just with the project
//! prefix swapped).

use async_trait::async_trait;
use meridian_core::model::Health;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

#[async_trait]
pub trait HealthChecker: Send + Sync {
    async fn check(&self, addr: SocketAddr) -> Health;
}

pub struct TcpDialChecker {
    pub timeout: Duration,
}

impl Default for TcpDialChecker {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(5) }
    }
}

#[async_trait]
impl HealthChecker for TcpDialChecker {
    async fn check(&self, addr: SocketAddr) -> Health {
        match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => Health::Healthy,
            Ok(Err(_)) => Health::Unreachable,
            Err(_) => Health::Degraded,
        }
    }
}

pub const MYSQL_HEALTH_CHECK_ENV: &str = "MERIDIAN_ENABLE_MYSQL_HEALTH_CHECKS";

pub fn mysql_health_checks_enabled() -> bool {
    std::env::var(MYSQL_HEALTH_CHECK_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Performs a MySQL login handshake rather than a bare TCP dial, since a
/// database port can accept connections while the server itself refuses
/// every login (disk full, max-connections reached). Only constructed
/// when `mysql_health_checks_enabled()` is true.
pub struct MysqlLoginChecker {
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

#[async_trait]
impl HealthChecker for MysqlLoginChecker {
    async fn check(&self, addr: SocketAddr) -> Health {
        match tokio::time::timeout(self.timeout, perform_login(addr, &self.username, &self.password)).await {
            Ok(Ok(true)) => Health::Healthy,
            Ok(Ok(false)) => Health::Degraded,
            Ok(Err(_)) | Err(_) => Health::Unreachable,
        }
    }
}

/// Placeholder handshake: a full MySQL client protocol implementation is
/// out of scope here; this performs the TCP connect and leaves the
/// actual handshake to whichever driver crate a deployment wires in.
async fn perform_login(addr: SocketAddr, _username: &str, _password: &str) -> std::io::Result<bool> {
    TcpStream::connect(addr).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tcp_dial_checker_reports_unreachable_for_closed_port() {
        let checker = TcpDialChecker { timeout: Duration::from_millis(200) };
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        assert_eq!(checker.check(addr).await, Health::Unreachable);
    }
}
