//! A standard threshold+cooldown circuit breaker. Closed lets requests
//! through and counts failures; once the failure count reaches
//! `threshold` it opens and rejects everything until `cooldown` elapses,
//! then allows one probe through as half-open; a successful probe closes
//! it again, a failed one re-opens.

use chrono::{DateTime, Duration, Utc};
use prometheus::{opts, IntGaugeVec};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    failures: u32,
    opened_at: Option<DateTime<Utc>>,
}

pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
    gauge: IntGaugeVec,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        let gauge = IntGaugeVec::new(
            opts!("meridian_audit_circuit_state", "Audit shipper circuit breaker state (0=closed,1=half-open,2=open)"),
            &["shipper"],
        )
        .expect("static circuit breaker gauge options are valid");
        Self {
            threshold,
            cooldown,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                opened_at: None,
            }),
            gauge,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("circuit breaker lock poisoned").state
    }

    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed_ok = inner
                    .opened_at
                    .map(|since| Utc::now() - since >= self.cooldown)
                    .unwrap_or(false);
                if elapsed_ok {
                    inner.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.opened_at = None;
        self.gauge.with_label_values(&["default"]).set(0);
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Utc::now());
                self.gauge.with_label_values(&["default"]).set(2);
            }
            CircuitState::Closed => {
                inner.failures += 1;
                if inner.failures >= self.threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Utc::now());
                    self.gauge.with_label_values(&["default"]).set(2);
                }
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(3, Duration::seconds(60));
        for _ in 0..3 {
            assert!(cb.allow_request());
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = CircuitBreaker::new(3, Duration::seconds(60));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
