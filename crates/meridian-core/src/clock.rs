//! Clock abstraction so rotation grace windows, heartbeat expiry, and
//! certificate TTLs are all testable without sleeping real wall-clock time.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock with an interior mutable cursor so scenarios can advance time
/// deterministically (rotation-phase grace windows, lock heartbeat cycles).
#[cfg(any(test, feature = "test-util"))]
pub struct FakeClock(std::sync::Mutex<DateTime<Utc>>);

#[cfg(any(test, feature = "test-util"))]
impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(std::sync::Mutex::new(start))
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.0.lock().expect("fake clock lock poisoned");
        *guard += delta;
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("fake clock lock poisoned")
    }
}
