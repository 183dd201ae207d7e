//! The versioned, tagged audit record. `(session_id, index)` is
//! monotonic within a session; `id` is a process-assigned UUID used as
//! the idempotency key for shipping.

use chrono::{DateTime, Utc};
use meridian_core::ids::SessionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub kind: String,
    pub session_id: Option<SessionId>,
    pub index: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub fields: serde_json::Value,
}

impl AuditEvent {
    pub fn new(kind: impl Into<String>, fields: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            session_id: None,
            index: None,
            timestamp: now,
            fields,
        }
    }

    pub fn in_session(mut self, session_id: SessionId, index: u64) -> Self {
        self.session_id = Some(session_id);
        self.index = Some(index);
        self
    }
}
