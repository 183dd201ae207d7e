//! The identity claims carried, JSON-encoded, in both the SSH
//! certificate's critical extensions and the X.509 certificate's custom
//! extension, the same bytes in both places so a proxy only has to
//! parse one format to authorize either transport.

use chrono::{DateTime, Utc};
use meridian_core::ids::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub user: UserId,
    pub logins: Vec<String>,
    pub route_info: String,
    pub mfa_required: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdentityClaims {
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("IdentityClaims always serializes")
    }
}
