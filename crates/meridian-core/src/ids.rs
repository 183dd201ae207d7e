//! Newtype identifiers. Kept distinct so the compiler rejects passing, say,
//! a `BotId` where a `SessionId` is expected, cheaper than tracking the
//! mistake down at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(ClusterId);
string_id!(UserId);
string_id!(BotId);
string_id!(BotInstanceId);
string_id!(RoleName);
string_id!(AccessListId);
string_id!(TokenName);
string_id!(SessionId);
string_id!(LockId);
string_id!(RequestId);
string_id!(ResourceId);
string_id!(DeviceId);

/// A store revision. Monotonically increasing within a backend; zero is
/// never a valid assigned revision (it means "does not exist yet").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Revision(pub u64);

impl Revision {
    pub const NONE: Revision = Revision(0);
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
