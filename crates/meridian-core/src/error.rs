//! The ten error kinds surfaced uniformly across the RPC/HTTP API,
//! plus the per-crate `thiserror` wrapper every component error converts
//! into at its boundary.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    CompareFailed,
    PermissionDenied,
    Unauthenticated,
    ResourceExhausted,
    Unavailable,
    FailedPrecondition,
    Canceled,
    DeadlineExceeded,
}

impl ErrorKind {
    /// CLI exit codes: 0 success, 1 user error, 2 validation,
    /// 3 permission denied, 4 not found, 5 unavailable. Non-CLI kinds fall
    /// back to the generic "user error" code.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::InvalidArgument => 2,
            ErrorKind::PermissionDenied | ErrorKind::Unauthenticated => 3,
            ErrorKind::NotFound => 4,
            ErrorKind::Unavailable => 5,
            _ => 1,
        }
    }
}

#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct MeridianError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl MeridianError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FailedPrecondition, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub fn compare_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CompareFailed, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceExhausted, message)
    }

    /// Strips the cause chain for user-visible surfaces; debug logs should
    /// use `{:?}` on the original error instead, which retains `source`.
    pub fn public_message(&self) -> String {
        format!("{:?}: {}", self.kind, self.message)
    }
}
