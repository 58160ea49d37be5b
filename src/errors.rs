// Error taxonomy for the back-office core
//
// Business conditions are typed variants the caller is expected to handle.
// Only `Store` is unrecoverable: the backing store could not be reached or
// refused a write.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::entities::{EntityKind, EntityRef};
use crate::permissions::Action;
use crate::storage::StorageError;

/// Failures of the backing store (the hosted database collaborator)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected for {entity}: {reason}")]
    WriteRejected { entity: EntityRef, reason: String },

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Coarse classification exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthenticated,
    PermissionDenied,
    NotFound,
    InvalidTransition,
    ValidationFailed,
    MissingContact,
    PartialFailure,
    Unavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::MissingContact => "missing_contact",
            ErrorKind::PartialFailure => "partial_failure",
            ErrorKind::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("permission denied for {action}: {reason}")]
    PermissionDenied { action: Action, reason: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("{entity} cannot move from '{from}' to '{to}': {reason}")]
    InvalidTransition {
        entity: EntityRef,
        from: String,
        to: String,
        reason: String,
    },

    #[error("edit window expired for {entity} at {expired_at}")]
    EditWindowExpired {
        entity: EntityRef,
        expired_at: DateTime<Utc>,
    },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("no reachable contact for {recipient}: {detail}")]
    MissingContact { recipient: String, detail: String },

    #[error("{message} (orphaned storage objects: {})", .orphaned.join(", "))]
    PartialFailure {
        message: String,
        orphaned: Vec<String>,
    },

    #[error("actor {actor_id} is the last active admin and cannot leave the admin role")]
    LastAdmin { actor_id: Uuid },

    #[error("object storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DeskError {
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        DeskError::NotFound { kind, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DeskError::ValidationFailed(message.into())
    }

    pub fn invalid_transition(
        entity: EntityRef,
        from: impl Into<String>,
        to: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DeskError::InvalidTransition {
            entity,
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DeskError::Unauthenticated => ErrorKind::Unauthenticated,
            DeskError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            DeskError::NotFound { .. } => ErrorKind::NotFound,
            DeskError::InvalidTransition { .. } | DeskError::EditWindowExpired { .. } => {
                ErrorKind::InvalidTransition
            }
            DeskError::ValidationFailed(_) | DeskError::LastAdmin { .. } => {
                ErrorKind::ValidationFailed
            }
            DeskError::MissingContact { .. } => ErrorKind::MissingContact,
            DeskError::PartialFailure { .. } => ErrorKind::PartialFailure,
            DeskError::Storage(_) | DeskError::Timeout { .. } | DeskError::Store(_) => {
                ErrorKind::Unavailable
            }
        }
    }

    /// Fine-grained tag reported as `errorKind`
    pub fn code(&self) -> &'static str {
        match self {
            DeskError::EditWindowExpired { .. } => "edit_window_expired",
            DeskError::LastAdmin { .. } => "last_admin",
            DeskError::Timeout { .. } => "timeout",
            other => other.kind().as_str(),
        }
    }

    /// False only for backing-store failures, which callers must escalate
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DeskError::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_window_is_an_invalid_transition_with_its_own_code() {
        let err = DeskError::EditWindowExpired {
            entity: EntityRef::Policy(Uuid::new_v4()),
            expired_at: Utc::now(),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(err.code(), "edit_window_expired");
        assert!(err.to_string().contains("edit window expired"));
    }

    #[test]
    fn store_failures_are_not_recoverable() {
        let err: DeskError = StoreError::Unavailable("connection refused".into()).into();
        assert!(!err.is_recoverable());
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(DeskError::Unauthenticated.is_recoverable());
    }

    #[test]
    fn partial_failure_lists_orphans() {
        let err = DeskError::PartialFailure {
            message: "document removed".into(),
            orphaned: vec!["policies/a.pdf".into(), "policies/b.pdf".into()],
        };
        assert!(err.to_string().contains("policies/a.pdf, policies/b.pdf"));
    }
}
