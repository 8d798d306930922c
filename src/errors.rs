//! Typed error hierarchy for the sitewright orchestrator.
//!
//! Two top-level enums cover the two subsystems:
//! - `StoreError` — session persistence and locking failures
//! - `OrchestratorError` — session lifecycle and step execution failures
//!
//! Every variant is an expected, recoverable-by-caller condition: a caller
//! retries, skips, or surfaces the message to an end user. Nothing here is
//! a fatal fault.

use thiserror::Error;

/// Errors from the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session {id} not found or expired")]
    NotFound { id: String },

    #[error("Could not acquire session lock for {id}: {source}")]
    LockUnavailable {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read session record at {path}: {source}")]
    ReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write session record at {path}: {source}")]
    WriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt session record at {path}: {source}")]
    Corrupt {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Whether this error means the session does not exist (missing or expired).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors from the orchestrator's public operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Session {id} not found or expired")]
    SessionNotFound { id: String },

    #[error("Session {id} is in {actual} phase, step requires {required}")]
    InvalidPhase {
        id: String,
        required: String,
        actual: String,
    },

    #[error("Could not acquire session lock for {id}")]
    LockUnavailable { id: String },

    #[error("Unknown step '{step}'")]
    UnknownStep { step: String },

    #[error("Collaborator failed for step '{step}': {message}")]
    Collaborator { step: String, message: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => Self::SessionNotFound { id },
            StoreError::LockUnavailable { id, .. } => Self::LockUnavailable { id },
            other => Self::Store(other),
        }
    }
}

impl OrchestratorError {
    /// Whether this error means the session does not exist (missing or expired).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_is_matchable() {
        let err = StoreError::NotFound {
            id: "sess_abc".into(),
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("sess_abc"));
    }

    #[test]
    fn store_lock_unavailable_carries_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::WouldBlock, "locked");
        let err = StoreError::LockUnavailable {
            id: "sess_abc".into(),
            source: io_err,
        };
        match &err {
            StoreError::LockUnavailable { id, source } => {
                assert_eq!(id, "sess_abc");
                assert_eq!(source.kind(), std::io::ErrorKind::WouldBlock);
            }
            _ => panic!("Expected LockUnavailable"),
        }
    }

    #[test]
    fn orchestrator_error_converts_store_not_found() {
        let err: OrchestratorError = StoreError::NotFound {
            id: "sess_x".into(),
        }
        .into();
        assert!(matches!(
            err,
            OrchestratorError::SessionNotFound { ref id } if id == "sess_x"
        ));
    }

    #[test]
    fn orchestrator_error_converts_store_lock_unavailable() {
        let io_err = std::io::Error::other("flock failed");
        let err: OrchestratorError = StoreError::LockUnavailable {
            id: "sess_x".into(),
            source: io_err,
        }
        .into();
        assert!(matches!(err, OrchestratorError::LockUnavailable { .. }));
    }

    #[test]
    fn invalid_phase_names_both_phases() {
        let err = OrchestratorError::InvalidPhase {
            id: "sess_x".into(),
            required: "build".into(),
            actual: "mockup".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("build"));
        assert!(msg.contains("mockup"));
    }

    #[test]
    fn collaborator_error_passes_message_through() {
        let err = OrchestratorError::Collaborator {
            step: "stylist".into(),
            message: "provider timeout".into(),
        };
        assert!(err.to_string().contains("provider timeout"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&StoreError::NotFound { id: "x".into() });
        assert_std_error(&OrchestratorError::UnknownStep { step: "x".into() });
    }
}
