//! Error types for jobguard.

use thiserror::Error;

use crate::lock::LockState;

#[derive(Debug, Error)]
pub enum Error {
    /// Another invocation holds the lease for this identity. The job body did not run.
    #[error("failed to acquire lock, {identity} already running")]
    AlreadyLocked { identity: String },

    /// The configured store has no lock backend with atomic create-if-absent.
    #[error("unsupported lock backend: {scheme:?}")]
    UnsupportedBackend { scheme: String },

    #[error("invalid lock state transition: {from} -> {to}")]
    InvalidTransition { from: LockState, to: LockState },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the failure is lock contention rather than an infrastructure fault.
    pub fn is_already_locked(&self) -> bool {
        matches!(self, Error::AlreadyLocked { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_locked_message_names_identity() {
        let err = Error::AlreadyLocked {
            identity: "send_report".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to acquire lock, send_report already running"
        );
        assert!(err.is_already_locked());
    }

    #[test]
    fn transport_errors_are_not_contention() {
        let err = Error::Io(std::io::Error::other("connection reset"));
        assert!(!err.is_already_locked());
    }
}
