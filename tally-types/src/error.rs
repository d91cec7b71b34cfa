//! Shared error-kind taxonomy (spec §7), carried across the API boundary so
//! clients can branch on failure class without string-matching messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure kind plus a human-readable message, serialized as the body of
/// any non-2xx API response.
#[derive(Debug, Clone, Serialize, Deserialize, Error, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input out of range (e.g. plaintext ≥ n, missing trustee index).
    /// Never retried.
    #[error("domain error: {message}")]
    Domain {
        /// Human-readable detail.
        message: String,
    },
    /// Operation requested in the wrong session state. Caller must re-read
    /// current state before retrying.
    #[error("state error: {message}")]
    State {
        /// Human-readable detail.
        message: String,
    },
    /// Keygen failure, proof verification failure, or combine failure.
    #[error("crypto error: {message}")]
    Crypto {
        /// Human-readable detail.
        message: String,
    },
    /// The persistence collaborator was unavailable; the state machine did
    /// not partially advance.
    #[error("storage error: {message}")]
    Storage {
        /// Human-readable detail.
        message: String,
    },
    /// A caller-supplied deadline expired; treat as not attempted.
    #[error("timeout error: {message}")]
    Timeout {
        /// Human-readable detail.
        message: String,
    },
}

impl ErrorKind {
    /// The conventional HTTP status code for this error kind, per spec §7.
    /// `Crypto` is ambiguous in the spec (500 if internal, 400 if
    /// attributable to the submitter); API handlers that can distinguish the
    /// two cases override this default of 400 for submitter-attributable
    /// proof failures.
    pub fn http_status_code(&self) -> u16 {
        match self {
            ErrorKind::Domain { .. } => 400,
            ErrorKind::State { .. } => 409,
            ErrorKind::Crypto { .. } => 400,
            ErrorKind::Storage { .. } => 502,
            ErrorKind::Timeout { .. } => 504,
        }
    }
}
