#![deny(missing_docs)]
//! Shared identifiers, wire DTOs and versioned API types for the tallying
//! core.
//!
//! This crate groups together the strongly-typed values and message
//! structures shared between `tally-service` and anything talking to it over
//! the wire. It provides:
//!
//! * Thin, serde-friendly wrappers around election/trustee/candidate
//!   identifiers.
//! * The big-endian/base64 ciphertext wire format fixed by the system's
//!   external interface (see [`crypto`]).
//! * The shared error-kind taxonomy used to report failures across the API
//!   boundary (see [`error`]).
//! * Versioned request/response types for the HTTP API (see [`api`]).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod api;
pub mod crypto;
pub mod error;

/// Opaque, externally stable identifier of an election.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElectionId(Uuid);

impl ElectionId {
    /// Generates a fresh random election id.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing uuid, e.g. one read back from storage.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying uuid.
    pub fn into_uuid(self) -> Uuid {
        self.0
    }

    /// Big-endian 16-byte encoding, as required by the verification hash
    /// format.
    pub fn to_be_bytes(self) -> [u8; 16] {
        *self.0.as_bytes()
    }
}

impl fmt::Display for ElectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// 1-based trustee index, `i` in the spec's `{1..N}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrusteeIndex(u16);

impl TrusteeIndex {
    /// Wraps a raw 1-based index. Does not validate bounds against an
    /// election's trustee count; callers check that where the count is
    /// known.
    pub fn new(index: u16) -> Self {
        Self(index)
    }

    /// The raw index value.
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for TrusteeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// 1-based candidate index, `j` in the spec's `1..M`; candidate order is
/// canonical and carried by the election record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateIndex(u16);

impl CandidateIndex {
    /// Wraps a raw 1-based candidate index.
    pub fn new(index: u16) -> Self {
        Self(index)
    }

    /// The raw index value.
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for CandidateIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle state of an election record, independent of its tallying
/// session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionState {
    /// Created but not yet open for ballots.
    Pending,
    /// Open for ballots.
    Active,
    /// A tallying session has been started for this election.
    Tallying,
    /// The tallying session reached `completed` and published a result.
    Completed,
    /// The tallying session reached `failed`.
    Failed,
}

/// Tallying session state, per the state machine in `tally-service`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// `start_tally` has been called; aggregation has not yet run.
    Initiated,
    /// Aggregating ballots into the per-candidate ciphertext vector.
    Aggregating,
    /// Aggregation is complete; collecting partial decryptions.
    Decrypting,
    /// Combining partial decryptions and writing the result.
    Finalizing,
    /// The result has been written and is immutable.
    Completed,
    /// The session failed and requires an operator reset.
    Failed,
}
