//! v1 API types.
//!
//! Request/response payloads for the five wire operations of spec §6:
//! `start_tally`, `submit_partial`, `finalize`, `verify_result` and
//! `publish_blockchain`. Election and trustee identifiers travel in the URL
//! path (see `tally-service::api`); these types carry everything else.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::{WireChaumPedersenProof, WirePartialDecryption};
use crate::{CandidateIndex, ElectionId, SessionState, TrusteeIndex};

/// A point-in-time view of a tallying session, returned by `start_tally` and
/// `submit_partial`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// The election this session belongs to.
    pub election_id: ElectionId,
    /// Current state.
    pub state: SessionState,
    /// `K`: the number of verified partial decryptions required to
    /// finalize.
    pub required_trustees: u16,
    /// Number of verified partial decryptions collected so far.
    pub completed_trustees: u16,
    /// RFC 3339 timestamp the session was started.
    pub started_at: String,
    /// RFC 3339 timestamp the session reached a terminal state, if any.
    pub completed_at: Option<String>,
    /// Set only when `state = failed`.
    pub error_message: Option<String>,
}

/// One trustee's submission of its partial decryptions for every candidate
/// of the aggregated ciphertext vector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitPartialRequest {
    /// Which trustee is submitting.
    pub trustee_index: TrusteeIndex,
    /// One partial decryption per candidate, in candidate order.
    pub partials: Vec<WirePartialDecryption>,
    /// One Chaum–Pedersen proof per entry in `partials`, same order.
    pub proofs: Vec<WireChaumPedersenProof>,
}

/// The outcome of finalizing a tallying session: the recovered tally, per
/// spec §3's `ElectionResult`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElectionResultDto {
    /// The election this result belongs to.
    pub election_id: ElectionId,
    /// Per-candidate vote count, in candidate order.
    pub tally: BTreeMap<CandidateIndex, u64>,
    /// Sum of all entries in `tally`.
    pub total_votes: u64,
    /// Lowercase-hex SHA-256 verification hash, per spec §6's canonical
    /// input format.
    pub verification_hash: String,
    /// Set once `publish_blockchain` succeeds.
    pub blockchain_tx_hash: Option<String>,
}

/// Response to `verify_result`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyResultResponse {
    /// Whether the recomputed hash matches the persisted result.
    pub valid: bool,
    /// The recomputed verification hash, for operator inspection even on a
    /// mismatch.
    pub recomputed_hash: String,
}

/// Response to `publish_blockchain`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublishBlockchainResponse {
    /// The transaction hash returned by the external publisher.
    pub tx_hash: String,
}
