//! The persistence contract of spec §6: elections, trustees, ballots,
//! partial decryptions, tallying sessions and results.
//!
//! [`ElectionStore`] is deliberately a trait rather than a single concrete
//! type: [`postgres::PostgresElectionStore`] is the production backend,
//! `tally-test-utils::memory_store` an in-memory one for tests. Both the
//! engine and the API only ever depend on the trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_core::paillier::{Ciphertext, PaillierPublicKey};
use tally_core::shamir::ShareParameters;
use tally_core::threshold::{ChaumPedersenProof, PartialDecryption, ShareCommitment, ThresholdFinalizer};
use tally_types::{CandidateIndex, ElectionId, ElectionState, SessionState, TrusteeIndex};
use uuid::Uuid;

pub mod postgres;

/// Failures from the persistence collaborator (spec §7 `StorageError`),
/// plus the one domain-level conflict ([`StoreError::Conflict`]) every
/// backend must detect via its own uniqueness constraints.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint was violated (duplicate ballot nonce,
    /// duplicate `(election_id, trustee_index)` partial decryption, a
    /// second session for an election, ...).
    #[error("conflict: {0}")]
    Conflict(String),
    /// The persistence backend itself was unavailable or returned an
    /// unexpected error.
    #[error("storage backend error: {0}")]
    Backend(#[source] eyre::Error),
}

/// An election record (spec §3 `Election`).
#[derive(Clone, Debug)]
pub struct ElectionRecord {
    /// Stable opaque identifier.
    pub id: ElectionId,
    /// Human-readable title.
    pub title: String,
    /// Ordered candidate names; position is the canonical candidate order
    /// used throughout ballots, aggregation and results.
    pub candidates: Vec<String>,
    /// The election's Paillier public key.
    pub pk: PaillierPublicKey,
    /// The finalization multiplier `mu`, published at the end of the
    /// trustee ceremony alongside `pk` (see `DESIGN.md` Open Question 1).
    pub finalizer: ThresholdFinalizer,
    /// The parameters the trustee shares were issued under, used to size
    /// each partial decryption's Chaum–Pedersen proof mask.
    pub field: ShareParameters,
    /// `K`: verified partial decryptions required to finalize.
    pub required_trustees: u16,
    /// `N`: total trustee count.
    pub total_trustees: u16,
    /// Election lifecycle state.
    pub state: ElectionState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A trustee's published commitment to its Shamir share (spec §3
/// `KeyShare`, the public half).
#[derive(Clone, Debug)]
pub struct TrusteeRecord {
    /// Which election this trustee belongs to.
    pub election_id: ElectionId,
    /// 1-based trustee index.
    pub index: TrusteeIndex,
    /// `g^{s_i} mod n^2`, checked by `verify_partial` against submissions.
    pub public_commitment: ShareCommitment,
    /// The trustee's Shamir share, encrypted at rest with a key derived
    /// from operator credentials (spec §5). The service never decrypts
    /// this; the trustee decrypts their own share client-side to compute
    /// partial decryptions.
    pub encrypted_share: Vec<u8>,
    /// Whether this trustee slot is active.
    pub status: TrusteeStatus,
}

/// Lifecycle state of a trustee slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrusteeStatus {
    /// Share issued and commitment published; trustee may submit partial
    /// decryptions.
    Active,
    /// Trustee slot revoked; any submission from this index is rejected.
    Revoked,
}

/// A single voter's encrypted ballot (spec §3 `EncryptedBallot`).
#[derive(Clone, Debug)]
pub struct EncryptedBallotRecord {
    /// Unique identifier of this ballot.
    pub vote_id: Uuid,
    /// Which election this ballot was cast in.
    pub election_id: ElectionId,
    /// One ciphertext per candidate, in candidate order: `c_j = E(b_j)`.
    pub ciphertexts: Vec<Ciphertext>,
    /// Replay guard; unique per election.
    pub nonce: String,
    /// Set once aggregation has consumed this ballot.
    pub is_tallied: bool,
}

/// A trustee's partial decryption of every candidate's aggregated
/// ciphertext (spec §3 `PartialDecryption`).
#[derive(Clone, Debug)]
pub struct PartialDecryptionRecord {
    /// Which election this submission is for.
    pub election_id: ElectionId,
    /// Which trustee submitted it.
    pub trustee_index: TrusteeIndex,
    /// One partial decryption per candidate, in candidate order.
    pub partials: Vec<PartialDecryption>,
    /// One Chaum–Pedersen proof per entry in `partials`, same order.
    pub proofs: Vec<ChaumPedersenProof>,
    /// Whether every proof in `proofs` verified against the trustee's
    /// published commitment. Only `verified = true` records count toward
    /// the `K` required for finalization.
    pub verified: bool,
    /// When this record was persisted; finalization breaks ties between
    /// equally-indexed submissions by this field (never happens in
    /// practice since trustee index is unique, kept for determinism of
    /// the "first K" selection rule).
    pub submitted_at: DateTime<Utc>,
}

/// The tallying session record (spec §3 `TallyingSession`).
#[derive(Clone, Debug)]
pub struct TallyingSessionRecord {
    /// One-to-one with an election.
    pub election_id: ElectionId,
    /// Current state.
    pub state: SessionState,
    /// Filled on transition into `decrypting`: one ciphertext per
    /// candidate, `C_j = prod_k c_{k,j} mod n^2`.
    pub aggregated: Option<Vec<Ciphertext>>,
    /// Number of ballots consumed by aggregation; used to bound the
    /// recovered plaintexts against spec §4.3's plaintext-space guarantee.
    pub ballot_count: Option<u64>,
    /// `K`: verified partial decryptions required to finalize.
    pub required_trustees: u16,
    /// `N`: total trustee count.
    pub total_trustees: u16,
    /// Number of verified partial decryptions collected so far.
    pub completed_trustees: u16,
    /// When `start_tally` was called.
    pub started_at: DateTime<Utc>,
    /// When the session reached a terminal state, if any.
    pub completed_at: Option<DateTime<Utc>>,
    /// Set only when `state = failed`.
    pub error_message: Option<String>,
}

/// The outcome of finalizing a tallying session (spec §3 `ElectionResult`).
#[derive(Clone, Debug)]
pub struct ElectionResultRecord {
    /// Which election this result belongs to.
    pub election_id: ElectionId,
    /// Per-candidate vote count, in candidate order.
    pub tally: Vec<(CandidateIndex, u64)>,
    /// Sum of all entries in `tally`.
    pub total_votes: u64,
    /// Lowercase-hex SHA-256 verification hash (spec §6).
    pub verification_hash: String,
    /// Sorted indices of the trustees whose partial decryptions were used.
    pub participating_trustees: Vec<TrusteeIndex>,
    /// Set once `publish_blockchain` succeeds.
    pub blockchain_tx_hash: Option<String>,
}

/// The persistence contract of spec §6, as a Rust trait.
///
/// Every method that mutates state is expected to be atomic from the
/// caller's point of view; the concurrency model of spec §5 layers mutual
/// exclusion for session transitions on top of this trait via
/// [`crate::services::locks`], not inside individual store calls.
#[async_trait]
pub trait ElectionStore: Send + Sync {
    /// Cheap reachability check used by the `/health` endpoint: succeeds iff
    /// the backend can serve a trivial round-trip.
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Fetches an election by id.
    async fn get_election(&self, election_id: ElectionId) -> Result<Option<ElectionRecord>, StoreError>;

    /// Updates an election's lifecycle state.
    async fn set_election_state(
        &self,
        election_id: ElectionId,
        state: ElectionState,
    ) -> Result<(), StoreError>;

    /// Fetches a trustee's published commitment and status.
    async fn get_trustee(
        &self,
        election_id: ElectionId,
        index: TrusteeIndex,
    ) -> Result<Option<TrusteeRecord>, StoreError>;

    /// Accepts a new encrypted ballot. Rejects a reused nonce as
    /// [`StoreError::Conflict`].
    async fn insert_ballot(&self, ballot: EncryptedBallotRecord) -> Result<(), StoreError>;

    /// Returns every ballot not yet consumed by aggregation
    /// (`is_tallied = false`) for an election, in insertion order.
    async fn untallied_ballots(
        &self,
        election_id: ElectionId,
    ) -> Result<Vec<EncryptedBallotRecord>, StoreError>;

    /// Marks the given ballots as tallied. Called exactly once per
    /// election, atomically with the session's transition into
    /// `decrypting`.
    async fn mark_ballots_tallied(
        &self,
        election_id: ElectionId,
        vote_ids: &[Uuid],
    ) -> Result<(), StoreError>;

    /// Fetches the tallying session for an election, if one exists.
    async fn get_session(
        &self,
        election_id: ElectionId,
    ) -> Result<Option<TallyingSessionRecord>, StoreError>;

    /// Creates a new tallying session. Rejects an existing session for the
    /// same election as [`StoreError::Conflict`].
    async fn create_session(&self, session: TallyingSessionRecord) -> Result<(), StoreError>;

    /// Overwrites an existing tallying session with a new snapshot
    /// (state transitions, progress counters, ...).
    async fn update_session(&self, session: TallyingSessionRecord) -> Result<(), StoreError>;

    /// Records a trustee's partial-decryption submission. Rejects a second
    /// submission for the same `(election_id, trustee_index)` as
    /// [`StoreError::Conflict`] (spec invariant I3), regardless of whether
    /// the new submission verifies.
    async fn insert_partial_decryption(
        &self,
        record: PartialDecryptionRecord,
    ) -> Result<(), StoreError>;

    /// Returns every partial-decryption submission recorded for an
    /// election (verified and unverified).
    async fn list_partial_decryptions(
        &self,
        election_id: ElectionId,
    ) -> Result<Vec<PartialDecryptionRecord>, StoreError>;

    /// Writes the final result of a tallying session. Rejects overwriting
    /// an existing result as [`StoreError::Conflict`] (spec invariant I6).
    async fn write_result(&self, result: ElectionResultRecord) -> Result<(), StoreError>;

    /// Fetches a written result, if any.
    async fn get_result(
        &self,
        election_id: ElectionId,
    ) -> Result<Option<ElectionResultRecord>, StoreError>;

    /// Records the blockchain transaction hash of a published result.
    async fn set_result_blockchain_tx(
        &self,
        election_id: ElectionId,
        tx_hash: String,
    ) -> Result<(), StoreError>;

    /// Deletes a `failed` tallying session, per spec §7's operator-reset
    /// recovery policy. Callers (see
    /// [`crate::services::tally_engine::TallyEngine::reset_failed_session`])
    /// are responsible for checking the session is actually `failed` before
    /// calling this; the store itself does not re-check the state.
    async fn delete_session(&self, election_id: ElectionId) -> Result<(), StoreError>;
}
