//! The `TallyingSession` state machine (spec §4.3).
//!
//! [`TallyEngine`] is the constructor-injected collaborator that coordinates
//! ballot aggregation, partial-decryption collection and finalization. It
//! composes an [`ElectionStore`] for persistence, an [`AuditLog`] for the
//! append-only trail, and [`ElectionLocks`] to serialize transitions per
//! election (spec §5).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use rand::rngs::OsRng;
use serde_json::json;
use tally_core::paillier;
use tally_core::threshold;
use tally_types::{CandidateIndex, ElectionId, ElectionState, SessionState, TrusteeIndex};

use crate::metrics::{
    METRICS_ID_AGGREGATE_DURATION, METRICS_ID_BALLOTS_AGGREGATED, METRICS_ID_FINALIZE_DURATION,
    METRICS_ID_PARTIALS_DUPLICATE, METRICS_ID_PARTIALS_REJECTED, METRICS_ID_PARTIALS_VERIFIED,
    METRICS_ID_SESSIONS_COMPLETED, METRICS_ID_SESSIONS_FAILED, METRICS_ID_SESSIONS_OPEN,
};
use crate::services::audit_log::{AuditEntryRecord, AuditLog, AuditStatus};
use crate::services::election_store::{
    ElectionStore, ElectionResultRecord, PartialDecryptionRecord, StoreError, TallyingSessionRecord,
};
use crate::services::locks::ElectionLocks;
use crate::services::verification_hash;

/// A trustee's submission of its partial decryptions for every candidate,
/// already decoded from the wire format.
pub struct PartialDecryptionSubmission {
    /// Which trustee is submitting.
    pub trustee_index: TrusteeIndex,
    /// One partial decryption per candidate, in candidate order.
    pub partials: Vec<threshold::PartialDecryption>,
    /// One Chaum–Pedersen proof per entry in `partials`, same order.
    pub proofs: Vec<threshold::ChaumPedersenProof>,
}

/// Failure modes of [`TallyEngine`] operations, mapped to the spec §7
/// error taxonomy by `tally-service::api::errors`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No election with this id exists.
    #[error("election {0} not found")]
    ElectionNotFound(ElectionId),
    /// `start_tally` was called for an election not in `active` state.
    #[error("election {0} is not active")]
    ElectionNotActive(ElectionId),
    /// `start_tally` was called for an election with zero accepted ballots.
    #[error("election {0} has no accepted ballots")]
    NoBallotsAccepted(ElectionId),
    /// A tallying session already exists for this election.
    #[error("a tallying session for election {0} already exists")]
    SessionAlreadyExists(ElectionId),
    /// No tallying session exists for this election.
    #[error("no tallying session for election {0}")]
    SessionNotFound(ElectionId),
    /// The session is not in the state the requested operation requires.
    #[error("session for election {election_id} is {actual:?}, expected {expected:?}")]
    WrongState {
        /// Which election.
        election_id: ElectionId,
        /// The state the session is actually in.
        actual: SessionState,
        /// The state the operation required.
        expected: SessionState,
    },
    /// Unknown trustee index for this election.
    #[error("trustee {trustee} is not registered for election {election_id}")]
    UnknownTrustee {
        /// Which election.
        election_id: ElectionId,
        /// The unrecognized trustee index.
        trustee: TrusteeIndex,
    },
    /// The trustee slot has been revoked and may no longer submit.
    #[error("trustee {trustee} has been revoked for election {election_id}")]
    TrusteeRevoked {
        /// Which election.
        election_id: ElectionId,
        /// The revoked trustee.
        trustee: TrusteeIndex,
    },
    /// Trustee {trustee} already submitted a partial decryption for this
    /// election (spec invariant I3).
    #[error("trustee {trustee} already submitted a partial decryption for election {election_id}")]
    DuplicateSubmission {
        /// Which election.
        election_id: ElectionId,
        /// The trustee that already submitted.
        trustee: TrusteeIndex,
    },
    /// The submission did not carry one partial/proof per candidate.
    #[error("expected {expected} partial decryptions, got {got}")]
    MalformedSubmission {
        /// Number of candidates in the election.
        expected: usize,
        /// Number of partials/proofs actually submitted.
        got: usize,
    },
    /// Fewer than `K` verified partial decryptions are available.
    #[error("finalize requires {required} verified partial decryptions, have {got}")]
    TooFewTrustees {
        /// `K`.
        required: u16,
        /// Verified partial decryptions on hand.
        got: u16,
    },
    /// A recovered candidate tally exceeded the number of accepted
    /// ballots, violating invariant I1 — almost certainly a sign that
    /// partial decryptions were computed under the wrong key.
    #[error("candidate tally {value} exceeds {ballots} accepted ballots")]
    PlaintextOverflow {
        /// The (invalid) recovered value.
        value: u64,
        /// The number of accepted ballots.
        ballots: u64,
    },
    /// Lagrange combination failed.
    #[error(transparent)]
    Combine(#[from] tally_core::threshold::CombineError),
    /// The persistence collaborator failed.
    #[error(transparent)]
    Storage(#[from] StoreError),
    /// The configured deadline for `operation` elapsed before the
    /// CPU-bound arithmetic finished. Per spec §5/§7, this is treated as if
    /// the call was never attempted: no session mutation precedes this
    /// error, so the caller sees the session in the state it was in before
    /// the call (unlike other engine errors, which transition the session
    /// to `failed`).
    #[error("{operation} exceeded its deadline")]
    Timeout {
        /// Which operation timed out, `"aggregate"` or `"finalize"`.
        operation: &'static str,
    },
    /// A blocking computation task panicked.
    #[error("background computation task failed: {0}")]
    TaskJoin(#[source] tokio::task::JoinError),
}

/// The result of the CPU-bound half of finalization, before
/// `participating_trustees`/`blockchain_tx_hash` are attached to form a full
/// [`ElectionResultRecord`].
struct CombinedTally {
    tally: Vec<(CandidateIndex, u64)>,
    total_votes: u64,
    verification_hash: String,
}

/// Coordinates ballot aggregation, partial-decryption collection and
/// finalization for every election's tallying session.
///
/// Holds its collaborators as trait objects rather than generic
/// parameters so a single concrete `TallyEngine` can sit in `axum` state
/// regardless of which `ElectionStore`/`AuditLog` backend the binary
/// wires up (`PostgresElectionStore` in production, the in-memory store
/// from `tally-test-utils` in tests).
#[derive(Clone)]
pub struct TallyEngine {
    store: Arc<dyn ElectionStore>,
    audit: Arc<dyn AuditLog>,
    locks: ElectionLocks,
    aggregate_timeout: Duration,
    finalize_timeout: Duration,
}

/// Default deadline for [`TallyEngine::start_tally`]'s aggregation step,
/// matching `TallyServiceConfig::aggregate_timeout`'s default.
const DEFAULT_AGGREGATE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default deadline for [`TallyEngine::finalize`]'s combine step, matching
/// `TallyServiceConfig::finalize_timeout`'s default.
const DEFAULT_FINALIZE_TIMEOUT: Duration = Duration::from_secs(60);

impl TallyEngine {
    /// Builds an engine over the given persistence and audit collaborators,
    /// using the default aggregate/finalize deadlines. Use
    /// [`TallyEngine::with_timeouts`] to override them from
    /// [`crate::config::TallyServiceConfig`].
    pub fn new(store: Arc<dyn ElectionStore>, audit: Arc<dyn AuditLog>) -> Self {
        Self {
            store,
            audit,
            locks: ElectionLocks::default(),
            aggregate_timeout: DEFAULT_AGGREGATE_TIMEOUT,
            finalize_timeout: DEFAULT_FINALIZE_TIMEOUT,
        }
    }

    /// Overrides the deadlines `start_tally`'s aggregation step and
    /// `finalize`'s combine step are allowed to run for (spec §5/§7).
    pub fn with_timeouts(mut self, aggregate_timeout: Duration, finalize_timeout: Duration) -> Self {
        self.aggregate_timeout = aggregate_timeout;
        self.finalize_timeout = finalize_timeout;
        self
    }

    async fn audit(
        &self,
        election_id: ElectionId,
        operation: &str,
        actor: &str,
        details: serde_json::Value,
        status: AuditStatus,
    ) {
        let entry = AuditEntryRecord {
            election_id,
            operation: operation.to_string(),
            actor: actor.to_string(),
            details,
            status,
            timestamp: Utc::now(),
        };
        if let Err(err) = self.audit.append(entry).await {
            // Per spec §7 audit entries are written for every outcome, but
            // a failure to *write* the audit trail is not itself fatal to
            // the operation that triggered it; it is logged loudly instead.
            tracing::error!("failed to append audit entry for {election_id}: {err}");
        }
    }

    /// `start_tally`: creates the session, aggregates every accepted ballot
    /// into the per-candidate ciphertext vector, and freezes further ballot
    /// acceptance for the election — all inside one exclusive, totally
    /// ordered section per spec §5.
    pub async fn start_tally(
        &self,
        election_id: ElectionId,
    ) -> Result<TallyingSessionRecord, EngineError> {
        let _guard = self.locks.lock(election_id).await;

        if self.store.get_session(election_id).await?.is_some() {
            return Err(EngineError::SessionAlreadyExists(election_id));
        }

        let election = self
            .store
            .get_election(election_id)
            .await?
            .ok_or(EngineError::ElectionNotFound(election_id))?;
        if !matches!(election.state, ElectionState::Active) {
            return Err(EngineError::ElectionNotActive(election_id));
        }

        let ballots = self.store.untallied_ballots(election_id).await?;
        if ballots.is_empty() {
            return Err(EngineError::NoBallotsAccepted(election_id));
        }

        let session = TallyingSessionRecord {
            election_id,
            state: SessionState::Initiated,
            aggregated: None,
            ballot_count: None,
            required_trustees: election.required_trustees,
            total_trustees: election.total_trustees,
            completed_trustees: 0,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        };
        self.store.create_session(session.clone()).await?;
        metrics::gauge!(METRICS_ID_SESSIONS_OPEN).increment(1);
        self.audit(
            election_id,
            "start_tally",
            "operator",
            json!({ "ballot_count": ballots.len() }),
            AuditStatus::Success,
        )
        .await;

        match self.aggregate_and_freeze(election_id, &election, ballots).await {
            Ok(session) => Ok(session),
            // Nothing has been persisted yet when these occur: the
            // computation runs before `mark_ballots_tallied`/`create_session`
            // updates. Leave the session as `initiated` rather than failing
            // it, so the caller can simply retry.
            Err(err @ (EngineError::Timeout { .. } | EngineError::TaskJoin(_))) => Err(err),
            Err(err) => {
                self.fail_session(election_id, &err).await;
                Err(err)
            }
        }
    }

    /// `initiated -> aggregating -> decrypting`: computes `C_1..C_M` as the
    /// homomorphic product of every accepted ballot's per-candidate
    /// ciphertext, then freezes the ballot set by marking it tallied.
    ///
    /// Runs inside the same exclusive section `start_tally` acquired;
    /// factored out only so errors can be funneled through a single
    /// `fail_session` call.
    async fn aggregate_and_freeze(
        &self,
        election_id: ElectionId,
        election: &crate::services::election_store::ElectionRecord,
        ballots: Vec<crate::services::election_store::EncryptedBallotRecord>,
    ) -> Result<TallyingSessionRecord, EngineError> {
        let start = std::time::Instant::now();
        let candidate_count = election.candidates.len();

        let pk = election.pk.clone();
        let ballots_for_compute = ballots.clone();
        let task = tokio::task::spawn_blocking(move || {
            let mut rng = OsRng;
            let mut aggregated = Vec::with_capacity(candidate_count);
            for candidate in 0..candidate_count {
                let column: Vec<_> = ballots_for_compute
                    .iter()
                    .map(|ballot| ballot.ciphertexts[candidate].clone())
                    .collect();
                aggregated.push(paillier::aggregate(&pk, &column, &mut rng));
            }
            aggregated
        });
        let aggregated = match tokio::time::timeout(self.aggregate_timeout, task).await {
            Ok(Ok(aggregated)) => aggregated,
            Ok(Err(join_err)) => return Err(EngineError::TaskJoin(join_err)),
            Err(_) => {
                return Err(EngineError::Timeout {
                    operation: "aggregate",
                });
            }
        };

        let vote_ids: Vec<_> = ballots.iter().map(|b| b.vote_id).collect();
        self.store
            .mark_ballots_tallied(election_id, &vote_ids)
            .await?;

        let session = TallyingSessionRecord {
            election_id,
            state: SessionState::Decrypting,
            aggregated: Some(aggregated),
            ballot_count: Some(ballots.len() as u64),
            required_trustees: election.required_trustees,
            total_trustees: election.total_trustees,
            completed_trustees: 0,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        };
        self.store.update_session(session.clone()).await?;
        self.store
            .set_election_state(election_id, ElectionState::Tallying)
            .await?;

        metrics::histogram!(METRICS_ID_AGGREGATE_DURATION).record(start.elapsed().as_secs_f64() * 1000.0);
        metrics::counter!(METRICS_ID_BALLOTS_AGGREGATED).increment(ballots.len() as u64);
        self.audit(
            election_id,
            "aggregate",
            "system",
            json!({ "ballot_count": ballots.len(), "candidates": candidate_count }),
            AuditStatus::Success,
        )
        .await;

        Ok(session)
    }

    /// `submit_partial`: verifies and records one trustee's partial
    /// decryption of every candidate's aggregated ciphertext.
    ///
    /// Returns the updated session snapshot regardless of whether the
    /// submitted proof verified — a failed proof is recorded with
    /// `verified = false` and does not advance `completed_trustees` (spec
    /// §4.3's local, non-fatal partial-decryption error handling).
    pub async fn submit_partial(
        &self,
        election_id: ElectionId,
        submission: PartialDecryptionSubmission,
    ) -> Result<TallyingSessionRecord, EngineError> {
        let _guard = self.locks.lock(election_id).await;

        let mut session = self
            .store
            .get_session(election_id)
            .await?
            .ok_or(EngineError::SessionNotFound(election_id))?;
        if !matches!(session.state, SessionState::Decrypting) {
            return Err(EngineError::WrongState {
                election_id,
                actual: session.state,
                expected: SessionState::Decrypting,
            });
        }

        let election = self
            .store
            .get_election(election_id)
            .await?
            .ok_or(EngineError::ElectionNotFound(election_id))?;
        let candidate_count = election.candidates.len();
        if submission.partials.len() != candidate_count || submission.proofs.len() != candidate_count {
            return Err(EngineError::MalformedSubmission {
                expected: candidate_count,
                got: submission.partials.len().max(submission.proofs.len()),
            });
        }

        let trustee = self
            .store
            .get_trustee(election_id, submission.trustee_index)
            .await?
            .ok_or(EngineError::UnknownTrustee {
                election_id,
                trustee: submission.trustee_index,
            })?;
        if matches!(
            trustee.status,
            crate::services::election_store::TrusteeStatus::Revoked
        ) {
            return Err(EngineError::TrusteeRevoked {
                election_id,
                trustee: submission.trustee_index,
            });
        }

        let already_submitted = self
            .store
            .list_partial_decryptions(election_id)
            .await?
            .iter()
            .any(|record| record.trustee_index == submission.trustee_index);
        if already_submitted {
            metrics::counter!(METRICS_ID_PARTIALS_DUPLICATE).increment(1);
            self.audit(
                election_id,
                "submit_partial",
                &submission.trustee_index.to_string(),
                json!({ "reason": "duplicate" }),
                AuditStatus::Failed,
            )
            .await;
            return Err(EngineError::DuplicateSubmission {
                election_id,
                trustee: submission.trustee_index,
            });
        }

        let aggregated = session
            .aggregated
            .as_ref()
            .expect("aggregated is set once state reaches decrypting");
        let verified = (0..candidate_count).all(|j| {
            threshold::verify_partial(
                &election.pk,
                &aggregated[j],
                election.total_trustees,
                &submission.partials[j],
                &submission.proofs[j],
                &trustee.public_commitment,
            )
        });

        let record = PartialDecryptionRecord {
            election_id,
            trustee_index: submission.trustee_index,
            partials: submission.partials,
            proofs: submission.proofs,
            verified,
            submitted_at: Utc::now(),
        };
        self.store.insert_partial_decryption(record).await?;

        if verified {
            session.completed_trustees += 1;
            self.store.update_session(session.clone()).await?;
            metrics::counter!(METRICS_ID_PARTIALS_VERIFIED).increment(1);
            self.audit(
                election_id,
                "submit_partial",
                &submission.trustee_index.to_string(),
                json!({ "verified": true }),
                AuditStatus::Success,
            )
            .await;
        } else {
            metrics::counter!(METRICS_ID_PARTIALS_REJECTED).increment(1);
            self.audit(
                election_id,
                "submit_partial",
                &submission.trustee_index.to_string(),
                json!({ "verified": false, "reason": "proof did not verify" }),
                AuditStatus::Failed,
            )
            .await;
        }

        Ok(session)
    }

    /// `finalize`: combines the first `K` verified partial decryptions
    /// (lowest trustee index, ties broken by earliest submission) into the
    /// per-candidate plaintexts, asserts the plaintext-space bound, and
    /// writes the `ElectionResult`.
    pub async fn finalize(
        &self,
        election_id: ElectionId,
    ) -> Result<ElectionResultRecord, EngineError> {
        let _guard = self.locks.lock(election_id).await;
        let start = std::time::Instant::now();

        let mut session = self
            .store
            .get_session(election_id)
            .await?
            .ok_or(EngineError::SessionNotFound(election_id))?;
        if !matches!(session.state, SessionState::Decrypting) {
            return Err(EngineError::WrongState {
                election_id,
                actual: session.state,
                expected: SessionState::Decrypting,
            });
        }

        let mut verified: Vec<_> = self
            .store
            .list_partial_decryptions(election_id)
            .await?
            .into_iter()
            .filter(|record| record.verified)
            .collect();
        verified.sort_by(|a, b| {
            a.trustee_index
                .cmp(&b.trustee_index)
                .then_with(|| a.submitted_at.cmp(&b.submitted_at))
        });

        if verified.len() < session.required_trustees as usize {
            return Err(EngineError::TooFewTrustees {
                required: session.required_trustees,
                got: verified.len() as u16,
            });
        }
        let quorum: Vec<_> = verified.into_iter().take(session.required_trustees as usize).collect();

        let election = self
            .store
            .get_election(election_id)
            .await?
            .ok_or(EngineError::ElectionNotFound(election_id))?;

        // The combine step is CPU-bound and deadline-guarded; it touches no
        // store state, so a timeout or task panic here leaves the session
        // exactly as it was (still `decrypting`) rather than failing it.
        let combined = match self.combine_quorum(election_id, &election, &session, quorum.clone()).await {
            Ok(combined) => combined,
            Err(err @ (EngineError::Timeout { .. } | EngineError::TaskJoin(_))) => return Err(err),
            Err(err) => {
                self.fail_session(election_id, &err).await;
                return Err(err);
            }
        };

        session.state = SessionState::Finalizing;
        self.store.update_session(session.clone()).await?;

        let participating_trustees: Vec<_> = quorum.iter().map(|record| record.trustee_index).collect();
        let result = ElectionResultRecord {
            election_id,
            tally: combined.tally,
            total_votes: combined.total_votes,
            verification_hash: combined.verification_hash,
            participating_trustees,
            blockchain_tx_hash: None,
        };

        match self.store.write_result(result.clone()).await {
            Ok(()) => {
                session.state = SessionState::Completed;
                session.completed_at = Some(Utc::now());
                self.store.update_session(session).await?;
                self.store
                    .set_election_state(election_id, ElectionState::Completed)
                    .await?;
                metrics::gauge!(METRICS_ID_SESSIONS_OPEN).decrement(1);
                metrics::counter!(METRICS_ID_SESSIONS_COMPLETED).increment(1);
                metrics::histogram!(METRICS_ID_FINALIZE_DURATION)
                    .record(start.elapsed().as_secs_f64() * 1000.0);
                self.audit(
                    election_id,
                    "finalize",
                    "operator",
                    json!({ "total_votes": result.total_votes }),
                    AuditStatus::Success,
                )
                .await;
                Ok(result)
            }
            Err(err) => {
                let err = EngineError::from(err);
                self.fail_session(election_id, &err).await;
                Err(err)
            }
        }
    }

    async fn combine_quorum(
        &self,
        election_id: ElectionId,
        election: &crate::services::election_store::ElectionRecord,
        session: &TallyingSessionRecord,
        quorum: Vec<PartialDecryptionRecord>,
    ) -> Result<CombinedTally, EngineError> {
        let aggregated = session
            .aggregated
            .clone()
            .expect("aggregated is set once state reaches decrypting");
        let ballot_count = session
            .ballot_count
            .expect("ballot_count is set once state reaches decrypting");
        let election = election.clone();
        let required = session.required_trustees;
        let total = session.total_trustees;

        let task = tokio::task::spawn_blocking(move || -> Result<CombinedTally, EngineError> {
            let mut tally = Vec::with_capacity(election.candidates.len());
            for (j, ciphertext) in aggregated.iter().enumerate() {
                let parts: Vec<_> = quorum.iter().map(|record| record.partials[j].clone()).collect();
                let plaintext = threshold::combine(
                    &election.pk,
                    &election.finalizer,
                    ciphertext,
                    required,
                    total,
                    &parts,
                )?;
                let count = biguint_to_bounded_u64(&plaintext, ballot_count)?;
                tally.push((CandidateIndex::new(j as u16), count));
            }

            let total_votes: u64 = tally.iter().map(|(_, count)| *count).sum();
            let participating_trustees: Vec<_> =
                quorum.iter().map(|record| record.trustee_index).collect();
            let verification_hash = verification_hash::compute(
                election_id,
                &election.pk,
                &aggregated,
                &tally.iter().map(|(_, count)| *count).collect::<Vec<_>>(),
                &participating_trustees,
            );

            Ok(CombinedTally {
                tally,
                total_votes,
                verification_hash,
            })
        });

        match tokio::time::timeout(self.finalize_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(EngineError::TaskJoin(join_err)),
            Err(_) => Err(EngineError::Timeout { operation: "finalize" }),
        }
    }

    async fn fail_session(&self, election_id: ElectionId, err: &EngineError) {
        if let Ok(Some(mut session)) = self.store.get_session(election_id).await {
            session.state = SessionState::Failed;
            session.completed_at = Some(Utc::now());
            session.error_message = Some(err.to_string());
            if self.store.update_session(session).await.is_ok() {
                metrics::gauge!(METRICS_ID_SESSIONS_OPEN).decrement(1);
                metrics::counter!(METRICS_ID_SESSIONS_FAILED).increment(1);
            }
        }
        self.audit(
            election_id,
            "error",
            "system",
            json!({ "error": err.to_string() }),
            AuditStatus::Failed,
        )
        .await;
    }

    /// Returns the current session snapshot for an election, if any.
    pub async fn session(
        &self,
        election_id: ElectionId,
    ) -> Result<Option<TallyingSessionRecord>, EngineError> {
        Ok(self.store.get_session(election_id).await?)
    }

    /// Operator recovery for a `failed` session (spec §7): deletes the
    /// failed session record so `start_tally` can be retried from scratch.
    /// Exposed as a narrow internal method rather than a public wire
    /// operation; nothing about the election or its ballots is touched.
    pub async fn reset_failed_session(&self, election_id: ElectionId) -> Result<(), EngineError> {
        let _guard = self.locks.lock(election_id).await;

        let session = self
            .store
            .get_session(election_id)
            .await?
            .ok_or(EngineError::SessionNotFound(election_id))?;
        if !matches!(session.state, SessionState::Failed) {
            return Err(EngineError::WrongState {
                election_id,
                actual: session.state,
                expected: SessionState::Failed,
            });
        }

        self.store.delete_session(election_id).await?;
        self.audit(
            election_id,
            "reset_failed_session",
            "operator",
            json!({}),
            AuditStatus::Success,
        )
        .await;
        Ok(())
    }
}

/// Converts a recovered Paillier plaintext to a `u64` vote count, enforcing
/// spec §4.3's plaintext-space guarantee: a candidate's recovered count can
/// never legitimately exceed the number of accepted ballots.
fn biguint_to_bounded_u64(value: &BigUint, ballot_count: u64) -> Result<u64, EngineError> {
    let as_u64 = value.to_u64().unwrap_or(u64::MAX);
    if as_u64 > ballot_count {
        return Err(EngineError::PlaintextOverflow {
            value: as_u64,
            ballots: ballot_count,
        });
    }
    Ok(as_u64)
}

#[cfg(test)]
mod tests {
    //! Engine-level behavior is exercised end-to-end in
    //! `tally-service/tests/tally_engine.rs` against `tally-test-utils`'
    //! in-memory store, where election/trustee/ballot fixtures are
    //! available; this module only covers the pure helper above.
    use super::*;

    #[test]
    fn bounded_conversion_rejects_overflow() {
        let err = biguint_to_bounded_u64(&BigUint::from(11u32), 10).unwrap_err();
        assert!(matches!(
            err,
            EngineError::PlaintextOverflow { value: 11, ballots: 10 }
        ));
    }

    #[test]
    fn bounded_conversion_accepts_exact_bound() {
        assert_eq!(biguint_to_bounded_u64(&BigUint::from(10u32), 10).unwrap(), 10);
    }
}
