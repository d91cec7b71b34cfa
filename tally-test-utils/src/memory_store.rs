//! An in-memory [`ElectionStore`], mirroring the shape of the teacher's
//! `TestSecretManager`: plain `HashMap`s behind a `parking_lot::Mutex`, with
//! synchronous bodies wrapped in `async fn` to satisfy the trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tally_service::services::election_store::{
    ElectionRecord, ElectionResultRecord, ElectionStore, EncryptedBallotRecord,
    PartialDecryptionRecord, StoreError, TallyingSessionRecord, TrusteeRecord,
};
use tally_types::{ElectionId, ElectionState, TrusteeIndex};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    elections: HashMap<ElectionId, ElectionRecord>,
    trustees: HashMap<(ElectionId, TrusteeIndex), TrusteeRecord>,
    ballots: HashMap<ElectionId, Vec<EncryptedBallotRecord>>,
    sessions: HashMap<ElectionId, TallyingSessionRecord>,
    partials: HashMap<ElectionId, Vec<PartialDecryptionRecord>>,
    results: HashMap<ElectionId, ElectionResultRecord>,
}

/// An [`ElectionStore`] over in-memory collections, for tests that want to
/// exercise [`tally_service::services::tally_engine::TallyEngine`] without a
/// Postgres instance.
#[derive(Clone, Default)]
pub struct MemoryElectionStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryElectionStore {
    /// Builds an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an election record directly, bypassing any wire-level
    /// validation a real creation endpoint would perform.
    pub fn seed_election(&self, election: ElectionRecord) {
        self.inner.lock().elections.insert(election.id, election);
    }

    /// Seeds a trustee record directly.
    pub fn seed_trustee(&self, trustee: TrusteeRecord) {
        self.inner
            .lock()
            .trustees
            .insert((trustee.election_id, trustee.index), trustee);
    }

    /// Seeds a tallying session directly, bypassing `create_session`'s
    /// conflict check — used by tests that need to drop a session straight
    /// into `failed` without driving the engine through a real failure.
    pub fn seed_session(&self, session: TallyingSessionRecord) {
        self.inner.lock().sessions.insert(session.election_id, session);
    }

    /// Overwrites an already-written result, bypassing `write_result`'s
    /// write-once conflict check — used by tampering tests that need to
    /// mutate a finalized result in place.
    pub fn overwrite_result_for_test(&self, result: ElectionResultRecord) {
        self.inner.lock().results.insert(result.election_id, result);
    }
}

#[async_trait]
impl ElectionStore for MemoryElectionStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_election(&self, election_id: ElectionId) -> Result<Option<ElectionRecord>, StoreError> {
        Ok(self.inner.lock().elections.get(&election_id).cloned())
    }

    async fn set_election_state(
        &self,
        election_id: ElectionId,
        state: ElectionState,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let election = inner
            .elections
            .get_mut(&election_id)
            .ok_or_else(|| StoreError::NotFound(election_id.to_string()))?;
        election.state = state;
        Ok(())
    }

    async fn get_trustee(
        &self,
        election_id: ElectionId,
        index: TrusteeIndex,
    ) -> Result<Option<TrusteeRecord>, StoreError> {
        Ok(self.inner.lock().trustees.get(&(election_id, index)).cloned())
    }

    async fn insert_ballot(&self, ballot: EncryptedBallotRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let ballots = inner.ballots.entry(ballot.election_id).or_default();
        if ballots.iter().any(|existing| existing.nonce == ballot.nonce) {
            return Err(StoreError::Conflict(format!(
                "ballot nonce {} already used for election {}",
                ballot.nonce, ballot.election_id
            )));
        }
        ballots.push(ballot);
        Ok(())
    }

    async fn untallied_ballots(
        &self,
        election_id: ElectionId,
    ) -> Result<Vec<EncryptedBallotRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .ballots
            .get(&election_id)
            .map(|ballots| ballots.iter().filter(|b| !b.is_tallied).cloned().collect())
            .unwrap_or_default())
    }

    async fn mark_ballots_tallied(
        &self,
        election_id: ElectionId,
        vote_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(ballots) = inner.ballots.get_mut(&election_id) {
            for ballot in ballots.iter_mut() {
                if vote_ids.contains(&ballot.vote_id) {
                    ballot.is_tallied = true;
                }
            }
        }
        Ok(())
    }

    async fn get_session(
        &self,
        election_id: ElectionId,
    ) -> Result<Option<TallyingSessionRecord>, StoreError> {
        Ok(self.inner.lock().sessions.get(&election_id).cloned())
    }

    async fn create_session(&self, session: TallyingSessionRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.sessions.contains_key(&session.election_id) {
            return Err(StoreError::Conflict(format!(
                "a tallying session for election {} already exists",
                session.election_id
            )));
        }
        inner.sessions.insert(session.election_id, session);
        Ok(())
    }

    async fn update_session(&self, session: TallyingSessionRecord) -> Result<(), StoreError> {
        self.inner.lock().sessions.insert(session.election_id, session);
        Ok(())
    }

    async fn insert_partial_decryption(
        &self,
        record: PartialDecryptionRecord,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let partials = inner.partials.entry(record.election_id).or_default();
        if partials.iter().any(|existing| existing.trustee_index == record.trustee_index) {
            return Err(StoreError::Conflict(format!(
                "trustee {} already submitted a partial decryption for election {}",
                record.trustee_index, record.election_id
            )));
        }
        partials.push(record);
        Ok(())
    }

    async fn list_partial_decryptions(
        &self,
        election_id: ElectionId,
    ) -> Result<Vec<PartialDecryptionRecord>, StoreError> {
        Ok(self.inner.lock().partials.get(&election_id).cloned().unwrap_or_default())
    }

    async fn write_result(&self, result: ElectionResultRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.results.contains_key(&result.election_id) {
            return Err(StoreError::Conflict(format!(
                "a result for election {} already exists",
                result.election_id
            )));
        }
        inner.results.insert(result.election_id, result);
        Ok(())
    }

    async fn get_result(
        &self,
        election_id: ElectionId,
    ) -> Result<Option<ElectionResultRecord>, StoreError> {
        Ok(self.inner.lock().results.get(&election_id).cloned())
    }

    async fn set_result_blockchain_tx(
        &self,
        election_id: ElectionId,
        tx_hash: String,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let result = inner
            .results
            .get_mut(&election_id)
            .ok_or_else(|| StoreError::NotFound(election_id.to_string()))?;
        result.blockchain_tx_hash = Some(tx_hash);
        Ok(())
    }

    async fn delete_session(&self, election_id: ElectionId) -> Result<(), StoreError> {
        self.inner.lock().sessions.remove(&election_id);
        Ok(())
    }
}
