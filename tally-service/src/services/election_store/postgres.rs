//! Postgres-backed [`ElectionStore`].
//!
//! Grounded on the teacher's `PostgresSecretManager`: a single-connection
//! `PgPool` (the service is deployed with an external connection pooler in
//! front of it, see `DESIGN.md`), values serialized exactly as they derive
//! `Serialize`/`Deserialize` in `tally-core`/`tally-types` and stored as
//! `jsonb`, uniqueness enforced by the schema and surfaced as
//! [`StoreError::Conflict`] on Postgres error code `23505`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::Context as _;
use secrecy::{ExposeSecret as _, SecretString};
use sqlx::types::Json;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tally_core::paillier::{Ciphertext, PaillierPublicKey};
use tally_core::shamir::ShareParameters;
use tally_core::threshold::{ChaumPedersenProof, PartialDecryption, ShareCommitment, ThresholdFinalizer};
use tally_types::{CandidateIndex, ElectionId, ElectionState, SessionState, TrusteeIndex};
use tracing::instrument;
use uuid::Uuid;

use super::{
    ElectionRecord, ElectionResultRecord, ElectionStore, EncryptedBallotRecord,
    PartialDecryptionRecord, StoreError, TallyingSessionRecord, TrusteeRecord, TrusteeStatus,
};

/// The Postgres-backed election store, wrapping a single-connection
/// `PgPool`. As in the teacher's secret manager, a single connection is
/// deliberate: this service does not run enough concurrent queries to
/// need a pool, and it keeps behavior under load predictable.
pub struct PostgresElectionStore(PgPool);

impl PostgresElectionStore {
    /// Connects to `connection_string`, opening exactly one connection.
    #[instrument(level = "info", skip_all)]
    pub async fn connect(connection_string: &SecretString, max_connections: u32) -> eyre::Result<Self> {
        tracing::info!("connecting to election store DB...");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string.expose_secret())
            .await
            .context("while connecting to the election store database")?;
        Ok(Self(pool))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn map_write_err(err: sqlx::Error, conflict_message: &str) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::Conflict(conflict_message.to_string())
    } else {
        StoreError::Backend(eyre::Error::new(err))
    }
}

#[derive(sqlx::FromRow)]
struct ElectionRow {
    id: Uuid,
    title: String,
    candidates: Json<Vec<String>>,
    pk: Json<PaillierPublicKey>,
    finalizer: Json<ThresholdFinalizer>,
    field: Json<ShareParameters>,
    required_trustees: i16,
    total_trustees: i16,
    state: Json<ElectionState>,
    created_at: DateTime<Utc>,
}

impl From<ElectionRow> for ElectionRecord {
    fn from(row: ElectionRow) -> Self {
        ElectionRecord {
            id: ElectionId::from_uuid(row.id),
            title: row.title,
            candidates: row.candidates.0,
            pk: row.pk.0,
            finalizer: row.finalizer.0,
            field: row.field.0,
            required_trustees: row.required_trustees as u16,
            total_trustees: row.total_trustees as u16,
            state: row.state.0,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TrusteeRow {
    election_id: Uuid,
    trustee_index: i16,
    public_commitment: Json<ShareCommitment>,
    encrypted_share: Vec<u8>,
    status: Json<TrusteeStatus>,
}

impl From<TrusteeRow> for TrusteeRecord {
    fn from(row: TrusteeRow) -> Self {
        TrusteeRecord {
            election_id: ElectionId::from_uuid(row.election_id),
            index: TrusteeIndex::new(row.trustee_index as u16),
            public_commitment: row.public_commitment.0,
            encrypted_share: row.encrypted_share,
            status: row.status.0,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BallotRow {
    vote_id: Uuid,
    election_id: Uuid,
    ciphertexts: Json<Vec<Ciphertext>>,
    nonce: String,
    is_tallied: bool,
}

impl From<BallotRow> for EncryptedBallotRecord {
    fn from(row: BallotRow) -> Self {
        EncryptedBallotRecord {
            vote_id: row.vote_id,
            election_id: ElectionId::from_uuid(row.election_id),
            ciphertexts: row.ciphertexts.0,
            nonce: row.nonce,
            is_tallied: row.is_tallied,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PartialDecryptionRow {
    election_id: Uuid,
    trustee_index: i16,
    partials: Json<Vec<PartialDecryption>>,
    proofs: Json<Vec<ChaumPedersenProof>>,
    verified: bool,
    submitted_at: DateTime<Utc>,
}

impl From<PartialDecryptionRow> for PartialDecryptionRecord {
    fn from(row: PartialDecryptionRow) -> Self {
        PartialDecryptionRecord {
            election_id: ElectionId::from_uuid(row.election_id),
            trustee_index: TrusteeIndex::new(row.trustee_index as u16),
            partials: row.partials.0,
            proofs: row.proofs.0,
            verified: row.verified,
            submitted_at: row.submitted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    election_id: Uuid,
    state: Json<SessionState>,
    aggregated: Option<Json<Vec<Ciphertext>>>,
    ballot_count: Option<i64>,
    required_trustees: i16,
    total_trustees: i16,
    completed_trustees: i16,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

impl From<SessionRow> for TallyingSessionRecord {
    fn from(row: SessionRow) -> Self {
        TallyingSessionRecord {
            election_id: ElectionId::from_uuid(row.election_id),
            state: row.state.0,
            aggregated: row.aggregated.map(|j| j.0),
            ballot_count: row.ballot_count.map(|c| c as u64),
            required_trustees: row.required_trustees as u16,
            total_trustees: row.total_trustees as u16,
            completed_trustees: row.completed_trustees as u16,
            started_at: row.started_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ResultRow {
    election_id: Uuid,
    tally: Json<Vec<(u16, u64)>>,
    total_votes: i64,
    verification_hash: String,
    participating_trustees: Json<Vec<u16>>,
    blockchain_tx_hash: Option<String>,
}

impl From<ResultRow> for ElectionResultRecord {
    fn from(row: ResultRow) -> Self {
        ElectionResultRecord {
            election_id: ElectionId::from_uuid(row.election_id),
            tally: row
                .tally
                .0
                .into_iter()
                .map(|(idx, count)| (CandidateIndex::new(idx), count))
                .collect(),
            total_votes: row.total_votes as u64,
            verification_hash: row.verification_hash,
            participating_trustees: row
                .participating_trustees
                .0
                .into_iter()
                .map(TrusteeIndex::new)
                .collect(),
            blockchain_tx_hash: row.blockchain_tx_hash,
        }
    }
}

#[async_trait]
impl ElectionStore for PostgresElectionStore {
    #[instrument(level = "debug", skip(self))]
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.0)
            .await
            .map_err(|e| StoreError::Backend(eyre::Error::new(e)))?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_election(&self, election_id: ElectionId) -> Result<Option<ElectionRecord>, StoreError> {
        let row: Option<ElectionRow> = sqlx::query_as(
            r#"
                SELECT id, title, candidates, pk, finalizer, field,
                       required_trustees, total_trustees, state, created_at
                FROM elections
                WHERE id = $1
            "#,
        )
        .bind(election_id.into_uuid())
        .fetch_optional(&self.0)
        .await
        .map_err(|e| StoreError::Backend(eyre::Error::new(e)))?;
        Ok(row.map(Into::into))
    }

    #[instrument(level = "debug", skip(self))]
    async fn set_election_state(
        &self,
        election_id: ElectionId,
        state: ElectionState,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE elections SET state = $1 WHERE id = $2")
            .bind(Json(state))
            .bind(election_id.into_uuid())
            .execute(&self.0)
            .await
            .map_err(|e| StoreError::Backend(eyre::Error::new(e)))?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_trustee(
        &self,
        election_id: ElectionId,
        index: TrusteeIndex,
    ) -> Result<Option<TrusteeRecord>, StoreError> {
        let row: Option<TrusteeRow> = sqlx::query_as(
            r#"
                SELECT election_id, trustee_index, public_commitment, encrypted_share, status
                FROM trustees
                WHERE election_id = $1 AND trustee_index = $2
            "#,
        )
        .bind(election_id.into_uuid())
        .bind(index.get() as i16)
        .fetch_optional(&self.0)
        .await
        .map_err(|e| StoreError::Backend(eyre::Error::new(e)))?;
        Ok(row.map(Into::into))
    }

    #[instrument(level = "debug", skip(self, ballot))]
    async fn insert_ballot(&self, ballot: EncryptedBallotRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
                INSERT INTO ballots (vote_id, election_id, ciphertexts, nonce, is_tallied)
                VALUES ($1, $2, $3, $4, false)
            "#,
        )
        .bind(ballot.vote_id)
        .bind(ballot.election_id.into_uuid())
        .bind(Json(ballot.ciphertexts))
        .bind(ballot.nonce)
        .execute(&self.0)
        .await
        .map_err(|e| map_write_err(e, "duplicate ballot nonce"))?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn untallied_ballots(
        &self,
        election_id: ElectionId,
    ) -> Result<Vec<EncryptedBallotRecord>, StoreError> {
        let rows: Vec<BallotRow> = sqlx::query_as(
            r#"
                SELECT vote_id, election_id, ciphertexts, nonce, is_tallied
                FROM ballots
                WHERE election_id = $1 AND is_tallied = false
                ORDER BY vote_id
            "#,
        )
        .bind(election_id.into_uuid())
        .fetch_all(&self.0)
        .await
        .map_err(|e| StoreError::Backend(eyre::Error::new(e)))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(level = "debug", skip(self, vote_ids))]
    async fn mark_ballots_tallied(
        &self,
        election_id: ElectionId,
        vote_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
                UPDATE ballots SET is_tallied = true
                WHERE election_id = $1 AND vote_id = ANY($2)
            "#,
        )
        .bind(election_id.into_uuid())
        .bind(vote_ids)
        .execute(&self.0)
        .await
        .map_err(|e| StoreError::Backend(eyre::Error::new(e)))?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_session(
        &self,
        election_id: ElectionId,
    ) -> Result<Option<TallyingSessionRecord>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
                SELECT election_id, state, aggregated, ballot_count,
                       required_trustees, total_trustees, completed_trustees,
                       started_at, completed_at, error_message
                FROM tallying_sessions
                WHERE election_id = $1
            "#,
        )
        .bind(election_id.into_uuid())
        .fetch_optional(&self.0)
        .await
        .map_err(|e| StoreError::Backend(eyre::Error::new(e)))?;
        Ok(row.map(Into::into))
    }

    #[instrument(level = "debug", skip(self, session))]
    async fn create_session(&self, session: TallyingSessionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
                INSERT INTO tallying_sessions
                    (election_id, state, aggregated, ballot_count, required_trustees,
                     total_trustees, completed_trustees, started_at, completed_at, error_message)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(session.election_id.into_uuid())
        .bind(Json(session.state))
        .bind(session.aggregated.map(Json))
        .bind(session.ballot_count.map(|c| c as i64))
        .bind(session.required_trustees as i16)
        .bind(session.total_trustees as i16)
        .bind(session.completed_trustees as i16)
        .bind(session.started_at)
        .bind(session.completed_at)
        .bind(session.error_message)
        .execute(&self.0)
        .await
        .map_err(|e| map_write_err(e, "tallying session already exists for this election"))?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, session))]
    async fn update_session(&self, session: TallyingSessionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
                UPDATE tallying_sessions
                SET state = $1, aggregated = $2, ballot_count = $3, completed_trustees = $4,
                    completed_at = $5, error_message = $6
                WHERE election_id = $7
            "#,
        )
        .bind(Json(session.state))
        .bind(session.aggregated.map(Json))
        .bind(session.ballot_count.map(|c| c as i64))
        .bind(session.completed_trustees as i16)
        .bind(session.completed_at)
        .bind(session.error_message)
        .bind(session.election_id.into_uuid())
        .execute(&self.0)
        .await
        .map_err(|e| StoreError::Backend(eyre::Error::new(e)))?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, record))]
    async fn insert_partial_decryption(
        &self,
        record: PartialDecryptionRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
                INSERT INTO partial_decryptions
                    (election_id, trustee_index, partials, proofs, verified, submitted_at)
                VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.election_id.into_uuid())
        .bind(record.trustee_index.get() as i16)
        .bind(Json(record.partials))
        .bind(Json(record.proofs))
        .bind(record.verified)
        .bind(record.submitted_at)
        .execute(&self.0)
        .await
        .map_err(|e| map_write_err(e, "trustee already submitted a partial decryption"))?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_partial_decryptions(
        &self,
        election_id: ElectionId,
    ) -> Result<Vec<PartialDecryptionRecord>, StoreError> {
        let rows: Vec<PartialDecryptionRow> = sqlx::query_as(
            r#"
                SELECT election_id, trustee_index, partials, proofs, verified, submitted_at
                FROM partial_decryptions
                WHERE election_id = $1
                ORDER BY trustee_index
            "#,
        )
        .bind(election_id.into_uuid())
        .fetch_all(&self.0)
        .await
        .map_err(|e| StoreError::Backend(eyre::Error::new(e)))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(level = "debug", skip(self, result))]
    async fn write_result(&self, result: ElectionResultRecord) -> Result<(), StoreError> {
        let tally: Vec<(u16, u64)> = result
            .tally
            .iter()
            .map(|(idx, count)| (idx.get(), *count))
            .collect();
        let trustees: Vec<u16> = result
            .participating_trustees
            .iter()
            .map(|idx| idx.get())
            .collect();
        sqlx::query(
            r#"
                INSERT INTO election_results
                    (election_id, tally, total_votes, verification_hash, participating_trustees, blockchain_tx_hash)
                VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(result.election_id.into_uuid())
        .bind(Json(tally))
        .bind(result.total_votes as i64)
        .bind(result.verification_hash)
        .bind(Json(trustees))
        .bind(result.blockchain_tx_hash)
        .execute(&self.0)
        .await
        .map_err(|e| map_write_err(e, "a result already exists for this election"))?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_result(
        &self,
        election_id: ElectionId,
    ) -> Result<Option<ElectionResultRecord>, StoreError> {
        let row: Option<ResultRow> = sqlx::query_as(
            r#"
                SELECT election_id, tally, total_votes, verification_hash,
                       participating_trustees, blockchain_tx_hash
                FROM election_results
                WHERE election_id = $1
            "#,
        )
        .bind(election_id.into_uuid())
        .fetch_optional(&self.0)
        .await
        .map_err(|e| StoreError::Backend(eyre::Error::new(e)))?;
        Ok(row.map(Into::into))
    }

    #[instrument(level = "debug", skip(self))]
    async fn set_result_blockchain_tx(
        &self,
        election_id: ElectionId,
        tx_hash: String,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE election_results SET blockchain_tx_hash = $1 WHERE election_id = $2")
            .bind(tx_hash)
            .bind(election_id.into_uuid())
            .execute(&self.0)
            .await
            .map_err(|e| StoreError::Backend(eyre::Error::new(e)))?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete_session(&self, election_id: ElectionId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM tallying_sessions WHERE election_id = $1")
            .bind(election_id.into_uuid())
            .execute(&self.0)
            .await
            .map_err(|e| StoreError::Backend(eyre::Error::new(e)))?;
        Ok(())
    }
}
