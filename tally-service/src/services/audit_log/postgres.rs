//! Postgres-backed [`AuditLog`], an append-only `audit_log` table.
//!
//! Grounded the same way as [`PostgresElectionStore`](crate::services::election_store::postgres::PostgresElectionStore):
//! a single-connection `PgPool`, rows mapped via `sqlx::FromRow`, structured
//! detail stored as `jsonb`. Unlike the election store there is no
//! uniqueness constraint to surface as a conflict — every `append` is an
//! unconditional insert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::Context as _;
use secrecy::{ExposeSecret as _, SecretString};
use sqlx::types::Json;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tally_types::ElectionId;
use tracing::instrument;
use uuid::Uuid;

use super::{AuditEntryRecord, AuditError, AuditLog, AuditStatus};

/// The Postgres-backed audit trail, wrapping a single-connection `PgPool`.
pub struct PostgresAuditLog(PgPool);

impl PostgresAuditLog {
    /// Connects to `connection_string`, opening exactly one connection.
    #[instrument(level = "info", skip_all)]
    pub async fn connect(connection_string: &SecretString, max_connections: u32) -> eyre::Result<Self> {
        tracing::info!("connecting to audit log DB...");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string.expose_secret())
            .await
            .context("while connecting to the audit log database")?;
        Ok(Self(pool))
    }

    /// Wraps an already-open pool, for deployments that share one pool
    /// between the election store and the audit log.
    pub fn from_pool(pool: PgPool) -> Self {
        Self(pool)
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    election_id: Uuid,
    operation: String,
    actor: String,
    details: Json<serde_json::Value>,
    status: Json<AuditStatus>,
    timestamp: DateTime<Utc>,
}

impl From<AuditRow> for AuditEntryRecord {
    fn from(row: AuditRow) -> Self {
        AuditEntryRecord {
            election_id: ElectionId::from_uuid(row.election_id),
            operation: row.operation,
            actor: row.actor,
            details: row.details.0,
            status: row.status.0,
            timestamp: row.timestamp,
        }
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    #[instrument(level = "debug", skip(self, entry))]
    async fn append(&self, entry: AuditEntryRecord) -> Result<(), AuditError> {
        sqlx::query(
            r#"
                INSERT INTO audit_log (election_id, operation, actor, details, status, timestamp)
                VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.election_id.into_uuid())
        .bind(entry.operation)
        .bind(entry.actor)
        .bind(Json(entry.details))
        .bind(Json(entry.status))
        .bind(entry.timestamp)
        .execute(&self.0)
        .await
        .map_err(|e| AuditError::Backend(eyre::Error::new(e)))?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn list(&self, election_id: ElectionId) -> Result<Vec<AuditEntryRecord>, AuditError> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
                SELECT election_id, operation, actor, details, status, timestamp
                FROM audit_log
                WHERE election_id = $1
                ORDER BY timestamp
            "#,
        )
        .bind(election_id.into_uuid())
        .fetch_all(&self.0)
        .await
        .map_err(|e| AuditError::Backend(eyre::Error::new(e)))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
