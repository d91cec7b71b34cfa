#![deny(missing_docs)]
//! A privacy-preserving electronic tallying service: Paillier
//! additive-homomorphic ballots, Shamir-shared threshold decryption and an
//! auditable tallying session per election.
//!
//! The main entry point is [`TallyServiceBuilder`]. It wires together an
//! [`ElectionStore`](services::election_store::ElectionStore), an
//! [`AuditLog`](services::audit_log::AuditLog) and a
//! [`BlockchainPublisher`](services::blockchain::BlockchainPublisher), and
//! returns an `axum::Router` exposing the five wire operations of the
//! tallying protocol plus `/health` and `/version`.
//!
//! Deployments that need project-specific authentication or additional
//! routes can `.merge()` further routers onto the one returned by
//! [`TallyServiceBuilder::build`].

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

pub(crate) mod api;
pub mod config;
pub mod metrics;
pub mod services;
pub mod version;

use config::TallyServiceConfig;
use services::audit_log::{AuditLog, MeteredAuditLog, Verifier};
use services::blockchain::BlockchainPublisher;
use services::election_store::ElectionStore;
use services::election_store::postgres::PostgresElectionStore;
use services::tally_engine::TallyEngine;

/// The collaborators every `/api/v1` route closes over.
///
/// Following the teacher's `OprfArgs`/`WsArgs` pattern, routes capture a
/// clone of this directly in `move` closures rather than reaching for
/// `axum::extract::State`; every field is already cheap to clone (an
/// `Arc` or a struct of `Arc`s).
#[derive(Clone)]
pub(crate) struct TallyApiArgs {
    pub(crate) store: Arc<dyn ElectionStore>,
    pub(crate) engine: TallyEngine,
    pub(crate) verifier: Verifier,
    pub(crate) blockchain: Arc<dyn BlockchainPublisher>,
}

/// Builds a `TallyService` `axum::Router` from a persistence backend, an
/// audit log and a blockchain publisher.
///
/// Mirrors the teacher's `OprfServiceBuilder`: an `init` constructor that
/// performs async setup, intermediate builder methods, and a final
/// `build` that assembles the router.
pub struct TallyServiceBuilder {
    config: TallyServiceConfig,
    store: Arc<dyn ElectionStore>,
    audit: Arc<dyn AuditLog>,
    blockchain: Arc<dyn BlockchainPublisher>,
}

impl TallyServiceBuilder {
    /// Connects to Postgres and wires up the service with the given audit
    /// log and blockchain publisher.
    pub async fn init(
        config: TallyServiceConfig,
        audit: Arc<dyn AuditLog>,
        blockchain: Arc<dyn BlockchainPublisher>,
    ) -> eyre::Result<Self> {
        metrics::describe_metrics();
        tracing::info!("connecting election store...");
        let store = Arc::new(
            PostgresElectionStore::connect(&config.db_connection_string, config.db_max_connections)
                .await?,
        );
        Ok(Self {
            config,
            store,
            audit,
            blockchain,
        })
    }

    /// Builds the service directly from an already-constructed store,
    /// skipping the Postgres connection in [`TallyServiceBuilder::init`].
    /// Used by deployments with a non-Postgres backend and by tests
    /// against `tally-test-utils`' in-memory store.
    pub fn with_store(
        config: TallyServiceConfig,
        store: Arc<dyn ElectionStore>,
        audit: Arc<dyn AuditLog>,
        blockchain: Arc<dyn BlockchainPublisher>,
    ) -> Self {
        Self {
            config,
            store,
            audit,
            blockchain,
        }
    }

    /// Assembles the final `axum::Router`.
    pub fn build(self) -> Router {
        let audit: Arc<dyn AuditLog> = Arc::new(MeteredAuditLog::new(self.audit));
        let engine = TallyEngine::new(self.store.clone(), audit)
            .with_timeouts(self.config.aggregate_timeout, self.config.finalize_timeout);
        let verifier = Verifier::new(self.store.clone());
        let args = TallyApiArgs {
            store: self.store,
            engine,
            verifier,
            blockchain: self.blockchain,
        };

        Router::new()
            .merge(api::health::routes(args.clone()))
            .merge(api::info::routes())
            .nest("/api/v1", api::v1::routes(args))
            .layer(TraceLayer::new_for_http())
    }
}
