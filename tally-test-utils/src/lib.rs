#![deny(missing_docs)]
//! Test utilities for `tally-service`: an in-memory [`ElectionStore`], an
//! in-memory [`AuditLog`], a no-op [`BlockchainPublisher`], and deterministic
//! election fixtures, mirroring `oprf-test-utils`'
//! `TestSecretManager`/`secret_manager::test_secret_manager` split.
//!
//! Nothing here is wired up to run against a real Postgres instance; that is
//! `tally-service::services::election_store::postgres`'s job. This crate
//! exists so `tally-service`'s own test suite (and any downstream
//! integration test) can exercise the full `TallyEngine` state machine
//! without a database.

mod audit_log;
mod blockchain;
pub mod fixtures;
mod memory_store;

pub use audit_log::InMemoryAuditLog;
pub use blockchain::NoopBlockchainPublisher;
pub use memory_store::MemoryElectionStore;
