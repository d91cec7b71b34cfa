//! Core services that make up the tallying service.
//!
//! This module exposes all internal services used to coordinate tallying
//! sessions, persist their state, and publish finalized results. Each
//! service encapsulates a specific responsibility and is injected as an
//! explicit constructor argument rather than reached for as a singleton, so
//! tests can substitute deterministic stubs (see `tally-test-utils`).
//!
//! # Services overview
//!
//! - [`election_store`] – the persistence contract of spec §6: elections,
//!   trustees, ballots, partial decryptions, sessions and results.
//! - [`audit_log`] – the append-only audit trail, plus the [`audit_log::Verifier`]
//!   that recomputes a finalized result from scratch.
//! - [`tally_engine`] – the `TallyingSession` state machine.
//! - [`verification_hash`] – the canonical verification-hash input format,
//!   shared by the engine (which computes it at finalize time) and the
//!   verifier (which recomputes it).
//! - [`blockchain`] – the narrow publication trait for `publish_blockchain`.
//! - [`locks`] – per-election mutual exclusion for session transitions.

pub mod audit_log;
pub mod blockchain;
pub mod election_store;
pub(crate) mod locks;
pub mod tally_engine;
pub mod verification_hash;
