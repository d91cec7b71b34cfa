#![deny(missing_docs)]
//! Pure cryptographic core of the tallying system.
//!
//! This crate has no knowledge of elections, sessions, or persistence — it
//! implements exactly the two hard primitives the tallying core is built on:
//!
//! * [`paillier`] — the additive-homomorphic Paillier cryptosystem: key
//!   generation, per-candidate ballot encryption, ciphertext aggregation and
//!   (non-threshold) decryption.
//! * [`shamir`] — Shamir secret sharing over the integers (Shoup-style), used
//!   to split the Paillier decryption exponent across trustees.
//! * [`threshold`] — threshold decryption built on top of `paillier` and
//!   `shamir`: per-trustee partial decryption, a Chaum–Pedersen
//!   zero-knowledge proof of correct partial decryption, and Lagrange
//!   combination of a quorum of partial decryptions back into a plaintext.
//!
//! Implementations embedding this crate are expected to own persistence, the
//! tallying session state machine, and the wire API; see `tally-service` for
//! a composable implementation of those concerns.

pub mod paillier;
mod primes;
pub mod shamir;
pub mod threshold;
