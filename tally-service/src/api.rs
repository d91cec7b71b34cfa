//! HTTP API for the tallying service.
//!
//! - [`health`] – liveness check (`/health`).
//! - [`info`] – build/version info (`/version`).
//! - [`v1`] – the five wire operations of spec §6, nested under `/api/v1`.
//! - [`errors`] – maps internal failures onto the `ErrorKind` taxonomy.

pub(crate) mod errors;
pub(crate) mod health;
pub(crate) mod info;
pub(crate) mod v1;
