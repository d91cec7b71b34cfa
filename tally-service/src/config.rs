//! Configuration types and CLI/environment parsing for the tallying service.
//!
//! Concrete deployments may have a more detailed config and can flatten
//! [`TallyServiceConfig`] into it with `#[clap(flatten)]`.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use secrecy::SecretString;

/// The environment the service is running in.
///
/// Mainly used to assert `dev`-only behavior, e.g. an in-memory election
/// store standing in for Postgres during local development.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Environment {
    /// Production environment.
    Prod,
    /// Development environment.
    Dev,
}

impl Environment {
    /// Asserts that `Environment` is `dev`. Panics if not the case.
    pub fn assert_is_dev(&self) {
        assert!(matches!(self, Environment::Dev), "is not dev environment")
    }
}

/// The configuration for the tallying service core functionality.
///
/// It can be configured via environment variables or command line arguments
/// using `clap`.
#[derive(Parser, Debug)]
pub struct TallyServiceConfig {
    /// The environment of the tallying service (either `prod` or `dev`).
    #[clap(long, env = "TALLY_SERVICE_ENVIRONMENT", default_value = "prod")]
    pub environment: Environment,

    /// Default Paillier key size, in bits, for newly created elections.
    #[clap(long, env = "TALLY_SERVICE_KEY_BITS", default_value = "2048")]
    pub paillier_key_bits: u32,

    /// Default Shamir threshold `K` for newly created elections.
    #[clap(long, env = "TALLY_SERVICE_DEFAULT_THRESHOLD", default_value = "3")]
    pub default_threshold: u16,

    /// Default trustee count `N` for newly created elections.
    #[clap(long, env = "TALLY_SERVICE_DEFAULT_TRUSTEES", default_value = "5")]
    pub default_trustee_count: u16,

    /// Deadline for a single aggregation call before it is aborted and
    /// treated as not attempted.
    #[clap(
        long,
        env = "TALLY_SERVICE_AGGREGATE_TIMEOUT",
        default_value = "5min",
        value_parser = humantime::parse_duration
    )]
    pub aggregate_timeout: Duration,

    /// Deadline for a single finalize call before it is aborted and treated
    /// as not attempted.
    #[clap(
        long,
        env = "TALLY_SERVICE_FINALIZE_TIMEOUT",
        default_value = "1min",
        value_parser = humantime::parse_duration
    )]
    pub finalize_timeout: Duration,

    /// The connection string for the Postgres DB.
    #[clap(long, env = "TALLY_SERVICE_DB_CONNECTION_STRING")]
    pub db_connection_string: SecretString,

    /// The connection string for the Postgres DB (max connections).
    #[clap(long, env = "TALLY_SERVICE_DB_MAX_CONNECTIONS", default_value = "8")]
    pub db_max_connections: u32,

    /// Address the HTTP API binds to.
    #[clap(long, env = "TALLY_SERVICE_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,
}
