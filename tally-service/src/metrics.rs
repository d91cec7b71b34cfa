//! Metrics definitions for the tallying service.
//!
//! This module defines all metrics keys used by the service and provides a
//! helper [`describe_metrics`] to set metadata for each metric using the
//! `metrics` crate.

/// Metrics key for the number of tallying sessions currently in progress
/// (not yet `completed` or `failed`).
pub const METRICS_ID_SESSIONS_OPEN: &str = "tally.service.sessions.open";
/// Metrics key for the number of tallying sessions that reached `completed`.
pub const METRICS_ID_SESSIONS_COMPLETED: &str = "tally.service.sessions.completed";
/// Metrics key for the number of tallying sessions that reached `failed`.
pub const METRICS_ID_SESSIONS_FAILED: &str = "tally.service.sessions.failed";
/// Metrics key for the number of partial decryptions accepted with a valid
/// proof.
pub const METRICS_ID_PARTIALS_VERIFIED: &str = "tally.service.partials.verified";
/// Metrics key for the number of partial decryptions rejected for failing
/// proof verification.
pub const METRICS_ID_PARTIALS_REJECTED: &str = "tally.service.partials.rejected";
/// Metrics key for the number of partial decryptions rejected as duplicate
/// submissions from a trustee that already submitted.
pub const METRICS_ID_PARTIALS_DUPLICATE: &str = "tally.service.partials.duplicate";
/// Metrics key for the duration of the ballot aggregation step.
pub const METRICS_ID_AGGREGATE_DURATION: &str = "tally.service.aggregate.duration";
/// Metrics key for the duration of the finalize (Lagrange combination) step.
pub const METRICS_ID_FINALIZE_DURATION: &str = "tally.service.finalize.duration";
/// Metrics key for the number of ballots aggregated into a session.
pub const METRICS_ID_BALLOTS_AGGREGATED: &str = "tally.service.ballots.aggregated";
/// Metrics key for the number of audit log entries appended.
pub const METRICS_ID_AUDIT_ENTRIES: &str = "tally.service.audit.entries";

/// Describe all metrics used by the service.
///
/// This calls the `describe_*` functions from the `metrics` crate to set
/// metadata on the different metrics.
pub fn describe_metrics() {
    metrics::describe_gauge!(
        METRICS_ID_SESSIONS_OPEN,
        metrics::Unit::Count,
        "Number of tallying sessions currently in a non-terminal state"
    );

    metrics::describe_counter!(
        METRICS_ID_SESSIONS_COMPLETED,
        metrics::Unit::Count,
        "Number of tallying sessions that reached completed"
    );

    metrics::describe_counter!(
        METRICS_ID_SESSIONS_FAILED,
        metrics::Unit::Count,
        "Number of tallying sessions that reached failed"
    );

    metrics::describe_counter!(
        METRICS_ID_PARTIALS_VERIFIED,
        metrics::Unit::Count,
        "Number of partial decryptions accepted with a valid proof"
    );

    metrics::describe_counter!(
        METRICS_ID_PARTIALS_REJECTED,
        metrics::Unit::Count,
        "Number of partial decryptions rejected for failing proof verification"
    );

    metrics::describe_counter!(
        METRICS_ID_PARTIALS_DUPLICATE,
        metrics::Unit::Count,
        "Number of partial decryption submissions rejected as duplicates"
    );

    metrics::describe_histogram!(
        METRICS_ID_AGGREGATE_DURATION,
        metrics::Unit::Milliseconds,
        "Duration of the ballot aggregation step"
    );

    metrics::describe_histogram!(
        METRICS_ID_FINALIZE_DURATION,
        metrics::Unit::Milliseconds,
        "Duration of the finalize (Lagrange combination) step"
    );

    metrics::describe_counter!(
        METRICS_ID_BALLOTS_AGGREGATED,
        metrics::Unit::Count,
        "Number of ballots aggregated into a tallying session"
    );

    metrics::describe_counter!(
        METRICS_ID_AUDIT_ENTRIES,
        metrics::Unit::Count,
        "Number of audit log entries appended"
    );
}
