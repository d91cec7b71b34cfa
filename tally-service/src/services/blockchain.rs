//! The narrow publication boundary for `publish_blockchain` (spec §4.3,
//! §8 Non-goals: chain selection, gas management and finality are out of
//! scope — only the act of handing a verification hash to *something*
//! that returns a transaction identifier is modeled).

use async_trait::async_trait;
use tally_types::ElectionId;

/// Failure of a blockchain publication attempt.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The publisher backend rejected or failed to process the request.
    #[error("blockchain publisher error: {0}")]
    Backend(#[source] eyre::Error),
}

/// Publishes a finalized result's verification hash to an external
/// ledger and returns its transaction identifier.
///
/// Per `DESIGN.md` Open Question 3, no production implementation ships in
/// this crate: which chain, how transactions are signed and funded, and
/// how finality is awaited are all explicitly out of spec scope. Only the
/// trait boundary exists, so `tally-service::api` can be wired against a
/// real publisher without changing any call site.
#[async_trait]
pub trait BlockchainPublisher: Send + Sync {
    /// Publishes `verification_hash` for `election_id` and returns the
    /// resulting transaction hash.
    async fn publish(
        &self,
        election_id: ElectionId,
        verification_hash: &str,
    ) -> Result<String, PublishError>;
}
