//! A no-op [`BlockchainPublisher`] for tests, returning a deterministic
//! fake transaction hash instead of talking to a real ledger.

use async_trait::async_trait;
use tally_service::services::blockchain::{BlockchainPublisher, PublishError};
use tally_types::ElectionId;

/// Always succeeds, echoing back a fake transaction hash derived from the
/// verification hash it was handed.
#[derive(Clone, Default)]
pub struct NoopBlockchainPublisher;

impl NoopBlockchainPublisher {
    /// Builds a publisher.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BlockchainPublisher for NoopBlockchainPublisher {
    async fn publish(
        &self,
        _election_id: ElectionId,
        verification_hash: &str,
    ) -> Result<String, PublishError> {
        Ok(format!("test-tx-{verification_hash}"))
    }
}
