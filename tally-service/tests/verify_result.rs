//! Coverage of [`Verifier::verify`]: a finalized election's verification
//! hash recomputes to the same value until something in the persisted
//! aggregate, tally or trustee set is tampered with.

use std::sync::Arc;

use num_bigint::BigUint;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tally_core::paillier::Ciphertext;
use tally_service::services::audit_log::Verifier;
use tally_service::services::tally_engine::{PartialDecryptionSubmission, TallyEngine};
use tally_test_utils::fixtures::{build_fixture, cast_ballot, partial_decrypt_all, seed_active_election};
use tally_test_utils::{InMemoryAuditLog, MemoryElectionStore};
use tally_types::TrusteeIndex;

async fn finalized_store(seed: u64) -> (MemoryElectionStore, tally_types::ElectionId) {
    let fixture = build_fixture(seed, 2, 3, &["Alice", "Bob"]);
    let store = MemoryElectionStore::new();
    let election_id = seed_active_election(&store, &fixture);
    let mut rng = ChaCha20Rng::seed_from_u64(seed + 1);
    cast_ballot(&store, &fixture, election_id, 0, &mut rng).await;
    cast_ballot(&store, &fixture, election_id, 1, &mut rng).await;

    let engine = TallyEngine::new(Arc::new(store.clone()), Arc::new(InMemoryAuditLog::new()));
    let session = engine.start_tally(election_id).await.unwrap();
    let aggregated = session.aggregated.clone().unwrap();
    for share in &fixture.shares[0..2] {
        let (partials, proofs) = partial_decrypt_all(&fixture, share, &aggregated, &mut rng);
        engine
            .submit_partial(
                election_id,
                PartialDecryptionSubmission {
                    trustee_index: TrusteeIndex::new(share.index),
                    partials,
                    proofs,
                },
            )
            .await
            .unwrap();
    }
    engine.finalize(election_id).await.unwrap();

    (store, election_id)
}

#[tokio::test]
async fn verify_result_is_true_for_an_untouched_finalized_election() {
    let (store, election_id) = finalized_store(100).await;
    let verifier = Verifier::new(Arc::new(store));
    let (valid, _hash) = verifier.verify(election_id).await.unwrap();
    assert!(valid);
}

#[tokio::test]
async fn verify_result_is_false_after_tally_count_is_mutated() {
    let (store, election_id) = finalized_store(110).await;

    use tally_service::services::election_store::ElectionStore;
    let mut result = store.get_result(election_id).await.unwrap().unwrap();
    result.tally[0].1 += 1;
    // `write_result` is write-once in the real store; the in-memory test
    // double enforces the same rule, so mutate the stored copy directly by
    // reseeding the election's session/result state rather than calling
    // write_result twice.
    store.overwrite_result_for_test(result);

    let verifier = Verifier::new(Arc::new(store));
    let (valid, _hash) = verifier.verify(election_id).await.unwrap();
    assert!(!valid);
}

#[tokio::test]
async fn verify_result_is_false_after_aggregated_ciphertext_is_mutated() {
    let (store, election_id) = finalized_store(120).await;

    use tally_service::services::election_store::ElectionStore;
    let mut session = store.get_session(election_id).await.unwrap().unwrap();
    let mut aggregated = session.aggregated.take().unwrap();
    aggregated[0] = Ciphertext::from_raw(aggregated[0].value() + BigUint::from(1u32));
    session.aggregated = Some(aggregated);
    store.update_session(session).await.unwrap();

    let verifier = Verifier::new(Arc::new(store));
    let (valid, _hash) = verifier.verify(election_id).await.unwrap();
    assert!(!valid);
}
