//! Deterministic election/trustee/ballot fixtures for engine and verifier
//! tests: small Paillier key sizes and a seeded `ChaCha20Rng` so test runs
//! are reproducible without needing a real trustee ceremony.

use chrono::Utc;
use num_bigint::BigUint;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tally_core::paillier::{self, PaillierPrivateKey, PaillierPublicKey};
use tally_core::shamir::{self, KeyShare, ShareParameters};
use tally_core::threshold::{self, ChaumPedersenProof, PartialDecryption, ShareCommitment, ThresholdFinalizer};
use tally_service::services::election_store::{
    ElectionRecord, EncryptedBallotRecord, TrusteeRecord, TrusteeStatus,
};
use tally_types::{ElectionId, ElectionState, TrusteeIndex};
use uuid::Uuid;

use crate::memory_store::MemoryElectionStore;

/// Key size used by fixtures; small enough for fast test keygen while still
/// exercising every arithmetic path (a real deployment uses
/// `TallyServiceConfig::paillier_key_bits`'s much larger default).
pub const FIXTURE_KEY_BITS: u32 = 256;

/// A fully keyed, shared election ready to drive a tallying session: the
/// public key, the (test-only) private key for cross-checking direct
/// decryption against threshold combination, and every trustee's share and
/// published commitment.
pub struct ElectionFixture {
    /// The election's Paillier public key.
    pub pk: PaillierPublicKey,
    /// The undistributed private key, kept only so tests can assert
    /// threshold combination agrees with direct decryption; never touched
    /// by the engine itself.
    pub sk: PaillierPrivateKey,
    /// The finalization multiplier published at the end of the ceremony.
    pub finalizer: ThresholdFinalizer,
    /// The parameters shares were issued under.
    pub field: ShareParameters,
    /// Every trustee's Shamir share, indexed `0..total_trustees`.
    pub shares: Vec<KeyShare>,
    /// Every trustee's published commitment, same order as `shares`.
    pub commitments: Vec<ShareCommitment>,
    /// Ordered candidate names.
    pub candidates: Vec<String>,
    /// `K`, the required quorum.
    pub k: u16,
    /// `N`, the total trustee count.
    pub n: u16,
}

/// Builds an `ElectionFixture` with `k`-of-`n` trustees and the given
/// candidate names, deterministic for a given `seed`.
pub fn build_fixture(seed: u64, k: u16, n: u16, candidates: &[&str]) -> ElectionFixture {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let (pk, sk) = paillier::generate_keypair(FIXTURE_KEY_BITS, &mut rng).expect("fixture keygen succeeds");
    let (shares, field) = shamir::issue_shares(sk.lambda(), k, n, &mut rng).expect("fixture share issuance succeeds");
    let commitments = shares.iter().map(|share| threshold::commit_share(&pk, share)).collect();
    let finalizer = ThresholdFinalizer::from_mu(sk.mu().clone());

    ElectionFixture {
        pk,
        sk,
        finalizer,
        field,
        shares,
        commitments,
        candidates: candidates.iter().map(|c| c.to_string()).collect(),
        k,
        n,
    }
}

/// Seeds `store` with an active election and every trustee slot from
/// `fixture`, returning the election id.
pub fn seed_active_election(store: &MemoryElectionStore, fixture: &ElectionFixture) -> ElectionId {
    let election_id = ElectionId::new_v4();
    store.seed_election(ElectionRecord {
        id: election_id,
        title: "fixture election".to_string(),
        candidates: fixture.candidates.clone(),
        pk: fixture.pk.clone(),
        finalizer: fixture.finalizer.clone(),
        field: fixture.field.clone(),
        required_trustees: fixture.k,
        total_trustees: fixture.n,
        state: ElectionState::Active,
        created_at: Utc::now(),
    });

    for (share, commitment) in fixture.shares.iter().zip(&fixture.commitments) {
        store.seed_trustee(TrusteeRecord {
            election_id,
            index: TrusteeIndex::new(share.index),
            public_commitment: commitment.clone(),
            // The encrypted-at-rest share payload is opaque to the engine;
            // fixtures stash nothing usable since no test ever asks the
            // store to decrypt it.
            encrypted_share: Vec::new(),
            status: TrusteeStatus::Active,
        });
    }

    election_id
}

/// Encrypts and inserts a ballot casting exactly one vote for
/// `candidate_index` (0-based) out of `fixture.candidates.len()`
/// candidates.
pub async fn cast_ballot(
    store: &MemoryElectionStore,
    fixture: &ElectionFixture,
    election_id: ElectionId,
    candidate_index: usize,
    rng: &mut ChaCha20Rng,
) {
    use tally_service::services::election_store::ElectionStore;

    let ciphertexts = (0..fixture.candidates.len())
        .map(|j| {
            let value = if j == candidate_index { BigUint::from(1u32) } else { BigUint::from(0u32) };
            paillier::encrypt(&fixture.pk, &value, rng).expect("vote value is in range")
        })
        .collect();

    store
        .insert_ballot(EncryptedBallotRecord {
            vote_id: Uuid::new_v4(),
            election_id,
            ciphertexts,
            nonce: Uuid::new_v4().to_string(),
            is_tallied: false,
        })
        .await
        .expect("fixture ballot nonces never collide");
}

/// Produces trustee `share.index`'s partial decryption and proof for every
/// candidate's aggregated ciphertext, as a caller would assemble before
/// calling `submit_partial`.
pub fn partial_decrypt_all(
    fixture: &ElectionFixture,
    share: &KeyShare,
    aggregated: &[tally_core::paillier::Ciphertext],
    rng: &mut ChaCha20Rng,
) -> (Vec<PartialDecryption>, Vec<ChaumPedersenProof>) {
    aggregated
        .iter()
        .map(|ciphertext| threshold::partial_decrypt(&fixture.pk, share, ciphertext, fixture.n, &fixture.field, rng))
        .unzip()
}
