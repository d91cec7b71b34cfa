//! The canonical verification-hash input format (spec §6), shared by
//! [`crate::services::tally_engine`] (which computes it at finalize time)
//! and [`crate::services::audit_log::Verifier`] (which recomputes it).
//!
//! SHA-256 over the concatenation, no separators, of:
//! `election_id (16B) ‖ n (fixed width) ‖ C_1..C_M (fixed width, candidate
//! order) ‖ tally_1..tally_M (8B each, candidate order) ‖ sorted trustee
//! indices (1B each, length-prefixed with 1 byte)`. Output is
//! lowercase-hex.

use num_bigint::BigUint;
use sha2::{Digest, Sha256};
use tally_core::paillier::{Ciphertext, PaillierPublicKey};
use tally_types::crypto::{ciphertext_width_bytes, FixedWidthInteger};
use tally_types::{ElectionId, TrusteeIndex};

/// Computes the verification hash for a finalized tally.
///
/// `aggregated` and `tally` must be in candidate order and the same
/// length; `trustee_indices` need not be pre-sorted, this function sorts
/// its own copy.
pub fn compute(
    election_id: ElectionId,
    pk: &PaillierPublicKey,
    aggregated: &[Ciphertext],
    tally: &[u64],
    trustee_indices: &[TrusteeIndex],
) -> String {
    assert_eq!(
        aggregated.len(),
        tally.len(),
        "aggregated ciphertexts and tally must have the same length"
    );

    let ciphertext_width = ciphertext_width_bytes(pk.bit_length());
    // n has roughly half the bit width of n^2; widen generously so a
    // fresh keypair's n never overflows this width, matching the same
    // ceil(bits/8) convention the ciphertext width uses.
    let n_width = pk.bit_length().div_ceil(8) as usize;

    let mut hasher = Sha256::new();
    hasher.update(election_id.to_be_bytes());
    hasher.update(FixedWidthInteger::encode(pk.n(), n_width).as_bytes());

    for ciphertext in aggregated {
        hasher.update(FixedWidthInteger::encode(ciphertext.value(), ciphertext_width).as_bytes());
    }

    for &count in tally {
        hasher.update(BigUint::from(count).to_bytes_be_padded(8));
    }

    let mut sorted_indices: Vec<u16> = trustee_indices.iter().map(|idx| idx.get()).collect();
    sorted_indices.sort_unstable();
    hasher.update([sorted_indices.len() as u8]);
    for index in sorted_indices {
        // Spec §6 fixes trustee indices at 1 byte each; realistic trustee
        // counts (N <= 255) never need more.
        debug_assert!(index <= u8::MAX as u16, "trustee index does not fit in 1 byte");
        hasher.update([index as u8]);
    }

    let digest = hasher.finalize();
    hex_lower(&digest)
}

/// Extension trait giving `BigUint` a fixed-width big-endian encoding
/// without pulling in the wire-format machinery of `tally-types::crypto`
/// for plain `u64` tally counts.
trait ToBytesBePadded {
    fn to_bytes_be_padded(&self, width: usize) -> Vec<u8>;
}

impl ToBytesBePadded for BigUint {
    fn to_bytes_be_padded(&self, width: usize) -> Vec<u8> {
        let raw = self.to_bytes_be();
        assert!(raw.len() <= width, "value does not fit in {width} bytes");
        let mut bytes = vec![0u8; width - raw.len()];
        bytes.extend_from_slice(&raw);
        bytes
    }
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(s, "{byte:02x}").expect("writing to a String never fails");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use tally_core::paillier::{encrypt, generate_keypair};

    #[test]
    fn is_deterministic_in_its_inputs() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let (pk, _sk) = generate_keypair(256, &mut rng).unwrap();
        let election_id = ElectionId::new_v4();
        let c1 = encrypt(&pk, &BigUint::from(2u32), &mut rng).unwrap();
        let c2 = encrypt(&pk, &BigUint::from(1u32), &mut rng).unwrap();
        let aggregated = vec![c1, c2];
        let tally = vec![2u64, 1u64];
        let trustees = vec![TrusteeIndex::new(1), TrusteeIndex::new(2)];

        let a = compute(election_id, &pk, &aggregated, &tally, &trustees);
        let b = compute(election_id, &pk, &aggregated, &tally, &trustees);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn trustee_index_order_does_not_affect_the_hash() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let (pk, _sk) = generate_keypair(256, &mut rng).unwrap();
        let election_id = ElectionId::new_v4();
        let c = encrypt(&pk, &BigUint::from(5u32), &mut rng).unwrap();
        let aggregated = vec![c];
        let tally = vec![5u64];

        let ascending = vec![TrusteeIndex::new(1), TrusteeIndex::new(3)];
        let descending = vec![TrusteeIndex::new(3), TrusteeIndex::new(1)];
        assert_eq!(
            compute(election_id, &pk, &aggregated, &tally, &ascending),
            compute(election_id, &pk, &aggregated, &tally, &descending)
        );
    }

    #[test]
    fn mutating_the_tally_changes_the_hash() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let (pk, _sk) = generate_keypair(256, &mut rng).unwrap();
        let election_id = ElectionId::new_v4();
        let c = encrypt(&pk, &BigUint::from(5u32), &mut rng).unwrap();
        let aggregated = vec![c];
        let trustees = vec![TrusteeIndex::new(1)];

        let original = compute(election_id, &pk, &aggregated, &[5u64], &trustees);
        let mutated = compute(election_id, &pk, &aggregated, &[6u64], &trustees);
        assert_ne!(original, mutated);
    }
}
