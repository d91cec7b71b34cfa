//! Threshold decryption: per-trustee partial decryption, a Chaum–Pedersen
//! proof of its correctness, and Lagrange combination of a quorum of partial
//! decryptions back into a Paillier plaintext.
//!
//! The combination step follows the Damgård–Jurik/Shoup style of threshold
//! Paillier: partial decryptions are raised to `2*Delta*share` (`Delta = n!`
//! clears the Lagrange-coefficient denominators so every exponent used on a
//! ciphertext stays an integer), and the finalization multiplier `mu` is
//! applied once, after combination, per the Open Question resolution in
//! `DESIGN.md`.

use std::collections::HashSet;

use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::paillier::{mod_inverse, Ciphertext, PaillierPublicKey};
use crate::shamir::{CombineError as ShamirCombineError, KeyShare, ShareParameters};

/// Fixed public base used for share commitments and the Chaum–Pedersen
/// proof's first leg. Any generator of a large-order subgroup of
/// `Z_{n^2}^*` works; 4 is a quadratic residue and avoids the low-order
/// elements that occasionally trip up small bases.
const COMMITMENT_BASE: u32 = 4;

/// A trustee's public commitment to its Shamir share, `g^{s_i} mod n^2`,
/// published once at share-issuance time so `verify_partial` can check a
/// submitted partial decryption without learning `s_i`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareCommitment(BigUint);

/// The Paillier finalization multiplier, published once at the end of the
/// trustee ceremony that issued the Shamir shares.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdFinalizer {
    mu: BigUint,
}

impl ThresholdFinalizer {
    /// Wraps a finalization multiplier published by the trustee ceremony.
    pub fn from_mu(mu: BigUint) -> Self {
        Self { mu }
    }
}

/// A trustee's partial decryption of a ciphertext.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialDecryption {
    /// Which trustee produced this partial decryption.
    pub trustee_index: u16,
    value: BigUint,
}

impl PartialDecryption {
    /// The raw partial decryption value, `C^(2*Delta*s_i) mod n^2`.
    pub fn value(&self) -> &BigUint {
        &self.value
    }

    /// Reassembles a partial decryption from its wire-decoded parts.
    pub fn from_parts(trustee_index: u16, value: BigUint) -> Self {
        Self {
            trustee_index,
            value,
        }
    }
}

impl ShareCommitment {
    /// The raw commitment value, `g^{s_i} mod n^2`.
    pub fn value(&self) -> &BigUint {
        &self.0
    }

    /// Wraps a raw commitment value read back from storage.
    pub fn from_raw(value: BigUint) -> Self {
        Self(value)
    }
}

/// A non-interactive (Fiat–Shamir) Chaum–Pedersen proof that a partial
/// decryption was computed with the same exponent as its published share
/// commitment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaumPedersenProof {
    t1: BigUint,
    t2: BigUint,
    response: BigUint,
}

impl ChaumPedersenProof {
    /// The proof's three scalar components, `(t1, t2, response)`.
    pub fn as_parts(&self) -> (&BigUint, &BigUint, &BigUint) {
        (&self.t1, &self.t2, &self.response)
    }

    /// Reassembles a proof from its wire-decoded parts.
    pub fn from_parts(t1: BigUint, t2: BigUint, response: BigUint) -> Self {
        Self { t1, t2, response }
    }
}

/// Errors combining a quorum of partial decryptions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CombineError {
    /// Delegated straight through from [`crate::shamir`].
    #[error(transparent)]
    Shamir(#[from] ShamirCombineError),
    /// A Lagrange coefficient scaled by `Delta` was not an exact integer,
    /// which would indicate a trustee index outside `1..=total_trustees`.
    #[error("lagrange coefficient for trustee {0} did not scale to an exact integer")]
    NonIntegralCoefficient(u16),
}

/// Publishes a trustee's commitment to its Shamir share, to be checked later
/// by [`verify_partial`].
pub fn commit_share(pk: &PaillierPublicKey, share: &KeyShare) -> ShareCommitment {
    let base = BigUint::from(COMMITMENT_BASE);
    ShareCommitment(base.modpow(&share.value, pk.n_squared()))
}

/// Computes `Delta = total_trustees!`, the Lagrange-denominator-clearing
/// constant used throughout this module.
fn delta_factorial(total_trustees: u16) -> BigUint {
    let mut acc = BigUint::one();
    for i in 2..=total_trustees {
        acc *= BigUint::from(i);
    }
    acc
}

/// `base^(2 * delta) mod n^2`, the effective base a partial decryption's
/// Chaum–Pedersen proof is taken against.
fn doubled_delta_base(pk: &PaillierPublicKey, ciphertext: &Ciphertext, delta: &BigUint) -> BigUint {
    let exponent = BigUint::from(2u32) * delta;
    ciphertext.value().modpow(&exponent, pk.n_squared())
}

/// Computes the Fiat–Shamir challenge as the full SHA-256 digest, read as an
/// integer. Unlike a textbook discrete-log proof over a prime-order group,
/// there is no field modulus to reduce into here: the response is computed
/// over the integers (see [`partial_decrypt`]), so the challenge is simply
/// bounded by `2^256`.
fn fiat_shamir_challenge(
    pk: &PaillierPublicKey,
    ciphertext: &Ciphertext,
    partial: &BigUint,
    commitment: &ShareCommitment,
    t1: &BigUint,
    t2: &BigUint,
) -> BigUint {
    let mut hasher = Sha256::new();
    for value in [
        pk.n(),
        ciphertext.value(),
        partial,
        &commitment.0,
        t1,
        t2,
    ] {
        hasher.update(value.to_bytes_be());
    }
    let digest = hasher.finalize();
    BigUint::from_bytes_be(&digest)
}

/// Produces a partial decryption of `ciphertext` under `share`, together
/// with a Chaum–Pedersen proof that it used the same exponent as the
/// trustee's published [`ShareCommitment`].
///
/// `total_trustees` must match the `n` passed to
/// [`crate::shamir::issue_shares`] for this election.
pub fn partial_decrypt<R: Rng + CryptoRng>(
    pk: &PaillierPublicKey,
    share: &KeyShare,
    ciphertext: &Ciphertext,
    total_trustees: u16,
    params: &ShareParameters,
    rng: &mut R,
) -> (PartialDecryption, ChaumPedersenProof) {
    let delta = delta_factorial(total_trustees);
    let exponent = BigUint::from(2u32) * &delta * &share.value;
    let value = ciphertext.value().modpow(&exponent, pk.n_squared());

    let base1 = BigUint::from(COMMITMENT_BASE);
    let base2 = doubled_delta_base(pk, ciphertext, &delta);

    let k = rng.gen_biguint_below(params.mask_bound());
    let t1 = base1.modpow(&k, pk.n_squared());
    let t2 = base2.modpow(&k, pk.n_squared());

    let commitment = ShareCommitment(base1.modpow(&share.value, pk.n_squared()));
    let challenge = fiat_shamir_challenge(pk, ciphertext, &value, &commitment, &t1, &t2);
    // Integer addition, not reduced: `base^response` below is a modular
    // exponentiation, which is correct for any nonnegative exponent
    // regardless of its bit length, so there is no field to reduce into.
    let response = k + &challenge * &share.value;

    (
        PartialDecryption {
            trustee_index: share.index,
            value,
        },
        ChaumPedersenProof { t1, t2, response },
    )
}

/// Verifies that `partial` was honestly computed from the share committed to
/// by `commitment`, without learning the share value.
pub fn verify_partial(
    pk: &PaillierPublicKey,
    ciphertext: &Ciphertext,
    total_trustees: u16,
    partial: &PartialDecryption,
    proof: &ChaumPedersenProof,
    commitment: &ShareCommitment,
) -> bool {
    let delta = delta_factorial(total_trustees);
    let base1 = BigUint::from(COMMITMENT_BASE);
    let base2 = doubled_delta_base(pk, ciphertext, &delta);

    let challenge = fiat_shamir_challenge(
        pk,
        ciphertext,
        &partial.value,
        commitment,
        &proof.t1,
        &proof.t2,
    );

    let lhs1 = base1.modpow(&proof.response, pk.n_squared());
    let rhs1 = (&proof.t1 * commitment.0.modpow(&challenge, pk.n_squared())) % pk.n_squared();

    let lhs2 = base2.modpow(&proof.response, pk.n_squared());
    let rhs2 = (&proof.t2 * partial.value.modpow(&challenge, pk.n_squared())) % pk.n_squared();

    lhs1 == rhs1 && lhs2 == rhs2
}

fn signed_lagrange_numerator_denominator(index: u16, others: &[u16]) -> (BigInt, BigInt) {
    let mut numerator = BigInt::one();
    let mut denominator = BigInt::one();
    for &j in others {
        if j == index {
            continue;
        }
        numerator *= BigInt::from(-(j as i64));
        denominator *= BigInt::from(index as i64 - j as i64);
    }
    (numerator, denominator)
}

/// `Delta * lambda_i(0)`, scaled to an exact integer, for trustee `index`
/// combining with the set `others`.
fn scaled_lagrange_coefficient(
    delta: &BigUint,
    index: u16,
    others: &[u16],
) -> Result<BigInt, CombineError> {
    let (numerator, denominator) = signed_lagrange_numerator_denominator(index, others);
    let delta_signed = BigInt::from_biguint(Sign::Plus, delta.clone());
    let scaled_numerator = delta_signed * numerator;
    let (quotient, remainder) = scaled_numerator.div_mod_floor(&denominator);
    if !remainder.is_zero() {
        return Err(CombineError::NonIntegralCoefficient(index));
    }
    Ok(quotient)
}

fn modpow_signed(base: &BigUint, exponent: &BigInt, modulus: &BigUint) -> Option<BigUint> {
    if exponent.is_negative() {
        let magnitude = exponent.magnitude().clone();
        let inverse = mod_inverse(base, modulus)?;
        Some(inverse.modpow(&magnitude, modulus))
    } else {
        Some(base.modpow(&exponent.magnitude().clone(), modulus))
    }
}

/// The Paillier `L` function, `L(x) = (x - 1) / n`.
fn l_function(x: &BigUint, n: &BigUint) -> BigUint {
    (x - BigUint::one()) / n
}

/// Combines a quorum of verified partial decryptions into the plaintext sum
/// encrypted by `ciphertext`.
///
/// `parts` must contain at least `threshold` entries with distinct
/// `trustee_index` values drawn from `1..=total_trustees`; callers are
/// expected to have already checked each entry's [`ChaumPedersenProof`] via
/// [`verify_partial`] before calling this.
pub fn combine(
    pk: &PaillierPublicKey,
    finalizer: &ThresholdFinalizer,
    ciphertext: &Ciphertext,
    threshold: u16,
    total_trustees: u16,
    parts: &[PartialDecryption],
) -> Result<BigUint, CombineError> {
    let mut seen = HashSet::new();
    for part in parts {
        if !seen.insert(part.trustee_index) {
            return Err(ShamirCombineError::DuplicateIndex(part.trustee_index).into());
        }
    }
    if parts.len() < threshold as usize {
        return Err(ShamirCombineError::InsufficientShares {
            required: threshold,
            got: parts.len() as u16,
        }
        .into());
    }

    let indices: Vec<u16> = parts.iter().map(|p| p.trustee_index).collect();
    let delta = delta_factorial(total_trustees);
    let n_squared = pk.n_squared();

    let mut combined = BigUint::one();
    for part in parts {
        let coeff = scaled_lagrange_coefficient(&delta, part.trustee_index, &indices)?;
        let doubled = coeff * BigInt::from(2u32);
        let factor = modpow_signed(&part.value, &doubled, n_squared)
            .ok_or(CombineError::NonIntegralCoefficient(part.trustee_index))?;
        combined = (combined * factor) % n_squared;
    }

    let l_value = l_function(&combined, pk.n());
    let four_delta_squared = BigUint::from(4u32) * (&delta * &delta);
    let scaling_inverse =
        mod_inverse(&(four_delta_squared % pk.n()), pk.n()).ok_or(CombineError::NonIntegralCoefficient(0))?;
    let plaintext = (l_value * scaling_inverse * &finalizer.mu) % pk.n();
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paillier::{decrypt, encrypt, generate_keypair};
    use crate::shamir::issue_shares;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn threshold_decryption_matches_direct_decryption() {
        let mut rng = ChaCha20Rng::seed_from_u64(100);
        let (pk, sk) = generate_keypair(256, &mut rng).unwrap();
        let (shares, params) = issue_shares(sk.lambda(), 3, 5, &mut rng).unwrap();
        let finalizer = ThresholdFinalizer::from_mu(sk.mu().clone());

        let m = BigUint::from(777u32);
        let ciphertext = encrypt(&pk, &m, &mut rng).unwrap();
        let direct = decrypt(&sk, &pk, &ciphertext).unwrap();
        assert_eq!(direct, m);

        let quorum = &shares[0..3];
        let mut parts = Vec::new();
        for share in quorum {
            let (partial, proof) = partial_decrypt(&pk, share, &ciphertext, 5, &params, &mut rng);
            let commitment = commit_share(&pk, share);
            assert!(verify_partial(
                &pk, &ciphertext, 5, &partial, &proof, &commitment
            ));
            parts.push(partial);
        }

        let recovered = combine(&pk, &finalizer, &ciphertext, 3, 5, &parts).unwrap();
        assert_eq!(recovered, m);
    }

    #[test]
    fn verify_partial_rejects_tampered_value() {
        let mut rng = ChaCha20Rng::seed_from_u64(101);
        let (pk, sk) = generate_keypair(256, &mut rng).unwrap();
        let (shares, params) = issue_shares(sk.lambda(), 3, 5, &mut rng).unwrap();
        let ciphertext = encrypt(&pk, &BigUint::from(5u32), &mut rng).unwrap();

        let share = &shares[0];
        let (mut partial, proof) = partial_decrypt(&pk, share, &ciphertext, 5, &params, &mut rng);
        let commitment = commit_share(&pk, share);
        partial.value += BigUint::one();

        assert!(!verify_partial(
            &pk, &ciphertext, 5, &partial, &proof, &commitment
        ));
    }

    #[test]
    fn combine_rejects_below_threshold_quorum() {
        let mut rng = ChaCha20Rng::seed_from_u64(102);
        let (pk, sk) = generate_keypair(256, &mut rng).unwrap();
        let (shares, params) = issue_shares(sk.lambda(), 3, 5, &mut rng).unwrap();
        let finalizer = ThresholdFinalizer::from_mu(sk.mu().clone());
        let ciphertext = encrypt(&pk, &BigUint::from(9u32), &mut rng).unwrap();

        let mut parts = Vec::new();
        for share in &shares[0..2] {
            let (partial, _proof) = partial_decrypt(&pk, share, &ciphertext, 5, &params, &mut rng);
            parts.push(partial);
        }

        let err = combine(&pk, &finalizer, &ciphertext, 3, 5, &parts).unwrap_err();
        assert!(matches!(
            err,
            CombineError::Shamir(ShamirCombineError::InsufficientShares { required: 3, got: 2 })
        ));
    }
}
