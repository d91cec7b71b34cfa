//! Shamir secret sharing over the integers (Shoup-style), used to split the
//! Paillier decryption exponent `lambda` across `n` trustees such that any
//! `k` of them can recover it.
//!
//! Shares are **not** reduced modulo a field prime: the sharing polynomial's
//! coefficients are drawn from a bounded integer range and each share is the
//! exact integer evaluation `f(index)`. This is required for the
//! [`crate::threshold::combine`] step, which recovers `Delta * lambda` via
//! the classical Lagrange identity `sum_i (Delta * lambda_i(0)) * f(i) =
//! Delta * f(0)`; that identity only holds when the `f(i)` are exact integer
//! evaluations, not residues mod some unrelated prime. See `DESIGN.md` for
//! the history of this decision. The Paillier finalization multiplier `mu`
//! is published separately and applied once, after combination — see
//! [`crate::threshold::combine`].

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

/// Upper bound, in bits, on any secret this crate will ever share (a
/// 4096-bit Paillier modulus has `lambda < n`, so 4224 bits leaves
/// headroom).
const SECRET_BOUND_BITS: u32 = 4224;

/// Additional statistical-hiding margin (Shoup's `kappa`) added on top of the
/// secret's bit length when sampling the polynomial's non-constant
/// coefficients, so that no partial information about `lambda` leaks from a
/// single share's magnitude.
const STATISTICAL_HIDING_BITS: u32 = 128;

/// Trustee indices are `u16`, so no evaluation point exceeds this many bits.
const INDEX_BITS: u32 = 16;

/// Bit length of a SHA-256 Fiat–Shamir challenge, used only to size the
/// Chaum–Pedersen proof's random mask (see [`ShareParameters::mask_bound`]).
const CHALLENGE_BITS: u32 = 256;

/// Errors from share issuance or combination.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The requested threshold `k` exceeds the number of trustees `n`.
    #[error("threshold {k} exceeds trustee count {n}")]
    ThresholdExceedsTrusteeCount {
        /// Requested threshold.
        k: u16,
        /// Total trustee count.
        n: u16,
    },
    /// `k` or `n` was zero.
    #[error("threshold and trustee count must both be nonzero")]
    ZeroParameter,
}

/// Errors from recombining partial results.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CombineError {
    /// Fewer than `k` distinct partial results were supplied.
    #[error("combination requires at least {required} shares, got {got}")]
    InsufficientShares {
        /// Threshold required.
        required: u16,
        /// Shares actually supplied.
        got: u16,
    },
    /// Two supplied shares had the same trustee index.
    #[error("duplicate trustee index {0} in combination input")]
    DuplicateIndex(u16),
    /// A Lagrange coefficient scaled by `Delta` was not an exact integer,
    /// which would indicate a trustee index outside the combining set's
    /// expected range.
    #[error("lagrange coefficient for trustee {0} did not scale to an exact integer")]
    NonIntegralCoefficient(u16),
}

/// One trustee's share of the shared secret, a point `(index, value)` on the
/// sharing polynomial. `value` is the exact integer `f(index)`, never
/// reduced modulo anything.
#[derive(Clone, Debug, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
pub struct KeyShare {
    /// 1-based trustee index; `0` is never issued since it would reveal the
    /// polynomial's constant term (the secret itself).
    pub index: u16,
    /// The share value, `f(index)` evaluated over the integers.
    pub value: BigUint,
}

/// Parameters published alongside a set of shares so that
/// [`crate::threshold::partial_decrypt`] can size its Chaum–Pedersen proof's
/// random mask large enough to statistically hide the share it protects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareParameters {
    mask_bound: BigUint,
}

impl ShareParameters {
    /// Exclusive upper bound the Chaum–Pedersen proof's random mask `k`
    /// should be drawn from.
    pub fn mask_bound(&self) -> &BigUint {
        &self.mask_bound
    }
}

fn index_to_scalar(index: u16) -> BigUint {
    BigUint::from(index)
}

/// Evaluates a polynomial given by `coeffs` (lowest degree first) at `x`,
/// over the integers. No modular reduction: the result is the exact value
/// `f(x)`.
fn evaluate_poly(coeffs: &[BigUint], x: &BigUint) -> BigUint {
    let mut acc = BigUint::zero();
    for coeff in coeffs.iter().rev() {
        acc = &acc * x + coeff;
    }
    acc
}

/// Conservative bound, in bits, on the magnitude of any share produced by a
/// degree-`(k-1)` polynomial whose coefficients are bounded by
/// `SECRET_BOUND_BITS + STATISTICAL_HIDING_BITS` bits, evaluated at points
/// no larger than `INDEX_BITS` bits.
fn share_bound_bits(k: u16) -> u32 {
    SECRET_BOUND_BITS + STATISTICAL_HIDING_BITS + INDEX_BITS * u32::from(k.saturating_sub(1))
}

/// Splits `secret` into `n` Shamir shares reconstructible by any `k` of them.
///
/// The polynomial's constant term is `secret` itself (an exact integer, not
/// reduced); the other `k - 1` coefficients are drawn uniformly from
/// `[0, 2^(SECRET_BOUND_BITS + STATISTICAL_HIDING_BITS))`. Every share is the
/// unreduced integer evaluation `f(index)`.
pub fn issue_shares<R: Rng + CryptoRng>(
    secret: &BigUint,
    k: u16,
    n: u16,
    rng: &mut R,
) -> Result<(Vec<KeyShare>, ShareParameters), DomainError> {
    if k == 0 || n == 0 {
        return Err(DomainError::ZeroParameter);
    }
    if k > n {
        return Err(DomainError::ThresholdExceedsTrusteeCount { k, n });
    }

    let coefficient_bound = BigUint::one() << (SECRET_BOUND_BITS + STATISTICAL_HIDING_BITS);
    let mut coeffs = Vec::with_capacity(k as usize);
    coeffs.push(secret.clone());
    for _ in 1..k {
        coeffs.push(rng.gen_biguint_below(&coefficient_bound));
    }

    let shares = (1..=n)
        .map(|index| KeyShare {
            index,
            value: evaluate_poly(&coeffs, &index_to_scalar(index)),
        })
        .collect();

    let mask_bound_bits = share_bound_bits(k) + CHALLENGE_BITS + STATISTICAL_HIDING_BITS;
    let mask_bound = BigUint::one() << mask_bound_bits;

    Ok((shares, ShareParameters { mask_bound }))
}

fn signed_lagrange_numerator_denominator(
    index: u16,
    others: &[u16],
) -> (num_bigint::BigInt, num_bigint::BigInt) {
    use num_bigint::BigInt;
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
/// combining with the set `others`. `Delta` must be divisible by every
/// pairwise index difference; `total_trustees!` always is.
fn scaled_lagrange_coefficient(
    delta: &BigUint,
    index: u16,
    others: &[u16],
) -> Result<num_bigint::BigInt, CombineError> {
    use num_bigint::{BigInt, Sign};
    use num_integer::Integer;

    let (numerator, denominator) = signed_lagrange_numerator_denominator(index, others);
    let delta_signed = BigInt::from_biguint(Sign::Plus, delta.clone());
    let scaled_numerator = delta_signed * numerator;
    let (quotient, remainder) = scaled_numerator.div_mod_floor(&denominator);
    if !remainder.is_zero() {
        return Err(CombineError::NonIntegralCoefficient(index));
    }
    Ok(quotient)
}

fn delta_factorial(total: u16) -> BigUint {
    let mut acc = BigUint::one();
    for i in 2..=total {
        acc *= BigUint::from(i);
    }
    acc
}

/// Recombines `k`-or-more shares at `x = 0` to recover the shared secret,
/// over the integers: `Delta * secret = sum_i (Delta * lambda_i(0)) * f(i)`,
/// for `Delta = total_trustees!`.
///
/// Exposed for testing against a non-threshold Paillier key; the threshold
/// decryption path combines partial *decryptions* instead, via
/// [`crate::threshold::combine`], since the live system never reassembles
/// `lambda` itself.
pub fn reconstruct_secret(
    shares: &[KeyShare],
    k: u16,
    total_trustees: u16,
) -> Result<BigUint, CombineError> {
    use num_bigint::{BigInt, Sign};
    use num_integer::Integer;
    use num_traits::Signed;

    let mut seen = std::collections::HashSet::new();
    for share in shares {
        if !seen.insert(share.index) {
            return Err(CombineError::DuplicateIndex(share.index));
        }
    }
    if shares.len() < k as usize {
        return Err(CombineError::InsufficientShares {
            required: k,
            got: shares.len() as u16,
        });
    }

    let indices: Vec<u16> = shares.iter().map(|s| s.index).collect();
    let delta = delta_factorial(total_trustees);
    let mut scaled_acc = BigInt::zero();
    for share in shares {
        let coeff = scaled_lagrange_coefficient(&delta, share.index, &indices)?;
        let value_signed = BigInt::from_biguint(Sign::Plus, share.value.clone());
        scaled_acc += coeff * value_signed;
    }

    let delta_signed = BigInt::from_biguint(Sign::Plus, delta);
    let (quotient, remainder) = scaled_acc.div_mod_floor(&delta_signed);
    if !remainder.is_zero() || quotient.is_negative() {
        return Err(CombineError::NonIntegralCoefficient(0));
    }
    Ok(quotient.to_biguint().expect("non-negative by construction"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn reconstructs_secret_from_exact_threshold() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let secret = BigUint::from(123456789u64);
        let (shares, _params) = issue_shares(&secret, 3, 5, &mut rng).unwrap();
        let quorum = &shares[0..3];
        let recovered = reconstruct_secret(quorum, 3, 5).unwrap();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn reconstructs_from_any_quorum_subset() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let secret = BigUint::from(987654321u64);
        let (shares, _params) = issue_shares(&secret, 3, 5, &mut rng).unwrap();
        let quorum_a: Vec<_> = shares[0..3].to_vec();
        let quorum_b: Vec<_> = vec![shares[1].clone(), shares[2].clone(), shares[4].clone()];
        assert_eq!(
            reconstruct_secret(&quorum_a, 3, 5).unwrap(),
            reconstruct_secret(&quorum_b, 3, 5).unwrap()
        );
    }

    #[test]
    fn rejects_below_threshold_quorum() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let secret = BigUint::from(42u32);
        let (shares, _params) = issue_shares(&secret, 3, 5, &mut rng).unwrap();
        let err = reconstruct_secret(&shares[0..2], 3, 5).unwrap_err();
        assert_eq!(
            err,
            CombineError::InsufficientShares {
                required: 3,
                got: 2
            }
        );
    }

    #[test]
    fn rejects_threshold_greater_than_trustee_count() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let err = issue_shares(&BigUint::from(1u32), 6, 5, &mut rng).unwrap_err();
        assert_eq!(
            err,
            DomainError::ThresholdExceedsTrusteeCount { k: 6, n: 5 }
        );
    }
}
