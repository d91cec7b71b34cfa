//! The additive-homomorphic Paillier cryptosystem.
//!
//! Ballots are encrypted per-candidate under a single election-wide public
//! key; homomorphic addition lets the tallying engine aggregate ciphertexts
//! without ever decrypting an individual ballot. Decryption of the aggregate
//! is either performed directly with the private key (used only in tests and
//! fixtures — a real election never materializes an undistributed private
//! key) or via the threshold protocol in [`crate::threshold`].

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::ZeroizeOnDrop;

use crate::primes;

/// Candidate primes are drawn at `bits / 2` each so the modulus `n = p*q`
/// lands at the requested bit length.
const KEYGEN_PRIME_ATTEMPTS: u32 = 4096;

/// Upper bound on distinct-prime retries before keygen gives up.
const MAX_KEYGEN_ATTEMPTS: u32 = 16;

/// Failure modes of [`generate_keypair`].
#[derive(Debug, Error)]
pub enum KeyGenError {
    /// No probable prime was found within the candidate-draw budget.
    #[error("failed to generate a {bits}-bit probable prime within the attempt budget")]
    PrimeGeneration {
        /// Requested prime bit length.
        bits: u32,
    },
    /// `p` and `q` were sampled equal, or `gcd(pq, (p-1)(q-1)) != 1`, for
    /// `MAX_KEYGEN_ATTEMPTS` consecutive draws.
    #[error("failed to find a valid (p, q) pair after {attempts} attempts")]
    ExhaustedRetries {
        /// Number of (p, q) draws attempted.
        attempts: u32,
    },
}

/// Errors arising from using a Paillier key or ciphertext outside its valid
/// domain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The plaintext was not in `[0, n)`.
    #[error("plaintext is out of range [0, n)")]
    PlaintextOutOfRange,
    /// The ciphertext was not a unit of `Z_{n^2}`.
    #[error("ciphertext is not invertible modulo n^2")]
    CiphertextNotInvertible,
}

/// An election's Paillier public key: `n` and the fixed generator `g = n+1`.
///
/// Using `g = n + 1` (the standard simplification) lets encryption avoid an
/// extra exponentiation: `g^m mod n^2 = (1 + m*n) mod n^2`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaillierPublicKey {
    n: BigUint,
    n_squared: BigUint,
}

impl PaillierPublicKey {
    /// The modulus `n`.
    pub fn n(&self) -> &BigUint {
        &self.n
    }

    /// `n^2`, precomputed since every operation reduces modulo it.
    pub fn n_squared(&self) -> &BigUint {
        &self.n_squared
    }

    /// Bit length of `n`, i.e. the key size.
    pub fn bit_length(&self) -> u64 {
        self.n.bits()
    }

    fn from_n(n: BigUint) -> Self {
        let n_squared = &n * &n;
        Self { n, n_squared }
    }
}

/// An election's Paillier private key: the decryption exponent `lambda` and
/// finalization multiplier `mu`.
///
/// In the threshold deployment this key only ever exists transiently inside
/// the trustee ceremony that issues Shamir shares of `lambda` (see
/// [`crate::shamir::issue_shares`]); it is zeroized immediately afterward and
/// is never persisted whole.
#[derive(ZeroizeOnDrop)]
pub struct PaillierPrivateKey {
    #[zeroize(skip)]
    n: BigUint,
    lambda: BigUint,
    mu: BigUint,
}

impl PaillierPrivateKey {
    /// Carmichael's totient `lambda = lcm(p-1, q-1)`, the value shared
    /// across trustees by [`crate::shamir::issue_shares`].
    pub fn lambda(&self) -> &BigUint {
        &self.lambda
    }

    /// The finalization multiplier `mu = (L(g^lambda mod n^2))^-1 mod n`.
    ///
    /// `mu` is published alongside the public key at the end of the trustee
    /// ceremony: on its own it does not reveal `lambda`, since recovering a
    /// plaintext from it still requires the `L(C^lambda mod n^2)` step that
    /// only a quorum of trustees can jointly compute.
    pub fn mu(&self) -> &BigUint {
        &self.mu
    }
}

/// A Paillier ciphertext, an element of `Z_{n^2}^*`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext(BigUint);

impl Ciphertext {
    /// Wraps a raw big-endian-interpreted ciphertext value, as read off the
    /// wire. Callers are responsible for range/invertibility checks before
    /// using it in homomorphic operations.
    pub fn from_raw(value: BigUint) -> Self {
        Self(value)
    }

    /// The raw ciphertext value.
    pub fn value(&self) -> &BigUint {
        &self.0
    }
}

/// The Paillier `L` function: `L(x) = (x - 1) / n`.
///
/// Defined only for `x = 1 mod n`, which holds for every value this crate
/// calls it on.
fn l_function(x: &BigUint, n: &BigUint) -> BigUint {
    (x - BigUint::one()) / n
}

/// Modular inverse of `a` modulo `m`, via the extended Euclidean algorithm.
///
/// `num-bigint` has no built-in `modinv`; `a` and `m` must be coprime.
pub(crate) fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    let (mut old_r, mut r) = (a.clone(), m.clone());
    let (mut old_s, mut s) = (BigUint::one(), BigUint::zero());
    let mut sign_old_s = true; // tracks whether old_s represents a positive value
    let mut sign_s = true;

    while !r.is_zero() {
        let quotient = &old_r / &r;
        let new_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, new_r);

        let qs = &quotient * &s;
        let (new_s, sign_new_s) = signed_sub(&old_s, sign_old_s, &qs, sign_s);
        old_s = std::mem::replace(&mut s, new_s);
        sign_old_s = std::mem::replace(&mut sign_s, sign_new_s);
    }

    if old_r != BigUint::one() {
        return None;
    }

    if sign_old_s {
        Some(old_s % m)
    } else {
        Some((m - (old_s % m)) % m)
    }
}

/// Subtracts two signed-magnitude bigints, returning `(magnitude, positive)`.
fn signed_sub(a: &BigUint, a_pos: bool, b: &BigUint, b_pos: bool) -> (BigUint, bool) {
    match (a_pos, b_pos) {
        (true, true) | (false, false) => {
            if a >= b {
                (a - b, a_pos)
            } else {
                (b - a, !a_pos)
            }
        }
        (true, false) => (a + b, true),
        (false, true) => (a + b, false),
    }
}

/// Generates a fresh `bits`-bit Paillier keypair.
///
/// `bits` is the size of the modulus `n`; each prime factor is drawn at
/// `bits / 2`. Returns [`KeyGenError`] if no suitable `(p, q)` pair is found
/// within the retry budget.
pub fn generate_keypair<R: Rng + CryptoRng>(
    bits: u32,
    rng: &mut R,
) -> Result<(PaillierPublicKey, PaillierPrivateKey), KeyGenError> {
    let factor_bits = bits / 2;
    let one = BigUint::one();

    for attempt in 0..MAX_KEYGEN_ATTEMPTS {
        let p = primes::random_prime(factor_bits, KEYGEN_PRIME_ATTEMPTS, rng)
            .ok_or(KeyGenError::PrimeGeneration { bits: factor_bits })?;
        let q = primes::random_prime(factor_bits, KEYGEN_PRIME_ATTEMPTS, rng)
            .ok_or(KeyGenError::PrimeGeneration { bits: factor_bits })?;

        if p == q {
            continue;
        }

        let n = &p * &q;
        let p_minus_one = &p - &one;
        let q_minus_one = &q - &one;
        let lambda = lcm(&p_minus_one, &q_minus_one);

        // g = n + 1 always satisfies gcd(L(g^lambda mod n^2), n) = 1, so mu
        // is always invertible; the only remaining failure mode is p == q,
        // already excluded above.
        let n_squared = &n * &n;
        let g_pow_lambda = mod_pow_g_is_n_plus_one(&n, &n_squared, &lambda);
        let l_value = l_function(&g_pow_lambda, &n);
        let mu = match mod_inverse(&l_value, &n) {
            Some(mu) => mu,
            None => continue,
        };

        return Ok((PaillierPublicKey::from_n(n.clone()), PaillierPrivateKey { n, lambda, mu }));
    }

    Err(KeyGenError::ExhaustedRetries {
        attempts: MAX_KEYGEN_ATTEMPTS,
    })
}

/// Computes `(1 + n)^e mod n^2` using the binomial shortcut
/// `(1 + n)^e = 1 + e*n mod n^2`, avoiding a full modular exponentiation.
fn mod_pow_g_is_n_plus_one(n: &BigUint, n_squared: &BigUint, e: &BigUint) -> BigUint {
    (BigUint::one() + (e * n) % n_squared) % n_squared
}

fn lcm(a: &BigUint, b: &BigUint) -> BigUint {
    a.lcm(b)
}

/// Encrypts plaintext `m` (interpreted as an integer in `[0, n)`) under `pk`,
/// using randomness `rng` for the blinding factor `r`.
pub fn encrypt<R: Rng + CryptoRng>(
    pk: &PaillierPublicKey,
    m: &BigUint,
    rng: &mut R,
) -> Result<Ciphertext, DomainError> {
    if m >= &pk.n {
        return Err(DomainError::PlaintextOutOfRange);
    }

    loop {
        let r = rng.gen_biguint_range(&BigUint::one(), &pk.n);
        if r.gcd(&pk.n) != BigUint::one() {
            continue;
        }
        let g_pow_m = mod_pow_g_is_n_plus_one(&pk.n, &pk.n_squared, m);
        let r_pow_n = r.modpow(&pk.n, &pk.n_squared);
        let c = (g_pow_m * r_pow_n) % &pk.n_squared;
        return Ok(Ciphertext(c));
    }
}

/// Homomorphically adds two ciphertexts: `Dec(c1 * c2 mod n^2) = Dec(c1) +
/// Dec(c2) mod n`.
pub fn homomorphic_add(pk: &PaillierPublicKey, c1: &Ciphertext, c2: &Ciphertext) -> Ciphertext {
    Ciphertext((&c1.0 * &c2.0) % &pk.n_squared)
}

/// Aggregates a slice of ciphertexts into a single ciphertext encrypting the
/// sum of their plaintexts.
///
/// An empty slice aggregates to a fresh encryption of zero, drawn with
/// `rng`, so that an empty ballot box still produces a well-formed
/// ciphertext rather than a sentinel value.
pub fn aggregate<R: Rng + CryptoRng>(
    pk: &PaillierPublicKey,
    ciphertexts: &[Ciphertext],
    rng: &mut R,
) -> Ciphertext {
    let mut acc = match ciphertexts.first() {
        Some(first) => first.clone(),
        None => return encrypt(pk, &BigUint::zero(), rng).expect("0 is always in range"),
    };
    for c in &ciphertexts[1..] {
        acc = homomorphic_add(pk, &acc, c);
    }
    acc
}

/// Decrypts `c` directly with the (undistributed) private key.
///
/// Used only by tests and local fixtures; a live election recovers
/// plaintexts exclusively through [`crate::threshold::combine`].
pub fn decrypt(
    sk: &PaillierPrivateKey,
    pk: &PaillierPublicKey,
    c: &Ciphertext,
) -> Result<BigUint, DomainError> {
    if c.0.gcd(&pk.n_squared) != BigUint::one() {
        return Err(DomainError::CiphertextNotInvertible);
    }
    let x = c.0.modpow(&sk.lambda, &pk.n_squared);
    let l_value = l_function(&x, &sk.n);
    Ok((l_value * &sk.mu) % &sk.n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn test_keypair(seed: u64) -> (PaillierPublicKey, PaillierPrivateKey) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        generate_keypair(256, &mut rng).expect("keygen succeeds within budget")
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let (pk, sk) = test_keypair(1);
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let m = BigUint::from(1234u32);
        let c = encrypt(&pk, &m, &mut rng).unwrap();
        assert_eq!(decrypt(&sk, &pk, &c).unwrap(), m);
    }

    #[test]
    fn homomorphic_add_sums_plaintexts() {
        let (pk, sk) = test_keypair(3);
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let a = BigUint::from(7u32);
        let b = BigUint::from(35u32);
        let ca = encrypt(&pk, &a, &mut rng).unwrap();
        let cb = encrypt(&pk, &b, &mut rng).unwrap();
        let sum_ct = homomorphic_add(&pk, &ca, &cb);
        assert_eq!(decrypt(&sk, &pk, &sum_ct).unwrap(), a + b);
    }

    #[test]
    fn aggregate_of_empty_slice_decrypts_to_zero() {
        let (pk, sk) = test_keypair(5);
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let c = aggregate(&pk, &[], &mut rng);
        assert_eq!(decrypt(&sk, &pk, &c).unwrap(), BigUint::zero());
    }

    #[test]
    fn aggregate_matches_sum_of_plaintexts() {
        let (pk, sk) = test_keypair(7);
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let values: Vec<BigUint> = (0..5u32).map(BigUint::from).collect();
        let cts: Vec<Ciphertext> = values
            .iter()
            .map(|v| encrypt(&pk, v, &mut rng).unwrap())
            .collect();
        let aggregated = aggregate(&pk, &cts, &mut rng);
        let expected: BigUint = values.iter().cloned().sum();
        assert_eq!(decrypt(&sk, &pk, &aggregated).unwrap(), expected);
    }

    #[test]
    fn encrypt_rejects_out_of_range_plaintext() {
        let (pk, _sk) = test_keypair(9);
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let too_big = pk.n().clone();
        assert_eq!(
            encrypt(&pk, &too_big, &mut rng),
            Err(DomainError::PlaintextOutOfRange)
        );
    }

    #[test]
    fn mod_inverse_round_trips() {
        let m = BigUint::from(101u32);
        let a = BigUint::from(17u32);
        let inv = mod_inverse(&a, &m).unwrap();
        assert_eq!((&a * &inv) % &m, BigUint::one());
    }
}
