//! Probabilistic prime generation used by Paillier key generation.
//!
//! `num-bigint` does not ship a primality test, so we implement Miller–Rabin
//! directly. Candidates are sampled odd and sieved against a small table of
//! trial divisors before the expensive modular-exponentiation rounds.

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::{CryptoRng, Rng};

/// Small prime table used to cheaply reject most composite candidates before
/// paying for a Miller-Rabin round.
const TRIAL_DIVISORS: &[u32] = &[
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191, 193,
    197, 199,
];

/// Number of Miller-Rabin witness rounds. 40 rounds bound the false-positive
/// probability at 2^-80, well below what a keygen failure budget needs.
const MILLER_RABIN_ROUNDS: u32 = 40;

/// Samples a uniformly random odd `bits`-bit number with the top bit set.
fn sample_odd_candidate<R: Rng + ?Sized>(bits: u32, rng: &mut R) -> BigUint {
    let mut bytes = vec![0u8; ((bits + 7) / 8) as usize];
    rng.fill_bytes(&mut bytes);
    let mut candidate = BigUint::from_bytes_be(&bytes);
    let top_bit = BigUint::one() << (bits - 1);
    candidate |= &top_bit;
    candidate |= BigUint::one();
    candidate
}

fn passes_trial_division(candidate: &BigUint) -> bool {
    for &d in TRIAL_DIVISORS {
        let divisor = BigUint::from(d);
        if candidate == &divisor {
            return true;
        }
        if (candidate % &divisor).is_zero() {
            return false;
        }
    }
    true
}

fn miller_rabin<R: Rng + ?Sized>(candidate: &BigUint, rounds: u32, rng: &mut R) -> bool {
    let one = BigUint::one();
    let two = &one + &one;
    if candidate < &two {
        return false;
    }
    if candidate == &two {
        return true;
    }
    if candidate.is_even() {
        return false;
    }

    let n_minus_one = candidate - &one;
    let mut d = n_minus_one.clone();
    let mut r = 0u32;
    while d.is_even() {
        d >>= 1;
        r += 1;
    }

    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, candidate);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 0..r.saturating_sub(1) {
            x = x.modpow(&two, candidate);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Generates a random `bits`-bit probable prime, bounded to `max_attempts`
/// candidate draws.
///
/// Returns `None` if no prime was found within the attempt budget, which the
/// caller should treat as exhausting its key-generation retry budget.
pub fn random_prime<R: Rng + CryptoRng + ?Sized>(
    bits: u32,
    max_attempts: u32,
    rng: &mut R,
) -> Option<BigUint> {
    for _ in 0..max_attempts {
        let candidate = sample_odd_candidate(bits, rng);
        if !passes_trial_division(&candidate) {
            continue;
        }
        if miller_rabin(&candidate, MILLER_RABIN_ROUNDS, rng) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn random_prime_is_actually_prime_by_trial_division() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        for _ in 0..5 {
            let p = random_prime(64, 256, &mut rng).expect("prime found within budget");
            assert!(miller_rabin(&p, 64, &mut rng));
            assert!(p.bits() >= 63);
        }
    }

    #[test]
    fn small_known_primes_pass_and_composites_fail() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        assert!(miller_rabin(&BigUint::from(104729u32), 20, &mut rng));
        assert!(!miller_rabin(&BigUint::from(104730u32), 20, &mut rng));
        assert!(!miller_rabin(&BigUint::from(1u32), 20, &mut rng));
    }
}
