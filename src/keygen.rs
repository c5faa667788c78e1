//! Probable-prime sampling and key value objects
//!
//! Keys are plain value pairs: a private key holds two probable primes
//! `(p, q)`, the public key is the product `N = p*q`. Prime candidates are
//! drawn from a caller-supplied CSPRNG, filtered by trial division against
//! every prime below 2048, and accepted after 40 rounds of Miller-Rabin.
//!
//! The optional *special-factor* mode mirrors the upstream key generator's
//! request that `p - 1` carry a large prime factor: `p` is searched as
//! `r*m + 1` with `r` a prime of half the requested width. It changes
//! nothing observable about the resulting envelopes.

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use once_cell::sync::Lazy;
use rand::{CryptoRng, Rng};

/// Default key size in bits.
pub const DEFAULT_KEY_BITS: u64 = 512;

/// Miller-Rabin rounds applied after trial division.
const MILLER_RABIN_ROUNDS: u32 = 40;

/// Candidates per prime before giving up.
const PRIME_ATTEMPTS: u32 = 100_000;

/// Trial-division bound; every prime below it is sieved once.
const TRIAL_DIVISION_BOUND: u32 = 2048;

static SMALL_PRIMES: Lazy<Vec<u32>> = Lazy::new(|| {
    let bound = TRIAL_DIVISION_BOUND as usize;
    let mut composite = vec![false; bound];
    let mut primes = Vec::new();
    for n in 2..bound {
        if composite[n] {
            continue;
        }
        primes.push(n as u32);
        let mut multiple = n * n;
        while multiple < bound {
            composite[multiple] = true;
            multiple += n;
        }
    }
    primes
});

/// A private key pair of probable primes, each greater than 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrivateKey {
    /// First prime; decryption reduces modulo this factor.
    pub p: BigUint,
    /// Second prime.
    pub q: BigUint,
}

/// A public modulus `N = p*q`, greater than 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    /// The modulus.
    pub n: BigUint,
}

impl PrivateKey {
    /// Derive the public key `N = p*q`.
    pub fn public_key(&self) -> PublicKey {
        PublicKey { n: &self.p * &self.q }
    }
}

/// Failures of key generation.
#[derive(Debug, thiserror::Error)]
pub enum KeyGenError {
    /// No candidate passed the primality tests within the attempt budget.
    #[error("no {bits}-bit probable prime found within {attempts} attempts")]
    RetriesExhausted {
        /// Requested width.
        bits: u64,
        /// Candidates tried.
        attempts: u32,
    },
    /// Requested width too small for the sampler.
    #[error("key size must be at least 8 bits (got {0})")]
    KeySizeTooSmall(u64),
}

/// Options for [`generate_private_key`].
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyGenOptions {
    /// Search `p` (and `q`) of the form `r*m + 1` with `r` prime of half
    /// the requested width.
    pub special_factor: bool,
}

/// Sample a private key pair of distinct probable primes of at least
/// `bits` bits each.
pub fn generate_private_key<R: Rng + CryptoRng>(
    rng: &mut R,
    bits: u64,
    opts: KeyGenOptions,
) -> Result<PrivateKey, KeyGenError> {
    if bits < 8 {
        return Err(KeyGenError::KeySizeTooSmall(bits));
    }
    let p = generate_prime(rng, bits, opts)?;
    let mut q = generate_prime(rng, bits, opts)?;
    let mut retries = 0;
    while q == p {
        if retries >= PRIME_ATTEMPTS {
            return Err(KeyGenError::RetriesExhausted { bits, attempts: retries });
        }
        retries += 1;
        q = generate_prime(rng, bits, opts)?;
    }
    Ok(PrivateKey { p, q })
}

fn generate_prime<R: Rng + CryptoRng>(
    rng: &mut R,
    bits: u64,
    opts: KeyGenOptions,
) -> Result<BigUint, KeyGenError> {
    if opts.special_factor {
        generate_special_factor_prime(rng, bits)
    } else {
        generate_plain_prime(rng, bits)
    }
}

fn generate_plain_prime<R: Rng + CryptoRng>(
    rng: &mut R,
    bits: u64,
) -> Result<BigUint, KeyGenError> {
    for _ in 0..PRIME_ATTEMPTS {
        let mut candidate = rng.gen_biguint(bits);
        candidate |= BigUint::one() << (bits - 1);
        candidate |= BigUint::one();
        if is_probable_prime(rng, &candidate, MILLER_RABIN_ROUNDS) {
            return Ok(candidate);
        }
    }
    Err(KeyGenError::RetriesExhausted { bits, attempts: PRIME_ATTEMPTS })
}

/// Search `p = r*m + 1` with `r` prime of half the requested width, so
/// that `p - 1` keeps a large prime factor.
fn generate_special_factor_prime<R: Rng + CryptoRng>(
    rng: &mut R,
    bits: u64,
) -> Result<BigUint, KeyGenError> {
    let r_bits = bits / 2;
    let m_bits = bits - r_bits;
    let r = generate_plain_prime(rng, r_bits)?;
    for _ in 0..PRIME_ATTEMPTS {
        // m even keeps the candidate odd; top bit keeps the width.
        let mut m = rng.gen_biguint(m_bits);
        m |= BigUint::one() << (m_bits - 1);
        m <<= 1u32;
        let candidate = &r * &m + BigUint::one();
        if candidate.bits() < bits {
            continue;
        }
        if is_probable_prime(rng, &candidate, MILLER_RABIN_ROUNDS) {
            return Ok(candidate);
        }
    }
    Err(KeyGenError::RetriesExhausted { bits, attempts: PRIME_ATTEMPTS })
}

/// Probabilistic primality test: trial division by every prime below 2048,
/// then `rounds` Miller-Rabin witnesses from `rng`.
///
/// For candidates below `2048^2` trial division alone is decisive.
pub fn is_probable_prime<R: Rng>(rng: &mut R, n: &BigUint, rounds: u32) -> bool {
    let two = BigUint::from(2u32);
    if *n < two {
        return false;
    }
    for &sp in SMALL_PRIMES.iter() {
        let sp = BigUint::from(sp);
        if *n == sp {
            return true;
        }
        if (n % &sp).is_zero() {
            return false;
        }
    }
    if n.bits() <= 22 {
        // Below 2048^2: surviving trial division proves primality.
        return true;
    }

    // n - 1 = d * 2^s with d odd
    let n_minus_one = n - BigUint::one();
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;

    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = &x * &x % n;
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn small_prime_table_is_sane() {
        assert_eq!(SMALL_PRIMES[0], 2);
        assert_eq!(SMALL_PRIMES[1], 3);
        assert!(SMALL_PRIMES.contains(&2039));
        assert!(SMALL_PRIMES.iter().all(|&p| p < TRIAL_DIVISION_BOUND));
    }

    #[test]
    fn primality_reference_values() {
        let mut rng = OsRng;
        for p in [2u64, 3, 5, 7919, 6133, 2039, 1_000_003] {
            assert!(
                is_probable_prime(&mut rng, &BigUint::from(p), 20),
                "{p} should test prime"
            );
        }
        for c in [1u64, 4, 6, 7917, 2047, 1_000_001, 3_215_031_751] {
            assert!(
                !is_probable_prime(&mut rng, &BigUint::from(c), 20),
                "{c} should test composite"
            );
        }
    }

    #[test]
    fn sixty_four_bit_keys_have_full_width_distinct_primes() {
        let mut rng = OsRng;
        let keys = generate_private_key(&mut rng, 64, KeyGenOptions::default()).unwrap();
        assert_eq!(keys.p.bits(), 64);
        assert_eq!(keys.q.bits(), 64);
        assert_ne!(keys.p, keys.q);
        assert!(is_probable_prime(&mut rng, &keys.p, 20));
        assert!(is_probable_prime(&mut rng, &keys.q, 20));
    }

    #[test]
    fn special_factor_mode_yields_primes_of_requested_width() {
        let mut rng = OsRng;
        let keys = generate_private_key(
            &mut rng,
            64,
            KeyGenOptions { special_factor: true },
        )
        .unwrap();
        assert!(keys.p.bits() >= 64);
        assert!(is_probable_prime(&mut rng, &keys.p, 20));
    }

    #[test]
    fn public_key_is_the_product() {
        let keys = PrivateKey { p: BigUint::from(7919u32), q: BigUint::from(6133u32) };
        assert_eq!(keys.public_key().n, BigUint::from(48_566_627u64));
    }

    #[test]
    fn tiny_widths_are_rejected() {
        let mut rng = OsRng;
        assert!(matches!(
            generate_private_key(&mut rng, 4, KeyGenOptions::default()),
            Err(KeyGenError::KeySizeTooSmall(4))
        ));
    }
}
