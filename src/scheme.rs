//! The encryption map, its inverse, and the homomorphic combinators
//!
//! The scheme encrypts a rational `n/d` under `(p, q)` by exponentiating
//! both magnitudes with `e = p` modulo `N = p*q` (the deterministic
//! `rx = 1` form of `e = rx*(p-1) + 1`). Fermat's little theorem gives
//! `x^p = x (mod p)` for any `x`, so reducing a ciphertext modulo `p`
//! recovers the plaintext fraction exactly, as long as the running values
//! stay below `p`.
//!
//! Ciphertext combination works on the fractions directly: addition and
//! subtraction cross-multiply modulo `N`, multiplication is component-wise.
//! Signs are tracked outside the modular domain. For `addenc`/`subenc` the
//! result sign is computed in the signed domain (`(s_a*n_a)*d_b ±
//! (s_b*n_b)*d_a`) and the reduced magnitude is taken from the absolute
//! value; the historic tool copied operand B's sign instead, which is why
//! [`decrypt`] cross-checks the envelope sign against the residues and
//! warns when they disagree.
//!
//! All reductions go through [`smod`](crate::mpi::smod), so negative
//! intermediates keep their sign through the modular layer.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use tracing::warn;

use crate::keygen::{PrivateKey, PublicKey};
use crate::mpi::{self, ArithmeticError};
use crate::rational::{self, ApproxError, Sign, DEFAULT_APPROX_BOUND};

/// Significant digits carried by the decimal rendering of a decrypted
/// value.
pub const DECRYPT_DIGITS: usize = 30;

/// A ciphertext: a sign and two residues modulo `N`.
///
/// The residues are kept as signed big integers. Envelopes written by this
/// tool always hold non-negative magnitudes, but ciphertexts produced by
/// older signed-addition code can carry negative values; the scheme
/// operations accept both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ciphertext {
    /// Sign of the encrypted value.
    pub sign: Sign,
    /// Encrypted numerator.
    pub numerator: BigInt,
    /// Encrypted denominator.
    pub denominator: BigInt,
}

impl Ciphertext {
    /// The numerator with the ciphertext sign applied, for signed-domain
    /// combination.
    fn signed_numerator(&self) -> BigInt {
        self.sign.apply(&self.numerator)
    }
}

/// Failures of the scheme operations.
#[derive(Debug, thiserror::Error)]
pub enum SchemeError {
    /// Plaintext could not be approximated.
    #[error(transparent)]
    Approx(#[from] ApproxError),
    /// Modular arithmetic failed (zero or non-positive modulus).
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
    /// The denominator reduced to zero modulo `p`.
    #[error("ciphertext denominator vanishes modulo p; not decryptable with this key")]
    Undecryptable,
}

/// Encrypt a finite double under `keys` with the default approximation
/// bound.
pub fn encrypt(value: f64, keys: &PrivateKey) -> Result<Ciphertext, SchemeError> {
    encrypt_with_bound(value, keys, DEFAULT_APPROX_BOUND)
}

/// Encrypt a finite double, approximating with denominators below `bound`.
///
/// `n_hat = n^p mod N`, `d_hat = d^p mod N`; the sign travels alongside
/// the residues rather than inside them.
pub fn encrypt_with_bound(
    value: f64,
    keys: &PrivateKey,
    bound: i64,
) -> Result<Ciphertext, SchemeError> {
    let plain = rational::approximate(value, bound)?;
    let n = BigInt::from(plain.numer);
    let d = BigInt::from(plain.denom);

    let modulus = BigInt::from(keys.public_key().n);
    let exponent = BigInt::from(keys.p.clone());

    Ok(Ciphertext {
        sign: plain.sign,
        numerator: mpi::powm(&n, &exponent, &modulus)?,
        denominator: mpi::powm(&d, &exponent, &modulus)?,
    })
}

/// Decrypt a ciphertext to a decimal string with at least
/// [`DECRYPT_DIGITS`] significant digits.
///
/// Both residues are reduced by [`smod`](crate::mpi::smod) modulo `p`, the
/// fraction is simplified by the gcd of the residues, and the exact value
/// `sign * n_p/d_p` is rendered by big-integer long division.
pub fn decrypt(ct: &Ciphertext, keys: &PrivateKey) -> Result<String, SchemeError> {
    let p = BigInt::from(keys.p.clone());
    let n_p = mpi::smod(&ct.numerator, &p)?;
    let d_p = mpi::smod(&ct.denominator, &p)?;
    if d_p.is_zero() {
        return Err(SchemeError::Undecryptable);
    }

    // Residues reduced from legacy signed magnitudes carry their own sign;
    // flag the envelopes whose stored sign contradicts it.
    let residue_sign = Sign::of_bigint(&n_p).combine(Sign::of_bigint(&d_p));
    if (ct.numerator.is_negative() || ct.denominator.is_negative())
        && !n_p.is_zero()
        && residue_sign != ct.sign
    {
        warn!(
            envelope_sign = ct.sign.as_factor(),
            residue_sign = residue_sign.as_factor(),
            "ciphertext sign disagrees with sign recovered from signed residues; \
             likely produced by a legacy signed addition"
        );
    }

    let g = mpi::gcd(&n_p, &d_p);
    let (n_p, d_p) = if g.is_zero() { (n_p, d_p) } else { (&n_p / &g, &d_p / &g) };

    let signed_num = ct.sign.apply(&n_p);
    Ok(rational::decimal_string(&signed_num, &d_p, DECRYPT_DIGITS)?)
}

/// Homomorphic addition of two ciphertexts under the public modulus.
pub fn addenc(
    a: &Ciphertext,
    b: &Ciphertext,
    key: &PublicKey,
) -> Result<Ciphertext, SchemeError> {
    combine_additive(a, b, key, false)
}

/// Homomorphic subtraction `a - b` under the public modulus.
pub fn subenc(
    a: &Ciphertext,
    b: &Ciphertext,
    key: &PublicKey,
) -> Result<Ciphertext, SchemeError> {
    combine_additive(a, b, key, true)
}

fn combine_additive(
    a: &Ciphertext,
    b: &Ciphertext,
    key: &PublicKey,
    subtract: bool,
) -> Result<Ciphertext, SchemeError> {
    let n = BigInt::from(key.n.clone());

    let t1 = a.signed_numerator() * &b.denominator;
    let t2 = b.signed_numerator() * &a.denominator;
    let numer_signed = if subtract { t1 - t2 } else { t1 + t2 };

    let sign = Sign::of_bigint(&numer_signed);
    let numerator = mpi::smod(&numer_signed.abs(), &n)?;
    let denominator = mpi::smod(&(&a.denominator * &b.denominator), &n)?;

    Ok(Ciphertext { sign, numerator, denominator })
}

/// Homomorphic multiplication of two ciphertexts under the public modulus.
pub fn mulenc(
    a: &Ciphertext,
    b: &Ciphertext,
    key: &PublicKey,
) -> Result<Ciphertext, SchemeError> {
    let n = BigInt::from(key.n.clone());
    Ok(Ciphertext {
        sign: a.sign.combine(b.sign),
        numerator: mpi::smod(&(&a.numerator * &b.numerator), &n)?,
        denominator: mpi::smod(&(&a.denominator * &b.denominator), &n)?,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    // Small known primes keep the modular values readable: N = 48566627.
    fn test_keys() -> PrivateKey {
        PrivateKey { p: BigUint::from(7919u32), q: BigUint::from(6133u32) }
    }

    fn decrypt_f64(ct: &Ciphertext, keys: &PrivateKey) -> f64 {
        decrypt(ct, keys).unwrap().parse().unwrap()
    }

    #[test]
    fn known_key_round_trip() {
        let keys = test_keys();
        assert_eq!(keys.public_key().n, BigUint::from(48_566_627u64));

        let ct = encrypt(5000.0, &keys).unwrap();
        assert_eq!(decrypt(&ct, &keys).unwrap(), "5000");
        assert!((decrypt_f64(&ct, &keys) - 5000.0).abs() < 1e-8);
    }

    #[test]
    fn round_trip_of_fractions_and_negatives() {
        let keys = test_keys();
        for v in [3.5, 1.25, -2.25, 0.1, -0.125] {
            let ct = encrypt(v, &keys).unwrap();
            assert!(
                (decrypt_f64(&ct, &keys) - v).abs() < 1e-8,
                "round trip of {v} drifted"
            );
        }
    }

    #[test]
    fn homomorphic_addition() {
        let keys = test_keys();
        let pk = keys.public_key();
        let a = encrypt(3.5, &keys).unwrap();
        let b = encrypt(1.25, &keys).unwrap();
        let c = addenc(&a, &b, &pk).unwrap();
        assert!((decrypt_f64(&c, &keys) - 4.75).abs() < 1e-7);
    }

    #[test]
    fn homomorphic_addition_of_decimal_fractions() {
        let keys = test_keys();
        let pk = keys.public_key();
        let a = encrypt(0.1, &keys).unwrap();
        let b = encrypt(0.2, &keys).unwrap();
        let c = addenc(&a, &b, &pk).unwrap();
        assert!((decrypt_f64(&c, &keys) - 0.3).abs() < 1e-7);
    }

    #[test]
    fn subtraction_of_a_ciphertext_from_itself_is_zero() {
        let keys = test_keys();
        let pk = keys.public_key();
        let a = encrypt(3.5, &keys).unwrap();
        let c = subenc(&a, &a, &pk).unwrap();
        assert_eq!(c.sign, Sign::Plus);
        assert_eq!(decrypt(&c, &keys).unwrap(), "0");
    }

    // Residue-level ciphertexts with small known values make the signed
    // combination deterministic; going through `encrypt` would leave the
    // cross-term sign at the mercy of the residue magnitudes, which is
    // exactly the weakness the sign policy papers over.
    fn raw(sign: Sign, n: i64, d: i64) -> Ciphertext {
        Ciphertext { sign, numerator: BigInt::from(n), denominator: BigInt::from(d) }
    }

    #[test]
    fn subtraction_sign_is_recomputed_not_copied() {
        let keys = test_keys();
        let pk = keys.public_key();
        let a = raw(Sign::Plus, 5, 1);
        let b = raw(Sign::Plus, 3, 1);

        let c = subenc(&a, &b, &pk).unwrap();
        assert_eq!(c.sign, Sign::Plus);
        assert_eq!(decrypt(&c, &keys).unwrap(), "2");

        let d = subenc(&b, &a, &pk).unwrap();
        assert_eq!(d.sign, Sign::Minus);
        assert_eq!(decrypt(&d, &keys).unwrap(), "-2");
    }

    #[test]
    fn mixed_sign_addition_combines_in_the_signed_domain() {
        let keys = test_keys();
        let pk = keys.public_key();
        let a = raw(Sign::Plus, 5, 2);
        let b = raw(Sign::Minus, 7, 1);
        let c = addenc(&a, &b, &pk).unwrap();
        assert_eq!(c.sign, Sign::Minus);
        assert_eq!(decrypt(&c, &keys).unwrap(), "-4.5");
    }

    #[test]
    fn homomorphic_multiplication() {
        let keys = test_keys();
        let pk = keys.public_key();
        let a = encrypt(2.0, &keys).unwrap();
        let b = encrypt(3.0, &keys).unwrap();
        let c = mulenc(&a, &b, &pk).unwrap();
        assert!((decrypt_f64(&c, &keys) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn multiplication_sign_table() {
        let keys = test_keys();
        let pk = keys.public_key();
        let pos = encrypt(2.0, &keys).unwrap();
        let neg = encrypt(-3.0, &keys).unwrap();

        let c = mulenc(&pos, &neg, &pk).unwrap();
        assert_eq!(c.sign, Sign::Minus);
        assert!((decrypt_f64(&c, &keys) + 6.0).abs() < 1e-9);

        let d = mulenc(&neg, &neg, &pk).unwrap();
        assert_eq!(d.sign, Sign::Plus);
        assert!((decrypt_f64(&d, &keys) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn integer_plaintexts_keep_a_unit_denominator() {
        let keys = test_keys();
        let ct = encrypt(7.0, &keys).unwrap();
        assert_eq!(ct.denominator, BigInt::from(1));
    }

    #[test]
    fn undecryptable_when_denominator_vanishes() {
        let keys = test_keys();
        let ct = Ciphertext {
            sign: Sign::Plus,
            numerator: BigInt::from(5),
            denominator: BigInt::from(7919),
        };
        assert!(matches!(decrypt(&ct, &keys), Err(SchemeError::Undecryptable)));
    }

    #[test]
    fn decrypt_applies_residue_signs() {
        // Legacy signed ciphertexts can carry negative magnitudes; the
        // reduced fraction keeps their sign.
        let keys = test_keys();
        let ct = Ciphertext {
            sign: Sign::Plus,
            numerator: BigInt::from(-9),
            denominator: BigInt::from(4),
        };
        assert_eq!(decrypt(&ct, &keys).unwrap(), "-2.25");
    }
}
