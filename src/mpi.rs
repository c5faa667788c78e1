//! Big-integer facade: hex magnitudes, signed reduction, modular exponentiation
//!
//! This module is the single place where the rest of the crate touches the
//! arbitrary-precision backend (`num-bigint`). It pins down the two
//! conventions everything else depends on:
//!
//! - **Hex encoding.** Magnitudes are lowercase hexadecimal with no `0x`
//!   prefix and no leading zeros; zero renders as `"0"`. Parsing is more
//!   liberal than rendering: it accepts upper/lower case, leading zeros, and
//!   an optional leading `-` (legacy tooling prints negative residues with a
//!   sign when a reduction goes through the signed path).
//!
//! - **Signed modulus.** [`smod`] reduces into `(-m, m)` *preserving the
//!   sign of the input* rather than into the Euclidean range `[0, m)`. The
//!   scheme's correctness for negative intermediates hinges on this: a
//!   negative cross-term must stay negative through reduction so that
//!   decryption recovers the signed numerator.

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{Signed, Zero};

/// Arithmetic failures surfaced by the facade.
#[derive(Debug, thiserror::Error)]
pub enum ArithmeticError {
    /// `smod` requires a strictly positive modulus.
    #[error("modulus must be positive (got {0})")]
    NonPositiveModulus(BigInt),
    /// `powm` requires a non-zero modulus.
    #[error("zero modulus in modular exponentiation")]
    ZeroModulus,
    /// `powm` requires a non-negative exponent.
    #[error("negative exponent {0} in modular exponentiation")]
    NegativeExponent(BigInt),
    /// Division by zero (zero denominator at decryption or rendering time).
    #[error("division by zero")]
    DivisionByZero,
}

/// A hex string that is not a valid magnitude.
#[derive(Debug, thiserror::Error)]
#[error("malformed hex magnitude `{0}`")]
pub struct ParseHexError(pub String);

/// Signed modular reduction.
///
/// For `m > 0`:
/// - `a >= 0` maps to `a mod m` in `[0, m)`;
/// - `a < 0` maps to `-(|a| mod m)` in `(-m, 0]`.
///
/// The result is therefore congruent to `±a` but never flips sign, unlike
/// the Euclidean residue.
pub fn smod(a: &BigInt, m: &BigInt) -> Result<BigInt, ArithmeticError> {
    if !m.is_positive() {
        return Err(ArithmeticError::NonPositiveModulus(m.clone()));
    }
    let r = a.abs() % m;
    Ok(if a.is_negative() { -r } else { r })
}

/// Modular exponentiation `base^exp mod m` with `exp >= 0`, `m != 0`.
pub fn powm(base: &BigInt, exp: &BigInt, m: &BigInt) -> Result<BigInt, ArithmeticError> {
    if m.is_zero() {
        return Err(ArithmeticError::ZeroModulus);
    }
    if exp.is_negative() {
        return Err(ArithmeticError::NegativeExponent(exp.clone()));
    }
    Ok(base.modpow(exp, m))
}

/// Greatest common divisor of two signed integers (always non-negative).
pub fn gcd(a: &BigInt, b: &BigInt) -> BigInt {
    a.gcd(b)
}

/// Parse a hex magnitude, optionally signed, case-insensitive, leading
/// zeros allowed.
pub fn parse_hex(s: &str) -> Result<BigInt, ParseHexError> {
    let t = s.trim();
    let (negative, digits) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParseHexError(s.to_owned()));
    }
    // All-hex input cannot fail to parse; the `ok_or` is for completeness.
    let magnitude = BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| ParseHexError(s.to_owned()))?;
    let value = BigInt::from(magnitude);
    Ok(if negative { -value } else { value })
}

/// Render a value as minimal lowercase hex (`"0"` for zero, `-` prefix for
/// negative values).
pub fn render_hex(z: &BigInt) -> String {
    z.to_str_radix(16)
}

// ============================================================================
// Tests
// ============================================================================
