//! Signed rationals and rational approximation of IEEE-754 doubles
//!
//! Plaintexts enter the toolkit as `f64` values and leave it as decimal
//! strings; in between they live as `(sign, numerator, denominator)`
//! triples of non-negative magnitudes. [`approximate`] maps a double to
//! such a triple by walking continued-fraction convergents with a bounded
//! denominator, and [`decimal_string`] renders an exact big-integer
//! fraction back to decimal without ever rounding through a machine float.
//!
//! The convergent walk keeps the denominator below a bound `M` (default
//! `10^8`). When the next true convergent would overshoot the bound, the
//! partial quotient is capped at `x = (M - k0)/k1`; the capped term is kept
//! only when `2x >= a`, i.e. when the resulting semiconvergent is at least
//! as accurate as the previous convergent, and discarded otherwise.

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{FromPrimitive, Signed, ToPrimitive, Zero};

use crate::mpi::ArithmeticError;

/// Default denominator bound for [`approximate`].
pub const DEFAULT_APPROX_BOUND: i64 = 100_000_000;

/// Largest accepted denominator bound. Above this the capped-quotient
/// arithmetic could no longer be carried in 128-bit intermediates.
pub const MAX_APPROX_BOUND: i64 = 1_000_000_000_000_000;

/// Sign of a rational or ciphertext value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sign {
    /// Non-negative values.
    Plus,
    /// Negative values.
    Minus,
}

impl Sign {
    /// Sign of a double, following the IEEE-754 sign bit (`-0.0` is
    /// [`Sign::Minus`]).
    pub fn of_f64(v: f64) -> Self {
        if v.is_sign_negative() {
            Sign::Minus
        } else {
            Sign::Plus
        }
    }

    /// Sign of a big integer (`Plus` for zero).
    pub fn of_bigint(z: &BigInt) -> Self {
        if z.is_negative() {
            Sign::Minus
        } else {
            Sign::Plus
        }
    }

    /// Product of two signs.
    pub fn combine(self, other: Sign) -> Sign {
        if self == other {
            Sign::Plus
        } else {
            Sign::Minus
        }
    }

    /// `+1` or `-1`.
    pub fn as_factor(self) -> i64 {
        match self {
            Sign::Plus => 1,
            Sign::Minus => -1,
        }
    }

    /// Apply this sign to a magnitude.
    pub fn apply(self, magnitude: &BigInt) -> BigInt {
        match self {
            Sign::Plus => magnitude.clone(),
            Sign::Minus => -magnitude,
        }
    }
}

/// A signed rational with non-negative magnitudes and non-zero denominator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rational {
    /// Sign of the value.
    pub sign: Sign,
    /// Numerator magnitude.
    pub numer: BigUint,
    /// Denominator magnitude, never zero.
    pub denom: BigUint,
}

impl Rational {
    /// Build a rational, rejecting a zero denominator.
    pub fn new(sign: Sign, numer: BigUint, denom: BigUint) -> Result<Self, ArithmeticError> {
        if denom.is_zero() {
            return Err(ArithmeticError::DivisionByZero);
        }
        Ok(Rational { sign, numer, denom })
    }
}

/// Failures of [`approximate`].
#[derive(Debug, thiserror::Error)]
pub enum ApproxError {
    /// NaN or infinite input.
    #[error("plaintext must be finite (got {0})")]
    NonFinite(f64),
    /// Denominator bound larger than [`MAX_APPROX_BOUND`].
    #[error("approximation bound {0} exceeds the supported maximum of 10^15")]
    BoundTooLarge(i64),
}

/// Approximate a finite double by a rational with denominator below `bound`.
///
/// Integral inputs short-circuit to `(|v|, 1)` exactly, including values
/// beyond 2^53 (every double of that size is an integer). Otherwise `|v|`
/// is scaled by powers of two until integral, giving an exact ratio `d/n`,
/// and classical convergents are walked for at most 64 steps with the
/// denominator cap described in the module docs.
pub fn approximate(v: f64, bound: i64) -> Result<Rational, ApproxError> {
    if !v.is_finite() {
        return Err(ApproxError::NonFinite(v));
    }
    if bound > MAX_APPROX_BOUND {
        return Err(ApproxError::BoundTooLarge(bound));
    }
    let sign = Sign::of_f64(v);
    let f = v.abs();

    if f.fract() == 0.0 {
        // Exact conversion; BigUint::from_f64 cannot fail on a finite
        // non-negative integral double.
        let numer = BigUint::from_f64(f).unwrap_or_default();
        return Ok(Rational { sign, numer, denom: BigUint::from(1u32) });
    }
    if bound <= 1 {
        return Ok(Rational {
            sign,
            numer: BigUint::from_f64(f.trunc()).unwrap_or_default(),
            denom: BigUint::from(1u32),
        });
    }
    // Anything below half the bound's resolution rounds to zero; this also
    // keeps the power-of-two scaling inside 128 bits.
    if f < 1.0 / (2.0 * bound as f64) {
        return Ok(Rational { sign, numer: BigUint::zero(), denom: BigUint::from(1u32) });
    }

    let md = bound as i128;
    let (numer, denom) = convergents(f, md);
    Ok(Rational {
        sign,
        numer: BigUint::from(numer as u128),
        denom: BigUint::from(denom as u128),
    })
}

/// Convergent walk over the exact dyadic ratio of a non-integral `f`.
fn convergents(f: f64, md: i128) -> (i128, i128) {
    let mut h = [0i128, 1, 0];
    let mut k = [1i128, 0, 0];

    let mut n: i128 = 1;
    let mut f = f;
    while f != f.floor() {
        n <<= 1;
        f *= 2.0;
    }
    let mut d = f as i128;

    let mut i = 0;
    while i < 64 {
        let a = if n != 0 { d / n } else { 0 };
        if i > 0 && a == 0 {
            break;
        }

        let t = d;
        d = n;
        n = t % n;

        let mut x = a;
        let mut last = false;
        if k[1] * a + k[0] >= md {
            x = (md - k[0]) / k[1];
            if x * 2 >= a || k[1] >= md {
                last = true;
            } else {
                break;
            }
        }

        h[2] = x * h[1] + h[0];
        h[0] = h[1];
        h[1] = h[2];
        k[2] = x * k[1] + k[0];
        k[0] = k[1];
        k[1] = k[2];

        if last {
            break;
        }
        i += 1;
    }
    (h[1], k[1])
}

/// Render the exact value of `num/den` as a positional decimal string with
/// `sig_digits` significant digits, trailing fractional zeros trimmed.
///
/// The signs of both operands participate (`-3/-2` renders as `1.5`). A
/// zero denominator is a [`ArithmeticError::DivisionByZero`].
pub fn decimal_string(
    num: &BigInt,
    den: &BigInt,
    sig_digits: usize,
) -> Result<String, ArithmeticError> {
    if den.is_zero() {
        return Err(ArithmeticError::DivisionByZero);
    }
    let negative = num.is_negative() != den.is_negative();
    let a = num.magnitude();
    let b = den.magnitude();

    let (q, mut r) = a.div_rem(b);
    let int_part = q.to_str_radix(10);
    let mut significant = if q.is_zero() { 0 } else { int_part.len() };

    let ten = BigUint::from(10u32);
    let mut frac = String::new();
    while !r.is_zero() && significant < sig_digits {
        r *= &ten;
        let (digit, rest) = r.div_rem(b);
        // digit < 10 by construction
        frac.push(char::from(b'0' + digit.to_u8().unwrap_or(0)));
        r = rest;
        if significant > 0 || !digit.is_zero() {
            significant += 1;
        }
    }
    while frac.ends_with('0') {
        frac.pop();
    }

    let mut out = String::new();
    if negative && !(q.is_zero() && frac.is_empty()) {
        out.push('-');
    }
    out.push_str(&int_part);
    if !frac.is_empty() {
        out.push('.');
        out.push_str(&frac);
    }
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================
