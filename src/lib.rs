//! Crate root: public surface and scheme-wide conventions
//!
//! `ahetool` implements a toy additively- and multiplicatively-homomorphic
//! encryption scheme over the rationals. A plaintext double is approximated
//! by a fraction `n/d`; encryption raises both magnitudes to the power `p`
//! modulo `N = p*q`, which by Fermat's little theorem makes the fraction
//! recoverable modulo `p`. Any holder of `N` can add, subtract or multiply
//! ciphertexts without the private key.
//!
//! The scheme is a faithful rendition of a known-weak textbook
//! construction; nothing here is hardened, constant-time, or semantically
//! secure, and it must not be used to protect anything.
//!
//! ## Conventions (crate-wide)
//!
//! - **Signed reduction.** Every ciphertext-level reduction goes through
//!   [`mpi::smod`], which keeps the sign of a negative input instead of
//!   folding into `[0, m)`. Negative intermediates would otherwise decrypt
//!   to wrapped garbage.
//! - **Hex magnitudes.** Envelopes carry lowercase minimal hex; parsing
//!   additionally accepts uppercase, leading zeros, and a leading `-`.
//! - **Deterministic exponent.** Encryption uses `e = rx*(p-1) + 1` with
//!   `rx` fixed to 1, i.e. `e = p`, matching the historic envelopes.
//! - **Purity.** All values are immutable; each CLI operation reads its
//!   envelopes, computes, and writes one output transactionally.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// JSON envelope IO (keys, ciphertexts, transactional writes).
pub mod envelope;
/// Probable-prime sampling and key value objects.
pub mod keygen;
/// Big-integer facade: hex, signed modulus, modular exponentiation.
pub mod mpi;
/// Signed rationals, double approximation, decimal rendering.
pub mod rational;
/// Encryption, decryption, and the homomorphic combinators.
pub mod scheme;

pub use envelope::EnvelopeError;
pub use keygen::{KeyGenError, KeyGenOptions, PrivateKey, PublicKey, DEFAULT_KEY_BITS};
pub use mpi::ArithmeticError;
pub use rational::{Rational, Sign, DEFAULT_APPROX_BOUND, MAX_APPROX_BOUND};
pub use scheme::{Ciphertext, SchemeError};
