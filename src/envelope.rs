//! JSON envelopes on the filesystem
//!
//! Three envelope shapes, all pretty-printed with a 4-space indent and a
//! trailing newline, fields in the alphabetical order the legacy tool's
//! JSON library produced:
//!
//! - private keys: `{ created, p, q }`
//! - public key:   `{ N, created }`
//! - ciphertext:   `{ created, denominator, numerator, sign }`
//!
//! Magnitudes are hex per [`mpi`](crate::mpi). The `sign` integer accepts
//! the legacy `0`-for-non-negative encoding alongside the current `1`/`-1`
//! form; `created` is a ctime-style timestamp, written for provenance and
//! ignored on read. Writes go through a temporary file in the same
//! directory followed by a rename, so a failed operation never leaves a
//! partial envelope behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::keygen::{PrivateKey, PublicKey};
use crate::mpi;
use crate::rational::Sign;
use crate::scheme::Ciphertext;

/// Failures while reading or writing envelopes.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// Input file could not be read.
    #[error("read {path}: {source}")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Output file could not be written or renamed into place.
    #[error("write {path}: {source}")]
    Write {
        /// Offending path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Not valid JSON, or a required key is missing or mistyped.
    #[error("parse {path}: {source}")]
    Json {
        /// Offending path.
        path: PathBuf,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
    /// A magnitude field does not hold hex.
    #[error("malformed `{key}`: {source}")]
    BadMagnitude {
        /// Envelope key.
        key: &'static str,
        /// Underlying parse error.
        #[source]
        source: mpi::ParseHexError,
    },
    /// Unknown sign integer.
    #[error("unsupported sign encoding {0} (expected 0, 1 or -1)")]
    BadSign(i64),
    /// A key component violated its invariant.
    #[error("`{0}` must be greater than 1")]
    OutOfRange(&'static str),
    /// A ciphertext with a zero denominator.
    #[error("ciphertext denominator must be non-zero")]
    ZeroDenominator,
}

#[derive(Debug, Serialize, Deserialize)]
struct PrivateKeysFile {
    created: String,
    p: String,
    q: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PublicKeyFile {
    #[serde(rename = "N")]
    n: String,
    created: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CiphertextFile {
    created: String,
    denominator: String,
    numerator: String,
    sign: i64,
}

/// Read a private-keys envelope.
pub fn read_private_keys(path: &Path) -> Result<PrivateKey, EnvelopeError> {
    let file: PrivateKeysFile = read_json(path)?;
    let p = parse_key_magnitude("p", &file.p)?;
    let q = parse_key_magnitude("q", &file.q)?;
    Ok(PrivateKey { p, q })
}

/// Write a private-keys envelope.
pub fn write_private_keys(path: &Path, keys: &PrivateKey) -> Result<(), EnvelopeError> {
    write_json(
        path,
        &PrivateKeysFile {
            created: timestamp(),
            p: keys.p.to_str_radix(16),
            q: keys.q.to_str_radix(16),
        },
    )
}

/// Read a public-key envelope.
pub fn read_public_key(path: &Path) -> Result<PublicKey, EnvelopeError> {
    let file: PublicKeyFile = read_json(path)?;
    Ok(PublicKey { n: parse_key_magnitude("N", &file.n)? })
}

/// Write a public-key envelope.
pub fn write_public_key(path: &Path, key: &PublicKey) -> Result<(), EnvelopeError> {
    write_json(
        path,
        &PublicKeyFile { n: key.n.to_str_radix(16), created: timestamp() },
    )
}

/// Read a ciphertext envelope, normalizing the sign encoding.
pub fn read_ciphertext(path: &Path) -> Result<Ciphertext, EnvelopeError> {
    let file: CiphertextFile = read_json(path)?;
    let numerator = mpi::parse_hex(&file.numerator)
        .map_err(|source| EnvelopeError::BadMagnitude { key: "numerator", source })?;
    let denominator = mpi::parse_hex(&file.denominator)
        .map_err(|source| EnvelopeError::BadMagnitude { key: "denominator", source })?;
    if denominator.is_zero() {
        return Err(EnvelopeError::ZeroDenominator);
    }
    Ok(Ciphertext { sign: decode_sign(file.sign)?, numerator, denominator })
}

/// Write a ciphertext envelope.
pub fn write_ciphertext(path: &Path, ct: &Ciphertext) -> Result<(), EnvelopeError> {
    write_json(
        path,
        &CiphertextFile {
            created: timestamp(),
            denominator: mpi::render_hex(&ct.denominator),
            numerator: mpi::render_hex(&ct.numerator),
            sign: encode_sign(ct.sign),
        },
    )
}

/// Legacy envelopes wrote the IEEE sign bit (`0` non-negative, `1`
/// negative); the current form writes `1`/`-1`. The integer `1` is
/// ambiguous between the two generations and resolves to the current
/// meaning, non-negative, so that written envelopes read back unchanged.
fn decode_sign(v: i64) -> Result<Sign, EnvelopeError> {
    match v {
        0 | 1 => Ok(Sign::Plus),
        -1 => Ok(Sign::Minus),
        other => Err(EnvelopeError::BadSign(other)),
    }
}

fn encode_sign(s: Sign) -> i64 {
    s.as_factor()
}

fn parse_key_magnitude(key: &'static str, hex: &str) -> Result<BigUint, EnvelopeError> {
    let value =
        mpi::parse_hex(hex).map_err(|source| EnvelopeError::BadMagnitude { key, source })?;
    let (sign, magnitude) = value.into_parts();
    if sign == num_bigint::Sign::Minus || magnitude <= BigUint::one() {
        return Err(EnvelopeError::OutOfRange(key));
    }
    Ok(magnitude)
}

fn timestamp() -> String {
    Local::now().format("%a %b %e %H:%M:%S %Y").to_string()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, EnvelopeError> {
    let text = fs::read_to_string(path)
        .map_err(|source| EnvelopeError::Read { path: path.to_owned(), source })?;
    serde_json::from_str(&text)
        .map_err(|source| EnvelopeError::Json { path: path.to_owned(), source })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), EnvelopeError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .map_err(|source| EnvelopeError::Json { path: path.to_owned(), source })?;
    buf.push(b'\n');

    let tmp = temp_path(path);
    fs::write(&tmp, &buf)
        .map_err(|source| EnvelopeError::Write { path: tmp.clone(), source })?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        EnvelopeError::Write { path: path.to_owned(), source }
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ahetool-envelope-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn private_keys_round_trip() {
        let path = scratch("keys.json");
        let keys = PrivateKey { p: BigUint::from(7919u32), q: BigUint::from(6133u32) };
        write_private_keys(&path, &keys).unwrap();
        assert_eq!(read_private_keys(&path).unwrap(), keys);
    }

    #[test]
    fn public_key_round_trip_and_shape() {
        let path = scratch("pub.json");
        let key = PublicKey { n: BigUint::from(48_566_627u64) };
        write_public_key(&path, &key).unwrap();
        assert_eq!(read_public_key(&path).unwrap(), key);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n    \"N\""), "4-space indent expected: {text}");
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn ciphertext_round_trip() {
        let path = scratch("ct.json");
        let ct = Ciphertext {
            sign: Sign::Minus,
            numerator: BigInt::from(3_145_727i64),
            denominator: BigInt::from(12),
        };
        write_ciphertext(&path, &ct).unwrap();
        assert_eq!(read_ciphertext(&path).unwrap(), ct);
    }

    #[test]
    fn legacy_sign_and_hex_forms_are_accepted() {
        let path = scratch("legacy.json");
        // Leading-zero, uppercase hex and the 0/1 sign bit, as the original
        // tool wrote them.
        fs::write(
            &path,
            "{\n    \"created\": \"Mon Jun  1 10:00:00 2015\\n\",\n    \
             \"denominator\": \"000C\",\n    \"numerator\": \"01A\",\n    \"sign\": 0\n}\n",
        )
        .unwrap();
        let ct = read_ciphertext(&path).unwrap();
        assert_eq!(ct.sign, Sign::Plus);
        assert_eq!(ct.numerator, BigInt::from(26));
        assert_eq!(ct.denominator, BigInt::from(12));
    }

    #[test]
    fn negative_magnitudes_survive() {
        let path = scratch("negative.json");
        let ct = Ciphertext {
            sign: Sign::Plus,
            numerator: BigInt::from(-38),
            denominator: BigInt::from(8),
        };
        write_ciphertext(&path, &ct).unwrap();
        assert_eq!(read_ciphertext(&path).unwrap().numerator, BigInt::from(-38));
    }

    #[test]
    fn malformed_envelopes_are_rejected() {
        let path = scratch("bad.json");

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_ciphertext(&path), Err(EnvelopeError::Json { .. })));

        fs::write(
            &path,
            "{\"created\": \"\", \"denominator\": \"xyz\", \"numerator\": \"1\", \"sign\": 1}",
        )
        .unwrap();
        assert!(matches!(
            read_ciphertext(&path),
            Err(EnvelopeError::BadMagnitude { key: "denominator", .. })
        ));

        fs::write(
            &path,
            "{\"created\": \"\", \"denominator\": \"c\", \"numerator\": \"1\", \"sign\": 2}",
        )
        .unwrap();
        assert!(matches!(read_ciphertext(&path), Err(EnvelopeError::BadSign(2))));

        fs::write(
            &path,
            "{\"created\": \"\", \"denominator\": \"0\", \"numerator\": \"1\", \"sign\": 1}",
        )
        .unwrap();
        assert!(matches!(read_ciphertext(&path), Err(EnvelopeError::ZeroDenominator)));
    }

    #[test]
    fn key_invariants_are_enforced() {
        let path = scratch("badkeys.json");
        fs::write(&path, "{\"created\": \"\", \"p\": \"1\", \"q\": \"17f5\"}").unwrap();
        assert!(matches!(
            read_private_keys(&path),
            Err(EnvelopeError::OutOfRange("p"))
        ));
    }

    #[test]
    fn no_partial_file_on_failed_write() {
        // Writing into a missing directory fails before the target exists.
        let path = std::env::temp_dir()
            .join(format!("ahetool-missing-{}", std::process::id()))
            .join("nope")
            .join("out.json");
        let key = PublicKey { n: BigUint::from(35u32) };
        assert!(write_public_key(&path, &key).is_err());
        assert!(!path.exists());
    }
}
