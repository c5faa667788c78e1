//! Command-line front end: one binary dispatching the toolkit operations
//!
//! Every operation reads and writes JSON envelopes on the filesystem; only
//! `decrypt` prints to stdout. Flag letters are fixed for compatibility
//! with the historic per-command tools (`-o`, `-k`, `-i`, `-p`, `-v`,
//! `-c`, `-a`, `-b`).
//!
//! Exit codes: `0` success, `1` command-line error (usage to stderr), `2`
//! runtime error (one-line message to stderr).

#![forbid(unsafe_code)]

use std::env;
use std::path::Path;
use std::process;

use anyhow::Context;
use rand::rngs::OsRng;

use ahetool::{
    envelope, keygen, scheme, Ciphertext, KeyGenOptions, PublicKey, SchemeError,
    DEFAULT_APPROX_BOUND, DEFAULT_KEY_BITS,
};

const USAGE: &str = "\
Usage: ahetool <command> [options]

Commands:
  genpkey  -o <file> [-k <bits>] [--special-factor]   generate private primes p, q
  extract  -i <privkeys> -o <file>                    derive the public key N = p*q
  encrypt  -p <privkeys> -v <double> -o <file>        encrypt a rational value
  decrypt  -p <privkeys> -c <ciphertext>              decrypt to stdout
  addenc   -p <pubkey> -a <ctA> -b <ctB> -o <file>    homomorphic addition
  subenc   -p <pubkey> -a <ctA> -b <ctB> -o <file>    homomorphic subtraction
  mulenc   -p <pubkey> -a <ctA> -b <ctB> -o <file>    homomorphic multiplication

Environment:
  AHETOOL_APPROX_BOUND  denominator bound for rational approximation
                        (default 100000000)
  RUST_LOG              log filter (tracing-subscriber syntax)
";

enum CliError {
    Usage(String),
    Runtime(anyhow::Error),
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Runtime(err)
    }
}

fn usage(msg: impl Into<String>) -> CliError {
    CliError::Usage(msg.into())
}

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn require_flag(args: &[String], key: &str, what: &str) -> Result<String, CliError> {
    parse_flag(args, key).ok_or_else(|| usage(format!("missing required option {key} ({what})")))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "ahetool=warn".into()))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => {}
        Err(CliError::Usage(msg)) => {
            eprintln!("ERROR: {msg}");
            eprintln!();
            eprint!("{USAGE}");
            process::exit(1);
        }
        Err(CliError::Runtime(err)) => {
            eprintln!("ahetool: {err:#}");
            process::exit(2);
        }
    }
}

fn run(args: &[String]) -> Result<(), CliError> {
    let Some(cmd) = args.first() else {
        return Err(usage("missing command"));
    };
    if cmd == "-h" || cmd == "--help" {
        print!("{USAGE}");
        return Ok(());
    }
    let rest = &args[1..];
    if has_flag(rest, "-h") || has_flag(rest, "--help") {
        print!("{USAGE}");
        return Ok(());
    }
    match cmd.as_str() {
        "genpkey" => cmd_genpkey(rest),
        "extract" => cmd_extract(rest),
        "encrypt" => cmd_encrypt(rest),
        "decrypt" => cmd_decrypt(rest),
        "addenc" => cmd_combine(rest, scheme::addenc),
        "subenc" => cmd_combine(rest, scheme::subenc),
        "mulenc" => cmd_combine(rest, scheme::mulenc),
        other => Err(usage(format!("unknown command `{other}`"))),
    }
}

fn cmd_genpkey(args: &[String]) -> Result<(), CliError> {
    let out = require_flag(args, "-o", "output file for the private keys")?;
    let bits = match parse_flag(args, "-k") {
        Some(s) => s
            .parse::<u64>()
            .map_err(|_| usage(format!("-k expects a bit size (got `{s}`)")))?,
        None => DEFAULT_KEY_BITS,
    };
    let opts = KeyGenOptions { special_factor: has_flag(args, "--special-factor") };

    let keys = keygen::generate_private_key(&mut OsRng, bits, opts)
        .context("key generation failed")?;
    envelope::write_private_keys(Path::new(&out), &keys)
        .context("writing private keys")?;
    Ok(())
}

fn cmd_extract(args: &[String]) -> Result<(), CliError> {
    let input = require_flag(args, "-i", "private keys file")?;
    let out = require_flag(args, "-o", "output file for the public key")?;

    let keys = envelope::read_private_keys(Path::new(&input))
        .context("reading private keys")?;
    envelope::write_public_key(Path::new(&out), &keys.public_key())
        .context("writing public key")?;
    Ok(())
}

fn cmd_encrypt(args: &[String]) -> Result<(), CliError> {
    let keys_path = require_flag(args, "-p", "private keys file")?;
    let value_str = require_flag(args, "-v", "value to encrypt")?;
    let out = require_flag(args, "-o", "output file for the ciphertext")?;

    let value = value_str
        .parse::<f64>()
        .map_err(|_| usage(format!("-v expects a number (got `{value_str}`)")))?;
    let bound = approx_bound_from_env()?;

    let keys = envelope::read_private_keys(Path::new(&keys_path))
        .context("reading private keys")?;
    let ct = scheme::encrypt_with_bound(value, &keys, bound).context("encrypting")?;
    envelope::write_ciphertext(Path::new(&out), &ct).context("writing ciphertext")?;
    Ok(())
}

fn cmd_decrypt(args: &[String]) -> Result<(), CliError> {
    let keys_path = require_flag(args, "-p", "private keys file")?;
    let ct_path = require_flag(args, "-c", "ciphertext file")?;

    let keys = envelope::read_private_keys(Path::new(&keys_path))
        .context("reading private keys")?;
    let ct = envelope::read_ciphertext(Path::new(&ct_path))
        .context("reading ciphertext")?;
    let plain = scheme::decrypt(&ct, &keys).context("decrypting")?;
    println!("{plain}");
    Ok(())
}

fn cmd_combine(
    args: &[String],
    op: fn(&Ciphertext, &Ciphertext, &PublicKey) -> Result<Ciphertext, SchemeError>,
) -> Result<(), CliError> {
    let key_path = require_flag(args, "-p", "public key file")?;
    let a_path = require_flag(args, "-a", "first ciphertext file")?;
    let b_path = require_flag(args, "-b", "second ciphertext file")?;
    let out = require_flag(args, "-o", "output file for the result")?;

    let key = envelope::read_public_key(Path::new(&key_path))
        .context("reading public key")?;
    let a = envelope::read_ciphertext(Path::new(&a_path))
        .context("reading first ciphertext")?;
    let b = envelope::read_ciphertext(Path::new(&b_path))
        .context("reading second ciphertext")?;

    let c = op(&a, &b, &key).context("combining ciphertexts")?;
    envelope::write_ciphertext(Path::new(&out), &c).context("writing ciphertext")?;
    Ok(())
}

fn approx_bound_from_env() -> Result<i64, CliError> {
    match env::var("AHETOOL_APPROX_BOUND") {
        Ok(s) => s.parse::<i64>().map_err(|_| {
            CliError::Runtime(anyhow::anyhow!(
                "AHETOOL_APPROX_BOUND must be an integer (got `{s}`)"
            ))
        }),
        Err(_) => Ok(DEFAULT_APPROX_BOUND),
    }
}
