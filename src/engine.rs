//! Transform Engine: keyed, multi-round invertible byte transform.
//!
//! Encoding runs four rounds per byte (key whitening, positional diffusion,
//! nonlinear mixing, iterated confusion); decoding applies the exact inverse
//! in reverse round order. The same algorithm, with the same constants, is
//! what the stub generator reproduces in emitted Lua — one canonical
//! definition on both sides.
//!
//! This is reversible obfuscation, not encryption: anyone holding the
//! algorithm and the key can invert it.

use crate::error::{DecodeError, EncodeError};
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Round constants. All odd, hence invertible mod 256.
pub(crate) const P1: i64 = 7;
pub(crate) const P2: i64 = 13;
pub(crate) const P3: i64 = 17;
pub(crate) const P4: i64 = 19;

/// Base symbol alphabet for the cosmetic display text.
const BASE_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Extra symbols mixed in when the extended alphabet is enabled.
const EXTENDED_SYMBOLS: &str = "!#$%&()*+,-./:;<=>?@[]^_{|}~";

/// Immutable output of one encode call: ciphertext plus metadata.
///
/// Serializes with camelCase keys for interchange:
/// `{displayText, codeValues, key, salt, iterationCount, checksums,
/// originalLength}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResult {
    /// One character per input byte, drawn from the symbol alphabet via
    /// modulo. Cosmetic and lossy; never used for reconstruction.
    pub display_text: String,
    /// The authoritative ciphertext, index-aligned with the plaintext.
    pub code_values: Vec<u8>,
    /// Transform key.
    pub key: u8,
    /// Positional salt in 1..=99.
    pub salt: u8,
    /// Confusion rounds applied per byte.
    pub iteration_count: u32,
    /// Weak positional hints, `(b + i + salt) mod 256`. Same length as
    /// `code_values`.
    pub checksums: Vec<u8>,
    /// Redundant with `code_values.len()`; kept for consumers that only
    /// persist metadata.
    #[serde(default)]
    pub original_length: usize,
}

/// Engine configuration. Unset fields are chosen at construction.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Explicit key (any 0-255). When `None`, drawn uniformly from 100..=255.
    pub key: Option<u8>,
    /// Confusion rounds per byte. Defaults to 3.
    pub iteration_count: Option<u32>,
    /// Extend the display alphabet with punctuation symbols.
    pub extended_alphabet: bool,
}

/// The keyed transform engine. All state is fixed at construction, so a
/// shared instance is safe to use from multiple threads.
#[derive(Debug, Clone)]
pub struct Engine {
    key: u8,
    salt: u8,
    iteration_count: u32,
    alphabet: Vec<char>,
}

impl Engine {
    /// Create an engine, drawing any unset key/salt from the thread RNG.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_rng(config, &mut rand::thread_rng())
    }

    /// Create an engine with a specific RNG (for deterministic tests).
    pub fn with_rng<R: Rng>(config: EngineConfig, rng: &mut R) -> Self {
        let key = config.key.unwrap_or_else(|| rng.gen_range(100..=255));
        let salt = rng.gen_range(1..=99);
        let iteration_count = config.iteration_count.unwrap_or(3).max(1);

        let mut alphabet: Vec<char> = BASE_ALPHABET.chars().collect();
        if config.extended_alphabet {
            alphabet.extend(EXTENDED_SYMBOLS.chars());
        }

        Self { key, salt, iteration_count, alphabet }
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn salt(&self) -> u8 {
        self.salt
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    /// Run the forward transform over `plaintext`.
    pub fn encode(&self, plaintext: &[u8]) -> Result<TransformResult, EncodeError> {
        if plaintext.is_empty() {
            return Err(EncodeError::Empty);
        }
        debug!(
            "encode: {} bytes, key={}, salt={}, iterations={}",
            plaintext.len(),
            self.key,
            self.salt,
            self.iteration_count
        );

        let mut code_values = Vec::with_capacity(plaintext.len());
        let mut checksums = Vec::with_capacity(plaintext.len());
        let mut display_text = String::with_capacity(plaintext.len());

        for (idx, &byte) in plaintext.iter().enumerate() {
            let i = idx as i64 + 1;
            let value = encode_byte(byte, i, self.key, self.salt, self.iteration_count);

            code_values.push(value);
            checksums.push(((byte as i64 + i + self.salt as i64) % 256) as u8);
            display_text.push(self.alphabet[value as usize % self.alphabet.len()]);
        }

        Ok(TransformResult {
            display_text,
            original_length: code_values.len(),
            code_values,
            key: self.key,
            salt: self.salt,
            iteration_count: self.iteration_count,
            checksums,
        })
    }

    /// Decode a result produced by this (or any) engine back to text.
    pub fn decode_result(&self, result: &TransformResult) -> Result<String, DecodeError> {
        decode_result(result)
    }
}

/// Forward transform for one byte at 1-indexed position `i`.
fn encode_byte(byte: u8, i: i64, key: u8, salt: u8, iterations: u32) -> u8 {
    // Round 1: key whitening with a position-derived key.
    let pos_key = (key as i64) ^ ((i * P1) % 256);
    let x1 = (byte as i64) ^ pos_key;
    // Round 2: positional diffusion.
    let x2 = (x1 + i * P1 + (salt as i64) * P2) % 256;
    // Round 3: nonlinear mixing. The shifted value stays below 256.
    let mut x = x2 ^ ((i % 8) << ((i % 3) + 1));
    // Round 4: iterated confusion.
    for j in 1..=iterations as i64 {
        x = (x * P3 + j * P4) % 256;
        x ^= (i * j) % 256;
    }
    x as u8
}

/// Inverse transform for one byte at 1-indexed position `i`.
fn decode_byte(value: u8, i: i64, key: u8, salt: u8, iterations: u32) -> u8 {
    let inv = mod_inverse(P3, 256);
    let mut x = value as i64;
    for j in (1..=iterations as i64).rev() {
        x ^= (i * j) % 256;
        x = ((x - j * P4).rem_euclid(256) * inv) % 256;
    }
    x ^= (i % 8) << ((i % 3) + 1);
    x = (x - i * P1 - (salt as i64) * P2).rem_euclid(256);
    let pos_key = (key as i64) ^ ((i * P1) % 256);
    (x ^ pos_key) as u8
}

/// Invert the transform: exact inverse of [`Engine::encode`], per position,
/// in reverse round order.
pub fn decode(
    code_values: &[u8],
    key: u8,
    salt: u8,
    iteration_count: u32,
) -> Result<Vec<u8>, DecodeError> {
    if code_values.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(code_values
        .iter()
        .enumerate()
        .map(|(idx, &v)| decode_byte(v, idx as i64 + 1, key, salt, iteration_count))
        .collect())
}

/// Decode a full TransformResult back into text.
pub fn decode_result(result: &TransformResult) -> Result<String, DecodeError> {
    let bytes = decode(&result.code_values, result.key, result.salt, result.iteration_count)?;
    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
}

/// Diagnostic 16-bit rolling hash: affine accumulate plus positional XOR.
/// Not used for correctness anywhere.
pub fn hash(bytes: &[u8]) -> u16 {
    let mut h: u32 = 0;
    for (idx, &b) in bytes.iter().enumerate() {
        let i = idx as u32 + 1;
        h = (h.wrapping_mul(31).wrapping_add(b as u32)) & 0xFFFF;
        h ^= (i << 3) & 0xFFFF;
    }
    h as u16
}

/// Structural check: true iff `checksums` has an entry for every
/// `code_values` position.
///
/// Known limitation: this does not recompute expected checksums from the
/// original bytes, so it cannot detect tampering of `code_values`.
pub fn verify(result: &TransformResult) -> bool {
    result.checksums.len() == result.code_values.len()
}

/// Modular inverse of `a` mod `m` via the extended Euclidean algorithm.
/// Panics only for non-coprime inputs; every round constant is odd.
pub(crate) fn mod_inverse(a: i64, m: i64) -> i64 {
    let (mut old_r, mut r) = (a, m);
    let (mut old_s, mut s) = (1i64, 0i64);
    while r != 0 {
        let q = old_r / r;
        (old_r, r) = (r, old_r - q * r);
        (old_s, s) = (s, old_s - q * s);
    }
    assert_eq!(old_r, 1, "constants must be coprime with the modulus");
    old_s.rem_euclid(m)
}
