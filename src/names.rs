//! Random identifier source for generated Lua.
//!
//! Every stub invocation draws fresh stage and carrier names, so two stubs
//! generated for identical plaintext and key are never textually identical.
//! The naming entropy, not the transform, is what raises the cost of diffing
//! generated artifacts.

use rand::Rng;
use std::collections::HashSet;

/// Lua reserved words that must never be emitted as identifiers.
const LUA_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function",
    "if", "in", "local", "nil", "not", "or", "repeat", "return", "then",
    "true", "until", "while",
];

const FIRST_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_";
const REST_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";

/// Draws unique random Lua identifiers from an owned RNG.
pub struct NameGen<R: Rng> {
    rng: R,
    issued: HashSet<String>,
}

impl<R: Rng> NameGen<R> {
    pub fn new(rng: R) -> Self {
        Self { rng, issued: HashSet::new() }
    }

    /// Produce a fresh identifier, 6-12 characters, never a Lua keyword and
    /// never a repeat within this generator's lifetime.
    pub fn next(&mut self) -> String {
        loop {
            let len = self.rng.gen_range(6..=12);
            let mut name = String::with_capacity(len);
            name.push(FIRST_CHARS[self.rng.gen_range(0..FIRST_CHARS.len())] as char);
            for _ in 1..len {
                name.push(REST_CHARS[self.rng.gen_range(0..REST_CHARS.len())] as char);
            }
            if LUA_KEYWORDS.contains(&name.as_str()) || self.issued.contains(&name) {
                continue;
            }
            self.issued.insert(name.clone());
            return name;
        }
    }

    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }
}
