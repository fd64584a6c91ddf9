//! Decoder-Stub Generator: emits self-contained Lua that reconstructs the
//! plaintext from numbers embedded in the emitted text alone.
//!
//! The ciphertext is embedded order-reversed inside an escaped string
//! literal. The stub runs five substages over it — carrier extraction,
//! un-reversal, confusion unwinding, positional unmixing, byte
//! reconstruction — which together are the exact inverse of
//! [`Engine::encode`](crate::engine::Engine::encode). All constants (round
//! multipliers, the modular inverse, key, salt) are fixed into the emitted
//! text at generation time, so the stub needs nothing from this crate.
//!
//! The chunk is dependency-free Lua: bitwise XOR is emitted as a local
//! arithmetic helper, so it runs on Lua 5.1+ and Luau without `bit32`.

use crate::engine::{mod_inverse, TransformResult, P1, P2, P3, P4};
use crate::error::GenerationError;
use crate::names::NameGen;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Upper bound on `depth`, to bound generation cost.
pub const MAX_DEPTH: u32 = 10;

/// Number of logical decode substages.
const SUBSTAGES: u32 = 5;

/// Generator configuration: `complexity` is the count of inert decoy helpers
/// emitted alongside the real chain; `depth` is how many decode substages get
/// their own named stage function (lower values fuse contiguous substages).
#[derive(Debug, Clone)]
pub struct StubGenerator {
    complexity: u32,
    depth: u32,
}

impl Default for StubGenerator {
    fn default() -> Self {
        Self { complexity: 4, depth: SUBSTAGES }
    }
}

/// Generated stub pieces, kept separate so the assembler can order them.
#[derive(Debug)]
pub(crate) struct DecoderStub {
    /// Inert decoy helper definitions. No data dependency on the chain.
    pub decoys: Vec<String>,
    /// Real decoder chain: XOR helper, carrier literal, stage functions.
    pub chain: Vec<String>,
    /// Expression evaluating to the reconstructed plaintext string.
    pub output_expr: String,
}

impl StubGenerator {
    pub fn new(complexity: u32, depth: u32) -> Self {
        Self { complexity, depth: depth.clamp(1, MAX_DEPTH) }
    }

    /// Emit a standalone decoder chunk: evaluating it returns the plaintext.
    pub fn generate(&self, result: &TransformResult) -> Result<String, GenerationError> {
        self.generate_with_rng(result, &mut StdRng::from_entropy())
    }

    /// Standalone emission with a caller-supplied RNG (deterministic tests).
    pub fn generate_with_rng<R: Rng>(
        &self,
        result: &TransformResult,
        rng: &mut R,
    ) -> Result<String, GenerationError> {
        let stub = self.build_with_rng(result, rng)?;
        let mut lines = stub.decoys;
        lines.extend(stub.chain);
        lines.push(format!("return {}", stub.output_expr));
        Ok(lines.join("\n"))
    }

    /// Build the stub pieces for the assembler.
    pub(crate) fn build_with_rng<R: Rng>(
        &self,
        result: &TransformResult,
        rng: &mut R,
    ) -> Result<DecoderStub, GenerationError> {
        if result.code_values.is_empty() {
            return Err(GenerationError::EmptyCiphertext);
        }
        if result.checksums.len() != result.code_values.len() {
            return Err(GenerationError::LengthMismatch {
                checksums: result.checksums.len(),
                code_values: result.code_values.len(),
            });
        }

        let mut names = NameGen::new(StdRng::seed_from_u64(rng.gen()));
        let decoys = (0..self.complexity).map(|_| emit_decoy(&mut names)).collect();

        let bx = names.next();
        let carrier = names.next();
        let ctx = StageContext {
            bx: bx.clone(),
            key: result.key,
            salt: result.salt,
            iterations: result.iteration_count,
        };

        let mut chain = vec![emit_xor_helper(&mut names, &bx)];

        let mut reversed = result.code_values.clone();
        reversed.reverse();
        chain.push(format!("local {carrier} = \"{}\"", escape_lua_bytes(&reversed)));

        // Partition the five substages into `depth` contiguous named groups.
        let named = self.depth.min(SUBSTAGES) as usize;
        let groups = partition_substages(named);
        debug!("stub: {} named stages, {} decoys", groups.len(), self.complexity);

        let mut output_expr = carrier;
        for group in groups {
            let stage_name = names.next();
            chain.push(emit_stage(&stage_name, &group, &ctx, &mut names));
            output_expr = format!("{stage_name}({output_expr})");
        }

        Ok(DecoderStub { decoys, chain, output_expr })
    }
}

/// Constants a stage needs beyond the sequence it consumes.
struct StageContext {
    bx: String,
    key: u8,
    salt: u8,
    iterations: u32,
}

/// The five decode substages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Substage {
    /// Carrier string literal -> byte array.
    Extract,
    /// Undo the generation-time order reversal.
    Reverse,
    /// Unwind the iterated confusion rounds, last round first.
    Unwind,
    /// Undo nonlinear mixing and positional diffusion.
    Unmix,
    /// XOR away the position-derived key and rebuild the text.
    Rebuild,
}

const PIPELINE: [Substage; SUBSTAGES as usize] =
    [Substage::Extract, Substage::Reverse, Substage::Unwind, Substage::Unmix, Substage::Rebuild];

/// Split the pipeline into `named` contiguous groups, earlier groups larger.
fn partition_substages(named: usize) -> Vec<Vec<Substage>> {
    let base = PIPELINE.len() / named;
    let extra = PIPELINE.len() % named;
    let mut groups = Vec::with_capacity(named);
    let mut cursor = 0;
    for g in 0..named {
        let len = base + usize::from(g < extra);
        groups.push(PIPELINE[cursor..cursor + len].to_vec());
        cursor += len;
    }
    groups
}

/// Emit one named stage function running `group`'s substages in order.
fn emit_stage<R: Rng>(
    name: &str,
    group: &[Substage],
    ctx: &StageContext,
    names: &mut NameGen<R>,
) -> String {
    let param = names.next();
    let mut body = String::new();
    let mut var = param.clone();
    for substage in group {
        let (stmt, out) = emit_substage(*substage, &var, ctx, names);
        body.push_str(&stmt);
        body.push(' ');
        var = out;
    }
    format!("local function {name}({param}) {body}return {var} end")
}

/// Emit one substage as a statement consuming `input` into a fresh variable.
fn emit_substage<R: Rng>(
    substage: Substage,
    input: &str,
    ctx: &StageContext,
    names: &mut NameGen<R>,
) -> (String, String) {
    let out = names.next();
    let i = names.next();
    let stmt = match substage {
        Substage::Extract => format!(
            "local {out} = {{}} for {i} = 1, #{input} do \
             {out}[{i}] = string.byte({input}, {i}) end"
        ),
        Substage::Reverse => {
            let len = names.next();
            format!(
                "local {out} = {{}} local {len} = #{input} for {i} = 1, {len} do \
                 {out}[{i}] = {input}[{len} - {i} + 1] end"
            )
        }
        Substage::Unwind => {
            let v = names.next();
            let j = names.next();
            let bx = &ctx.bx;
            let iters = ctx.iterations;
            let inv = mod_inverse(P3, 256);
            format!(
                "local {out} = {{}} for {i} = 1, #{input} do local {v} = {input}[{i}] \
                 for {j} = {iters}, 1, -1 do {v} = {bx}({v}, ({i} * {j}) % 256) \
                 {v} = (({v} - {j} * {P4}) % 256 * {inv}) % 256 end {out}[{i}] = {v} end"
            )
        }
        Substage::Unmix => {
            let v = names.next();
            let bx = &ctx.bx;
            let salt_term = ctx.salt as i64 * P2;
            format!(
                "local {out} = {{}} for {i} = 1, #{input} do \
                 local {v} = {bx}({input}[{i}], ({i} % 8) * ({{2, 4, 8}})[{i} % 3 + 1]) \
                 {out}[{i}] = ({v} - {i} * {P1} - {salt_term}) % 256 end"
            )
        }
        Substage::Rebuild => {
            let text = names.next();
            let bx = &ctx.bx;
            let key = ctx.key;
            let stmt = format!(
                "local {out} = {{}} for {i} = 1, #{input} do \
                 {out}[{i}] = string.char({bx}({input}[{i}], {bx}({key}, ({i} * {P1}) % 256))) end \
                 local {text} = table.concat({out})"
            );
            return (stmt, text);
        }
    };
    (stmt, out)
}

/// Emit the arithmetic XOR helper the real chain depends on.
fn emit_xor_helper<R: Rng>(names: &mut NameGen<R>, bx: &str) -> String {
    let (a, b) = (names.next(), names.next());
    let (r, p) = (names.next(), names.next());
    let (m, n) = (names.next(), names.next());
    format!(
        "local function {bx}({a}, {b}) local {r}, {p} = 0, 1 \
         while {a} > 0 or {b} > 0 do local {m}, {n} = {a} % 2, {b} % 2 \
         if {m} ~= {n} then {r} = {r} + {p} end \
         {a} = ({a} - {m}) / 2 {b} = ({b} - {n}) / 2 {p} = {p} * 2 end \
         return {r} end"
    )
}

/// Emit one inert decoy helper: random name, random operands, no data
/// dependency on the decoder chain.
fn emit_decoy<R: Rng>(names: &mut NameGen<R>) -> String {
    let name = names.next();
    let (a, b) = (names.next(), names.next());
    let k1: u32 = names.rng_mut().gen_range(3..250);
    let k2: u32 = names.rng_mut().gen_range(3..250);
    let m1: u32 = names.rng_mut().gen_range(97..256);
    match names.rng_mut().gen_range(0..3) {
        0 => {
            let x = names.next();
            format!(
                "local function {name}({a}, {b}) local {x} = ({a} * {k1} + {k2}) % {m1} \
                 return ({x} + {b} * {k2}) % {m1} end"
            )
        }
        1 => format!(
            "local function {name}({a}, {b}) if {a} > {b} then \
             return ({a} - {b} + {k1}) % {m1} end return ({b} - {a} + {k2}) % {m1} end"
        ),
        _ => {
            let s = names.next();
            let i = names.next();
            format!(
                "local function {name}({a}) local {s} = 0 for {i} = 1, {k1} do \
                 {s} = ({s} + {i} * {k2}) % {m1} end return {s} + {a} end"
            )
        }
    }
}

/// Escape raw bytes into the body of a double-quoted Lua string literal.
///
/// Printable ASCII passes through; backslash and double-quote are escaped;
/// everything else becomes a three-digit `\ddd` decimal escape so a trailing
/// digit in the plaintext can never extend the escape.
pub(crate) fn escape_lua_bytes(bytes: &[u8]) -> String {
    let mut literal = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'"' => literal.push_str("\\\""),
            b'\\' => literal.push_str("\\\\"),
            0x20..=0x7E => literal.push(b as char),
            _ => literal.push_str(&format!("\\{b:03}")),
        }
    }
    literal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{decode, Engine, EngineConfig};

    fn sample_result(plaintext: &[u8], seed: u64) -> TransformResult {
        let mut rng = StdRng::seed_from_u64(seed);
        let engine = Engine::with_rng(
            EngineConfig { key: Some(177), iteration_count: Some(3), extended_alphabet: false },
            &mut rng,
        );
        engine.encode(plaintext).unwrap()
    }

    /// Parse back a literal produced by `escape_lua_bytes`.
    fn unescape_lua_bytes(literal: &str) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut chars = literal.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '\\' {
                bytes.push(c as u8);
                continue;
            }
            match chars.next().unwrap() {
                '"' => bytes.push(b'"'),
                '\\' => bytes.push(b'\\'),
                d => {
                    let mut digits = String::from(d);
                    digits.push(chars.next().unwrap());
                    digits.push(chars.next().unwrap());
                    bytes.push(digits.parse::<u8>().unwrap());
                }
            }
        }
        bytes
    }

    #[test]
    fn test_escape_round_trip_covers_metacharacters() {
        let raw: Vec<u8> = vec![b'A', b'"', b'\\', 0, 10, 13, 127, 255, b'7'];
        let literal = escape_lua_bytes(&raw);
        assert!(literal.contains("\\\""));
        assert!(literal.contains("\\\\"));
        assert!(literal.contains("\\000"));
        assert!(literal.contains("\\255"));
        assert_eq!(unescape_lua_bytes(&literal), raw);
    }

    #[test]
    fn test_escape_always_three_digits() {
        // A digit after an escape must not be absorbed into it.
        let literal = escape_lua_bytes(&[5, b'7']);
        assert_eq!(literal, "\\0057");
        assert_eq!(unescape_lua_bytes(&literal), vec![5, b'7']);
    }

    #[test]
    fn test_generate_rejects_empty_ciphertext() {
        let mut result = sample_result(b"x = 1", 1);
        result.code_values.clear();
        result.checksums.clear();
        let err = StubGenerator::default().generate(&result).unwrap_err();
        assert_eq!(err, GenerationError::EmptyCiphertext);
    }

    #[test]
    fn test_generate_rejects_checksum_mismatch() {
        let mut result = sample_result(b"x = 1", 1);
        result.checksums.pop();
        let err = StubGenerator::default().generate(&result).unwrap_err();
        assert!(matches!(err, GenerationError::LengthMismatch { .. }));
    }

    #[test]
    fn test_stub_embeds_reversed_escaped_carrier() {
        let plaintext = b"print(\"42\")";
        let result = sample_result(plaintext, 2);
        let mut rng = StdRng::seed_from_u64(3);
        let stub = StubGenerator::new(0, 5).build_with_rng(&result, &mut rng).unwrap();

        let mut reversed = result.code_values.clone();
        reversed.reverse();
        let carrier = escape_lua_bytes(&reversed);
        let chain = stub.chain.join("\n");
        assert!(chain.contains(&carrier), "carrier literal not embedded verbatim");

        // The embedded data path inverts cleanly: unescape, un-reverse, decode.
        let mut recovered = unescape_lua_bytes(&carrier);
        recovered.reverse();
        assert_eq!(recovered, result.code_values);
        let decoded = decode(&recovered, result.key, result.salt, result.iteration_count).unwrap();
        assert_eq!(decoded, plaintext);
    }

    #[test]
    fn test_stub_embeds_generation_time_constants() {
        let result = sample_result(b"return 1 + 1", 4);
        let mut rng = StdRng::seed_from_u64(5);
        let stub = StubGenerator::new(0, 5).build_with_rng(&result, &mut rng).unwrap();
        let chain = stub.chain.join("\n");
        // Modular inverse of the round multiplier, key, and folded salt term.
        assert!(chain.contains("* 241) % 256"));
        assert!(chain.contains(&format!("({}, ", result.key)));
        assert!(chain.contains(&format!("- {}) % 256", result.salt as i64 * 13)));
    }

    #[test]
    fn test_depth_controls_named_stage_count() {
        let result = sample_result(b"local t = {}", 6);
        for (depth, expected_stages) in [(1u32, 1usize), (2, 2), (3, 3), (5, 5), (10, 5)] {
            let mut rng = StdRng::seed_from_u64(7);
            let stub = StubGenerator::new(0, depth).build_with_rng(&result, &mut rng).unwrap();
            let functions = stub
                .chain
                .iter()
                .filter(|s| s.starts_with("local function "))
                .count();
            // One XOR helper plus the named stages.
            assert_eq!(functions, expected_stages + 1, "depth {depth}");
            // The output expression nests exactly `expected_stages` calls.
            assert_eq!(stub.output_expr.matches('(').count(), expected_stages);
        }
    }

    #[test]
    fn test_complexity_controls_decoy_count() {
        let result = sample_result(b"print(1)", 8);
        for complexity in [0u32, 3, 9] {
            let mut rng = StdRng::seed_from_u64(9);
            let stub = StubGenerator::new(complexity, 5)
                .build_with_rng(&result, &mut rng)
                .unwrap();
            assert_eq!(stub.decoys.len(), complexity as usize);
        }
    }

    #[test]
    fn test_same_seed_is_deterministic_different_seeds_differ() {
        let result = sample_result(b"while true do end", 10);
        let gen = StubGenerator::new(2, 5);
        let a = gen
            .generate_with_rng(&result, &mut StdRng::seed_from_u64(42))
            .unwrap();
        let b = gen
            .generate_with_rng(&result, &mut StdRng::seed_from_u64(42))
            .unwrap();
        let c = gen
            .generate_with_rng(&result, &mut StdRng::seed_from_u64(43))
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        // Identical data, different names only: the carrier is shared.
        let mut reversed = result.code_values.clone();
        reversed.reverse();
        let carrier = escape_lua_bytes(&reversed);
        assert!(a.contains(&carrier));
        assert!(c.contains(&carrier));
    }

    #[test]
    fn test_standalone_stub_returns_chain_result() {
        let result = sample_result(b"print('ok')", 11);
        let text = StubGenerator::new(1, 3)
            .generate_with_rng(&result, &mut StdRng::seed_from_u64(12))
            .unwrap();
        let last = text.lines().last().unwrap();
        assert!(last.starts_with("return "));
        assert!(last.contains('('));
    }
}
