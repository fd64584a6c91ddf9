//! Wrapper Assembler: stitches decoys, the decoder chain, and the final
//! dynamic-evaluation call into one runnable Lua artifact.
//!
//! The emitted program is `return (function(...) ... end)(...)`, so incoming
//! call arguments and return values pass through transparently. Evaluating it
//! is observably equivalent to evaluating the plaintext directly, modulo
//! one-time decode latency. Because the artifact is itself a plain Lua chunk,
//! it can be fed back in as new plaintext to stack the whole pipeline on its
//! own output.

use crate::engine::{Engine, TransformResult};
use crate::error::ObfuscationError;
use crate::stub::{DecoderStub, StubGenerator};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Optional text-to-text hook run before the core pipeline. The crate ships
/// no implementation; callers plug in their own preprocessor (e.g. a
/// tokenizer-based minifier).
pub type Preprocessor = Box<dyn Fn(&str) -> String>;

/// Composes obfuscated artifacts. Holds only read-only configuration after
/// construction.
pub struct Assembler {
    generator: StubGenerator,
    minify: bool,
    preprocessor: Option<Preprocessor>,
}

impl Assembler {
    pub fn new(generator: StubGenerator) -> Self {
        Self { generator, minify: false, preprocessor: None }
    }

    /// Emit statements space-joined on a single line instead of one per line.
    pub fn minified(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    /// Install a `preprocess(text) -> text` step applied before encoding.
    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    /// Obfuscate `source`, returning only the runnable artifact.
    pub fn obfuscate(&self, engine: &Engine, source: &str) -> Result<String, ObfuscationError> {
        self.assemble(engine, source).map(|(artifact, _)| artifact)
    }

    /// Obfuscate `source`, returning the artifact plus the TransformResult
    /// that was embedded into it (for persistence or diagnostics).
    pub fn assemble(
        &self,
        engine: &Engine,
        source: &str,
    ) -> Result<(String, TransformResult), ObfuscationError> {
        self.assemble_with_rng(engine, source, &mut StdRng::from_entropy())
    }

    /// Assembly with a caller-supplied RNG (deterministic tests).
    pub fn assemble_with_rng<R: Rng>(
        &self,
        engine: &Engine,
        source: &str,
        rng: &mut R,
    ) -> Result<(String, TransformResult), ObfuscationError> {
        let prepared = match &self.preprocessor {
            Some(preprocess) => preprocess(source),
            None => source.to_string(),
        };

        let result = engine.encode(prepared.as_bytes())?;
        let stub = self.generator.build_with_rng(&result, rng)?;
        let artifact = compose(&stub, self.minify);
        debug!(
            "assembled artifact: {} bytes from {} plaintext bytes",
            artifact.len(),
            prepared.len()
        );
        Ok((artifact, result))
    }
}

/// Stitch the pieces in contract order: decoys, decoder chain, evaluation.
pub(crate) fn compose(stub: &DecoderStub, minify: bool) -> String {
    let mut statements: Vec<&str> = Vec::with_capacity(stub.decoys.len() + stub.chain.len() + 1);
    statements.extend(stub.decoys.iter().map(String::as_str));
    statements.extend(stub.chain.iter().map(String::as_str));
    let eval = format!("return (loadstring or load)({})(...)", stub.output_expr);
    statements.push(&eval);

    if minify {
        format!("return (function(...) {} end)(...)", statements.join(" "))
    } else {
        let body: Vec<String> = statements.iter().map(|s| format!("    {s}")).collect();
        format!("return (function(...)\n{}\nend)(...)\n", body.join("\n"))
    }
}
