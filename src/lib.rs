//! scriptveil: self-reconstructing Lua obfuscation
//!
//! Turns Lua source text into a disguised loader chunk that:
//! - Embeds the ciphertext plus a private reconstruction routine
//! - Recomputes the original text at load time, with no dependencies
//! - Hands it to `loadstring`/`load`, forwarding varargs transparently
//!
//! ## How it works
//!
//! 1. **Transform**: run a keyed, multi-round invertible transform over the
//!    plaintext bytes
//! 2. **Generate**: emit a Lua decoder stub implementing the exact inverse,
//!    with freshly randomized identifiers
//! 3. **Assemble**: wrap decoy helpers, the decoder chain, and the final
//!    evaluation call in one immediately-invoked scope
//!
//! This is reversible obfuscation, not encryption. Anyone holding the
//! algorithm and the embedded key can invert it.

pub mod engine;
pub mod error;
pub mod names;
pub mod stub;
pub mod wrapper;

pub use engine::{decode, decode_result, hash, verify, Engine, EngineConfig, TransformResult};
pub use error::{DecodeError, EncodeError, GenerationError, ObfuscationError};
pub use stub::{StubGenerator, MAX_DEPTH};
pub use wrapper::{Assembler, Preprocessor};
