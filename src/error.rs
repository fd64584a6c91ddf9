//! Error types for the obfuscation pipeline.
//!
//! Each pipeline half fails fast with its own error; the assembler surface
//! wraps all of them in [`ObfuscationError`]. No partial TransformResult or
//! partial stub is ever returned.

use thiserror::Error;

/// Errors from the Transform Engine's encode path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// The plaintext was empty; there is nothing to transform.
    #[error("cannot encode empty input")]
    Empty,
}

/// Errors from the Transform Engine's decode path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The ciphertext was empty or absent.
    #[error("cannot decode empty ciphertext")]
    Empty,
    /// A serialized TransformResult was missing a required field.
    #[error("transform result is missing required field `{0}`")]
    MissingField(&'static str),
    /// The recovered bytes were not valid UTF-8 text.
    #[error("decoded bytes are not valid UTF-8")]
    InvalidUtf8,
}

/// Errors from the Decoder-Stub Generator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// The TransformResult carried no ciphertext to embed.
    #[error("cannot generate a stub for an empty ciphertext")]
    EmptyCiphertext,
    /// Checksum metadata did not line up with the ciphertext.
    #[error("checksum length {checksums} does not match ciphertext length {code_values}")]
    LengthMismatch { checksums: usize, code_values: usize },
}

/// Umbrella error for the Wrapper Assembler surface.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObfuscationError {
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("stub generation failed: {0}")]
    Generation(#[from] GenerationError),
}
