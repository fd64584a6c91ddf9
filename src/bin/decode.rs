//! Standalone decoder binary for scriptveil
//!
//! Minimal binary that decodes a serialized TransformResult (YAML) back to
//! the original plaintext on stdout. Useful when only the metadata file
//! survived, or to sanity-check an artifact without a Lua runtime.
//!
//! Usage:
//!   decode <result.yaml>

use scriptveil::{decode_result, DecodeError, TransformResult};
use std::env;
use std::fs;
use std::process;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: decode <result.yaml>");
        process::exit(1);
    }

    let content = fs::read_to_string(&args[1])
        .map_err(|e| format!("Failed to read result file {}: {}", args[1], e))?;

    // Check the interchange shape up front so a truncated file reports the
    // missing field rather than a generic parse error.
    let value: serde_yaml::Value = serde_yaml::from_str(&content)
        .map_err(|e| format!("Failed to parse result file: {}", e))?;
    for field in ["codeValues", "key", "salt", "iterationCount", "checksums"] {
        if value.get(field).is_none() {
            return Err(Box::new(DecodeError::MissingField(field)));
        }
    }

    let result: TransformResult = serde_yaml::from_value(value)
        .map_err(|e| format!("Failed to parse transform result: {}", e))?;

    let plaintext = decode_result(&result)?;
    print!("{}", plaintext);

    Ok(())
}
