use anyhow::{Context, Result};
use clap::Parser;
use scriptveil::{Assembler, Engine, EngineConfig, StubGenerator};
use std::fs;
use std::path::PathBuf;

/// scriptveil - self-reconstructing Lua obfuscation
///
/// Transforms a Lua source file into a stand-alone loader chunk that decodes
/// and runs the original at load time.
#[derive(Parser)]
#[command(name = "scriptveil")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Lua source file to obfuscate
    input: PathBuf,

    /// Output path (default: <input>.obf.lua)
    output: Option<PathBuf>,

    /// Number of inert decoy helpers emitted alongside the decoder
    #[arg(long, default_value_t = 4)]
    complexity: u32,

    /// How many decode substages get their own named stage function (1-10)
    #[arg(long, default_value_t = 5)]
    depth: u32,

    /// Explicit transform key (0-255; random 100-255 when omitted)
    #[arg(long)]
    key: Option<u8>,

    /// Confusion rounds per byte
    #[arg(long, default_value_t = 3)]
    iterations: u32,

    /// Extend the display alphabet with punctuation symbols
    #[arg(long, default_value_t = false)]
    extended_alphabet: bool,

    /// Also write the serialized TransformResult (YAML) to this path
    #[arg(long)]
    result: Option<PathBuf>,

    /// Print transform details
    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// Emit the artifact on a single line
    #[arg(long, default_value_t = false)]
    minify: bool,
}

fn run(cli: Cli) -> Result<()> {
    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read input file: {:?}", cli.input))?;

    let engine = Engine::new(EngineConfig {
        key: cli.key,
        iteration_count: Some(cli.iterations),
        extended_alphabet: cli.extended_alphabet,
    });
    let assembler = Assembler::new(StubGenerator::new(cli.complexity, cli.depth))
        .minified(cli.minify);

    let (artifact, result) = assembler
        .assemble(&engine, &source)
        .with_context(|| format!("Failed to obfuscate {:?}", cli.input))?;

    if cli.verbose {
        println!("✓ Encoded {} bytes into {} code values", source.len(), result.code_values.len());
        println!("  Key: {}", result.key);
        println!("  Salt: {}", result.salt);
        println!("  Iterations: {}", result.iteration_count);
        println!("  Artifact: {} bytes", artifact.len());
    }

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{}.obf.lua", cli.input.display())));
    fs::write(&output, &artifact)
        .with_context(|| format!("Failed to write output file: {:?}", output))?;
    println!("✓ Obfuscated: {:?}", output);

    if let Some(result_path) = cli.result {
        let yaml = serde_yaml::to_string(&result).context("Failed to serialize transform result")?;
        fs::write(&result_path, yaml)
            .with_context(|| format!("Failed to write result file: {:?}", result_path))?;
        println!("✓ Transform result: {:?}", result_path);
    }

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    run(Cli::parse())
}
