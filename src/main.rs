//! Query generator CLI.
//!
//! Loads a JSON schema document and prints generated queries, one per line.

use std::io::{IsTerminal, Write, stdin, stdout};
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use ppl_gen::{Policy, QueryGen, Schema};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Generate random queries from a schema document.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON schema document.
    #[arg(long)]
    schema: PathBuf,

    /// Source identifier for `source = <name>`. Defaults to the schema file stem.
    #[arg(long)]
    source: Option<String>,

    /// Number of queries to generate.
    #[arg(short = 'n', long, default_value_t = 10)]
    count: usize,

    /// Random seed for deterministic output.
    #[arg(short, long, default_value_t = rand::rng().next_u64())]
    seed: u64,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let mut subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        );

    if !stdin().is_terminal() {
        subscriber = subscriber.with_ansi(false)
    }
    subscriber.init();

    let document = std::fs::read_to_string(&args.schema)
        .with_context(|| format!("failed to read schema {}", args.schema.display()))?;
    let schema = Schema::from_json(&document)
        .with_context(|| format!("failed to load schema {}", args.schema.display()))?;

    let source = match args.source {
        Some(source) => source,
        None => args
            .schema
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .context("schema path has no file name to derive a source from")?,
    };

    let generator = QueryGen::builder()
        .source(source)
        .schema(schema)
        .policy(Policy::default())
        .build()
        .context("invalid generator configuration")?;

    tracing::info!(
        seed = args.seed,
        count = args.count,
        fields = generator.schema().len(),
        "generating queries"
    );

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let mut out = stdout().lock();
    for i in 0..args.count {
        let seed: u64 = rng.random();
        let query = generator
            .generate(seed)
            .with_context(|| format!("query {i} (seed {seed}) failed"))?;
        tracing::debug!(i, seed, segments = query.segments.len(), "generated");
        writeln!(out, "{query}")?;
    }
    out.flush()?;

    Ok(())
}
