//! CLI for Merkle commitments.
//!
//! Computes roots over items, emits inclusion proofs and verifies them.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use merkle_commit_core::{HashAlgorithm, LeafEncoding};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "MERKLE_COMMIT_LOG";

#[derive(Parser)]
#[command(name = "merkle-commit")]
#[command(about = "Binary Merkle tree roots and inclusion proofs", long_about = None)]
#[command(version)]
struct Cli {
    /// Hash algorithm (overrides the config file)
    #[arg(long, short, global = true, value_enum)]
    algorithm: Option<AlgorithmArg>,

    /// How items are turned into leaves (overrides the config file)
    #[arg(long, short, global = true, value_enum)]
    encoding: Option<EncodingArg>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when MERKLE_COMMIT_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the root committing to the given items
    Root {
        /// Items, in order
        items: Vec<String>,

        /// Read items from a file, one per line
        #[arg(long, short)]
        file: Option<PathBuf>,

        /// Print root, depth and leaf count as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print an inclusion proof for one item as JSON
    Prove {
        /// Zero-based position of the item
        #[arg(long, short, allow_negative_numbers = true)]
        index: i64,

        /// Items, in order
        items: Vec<String>,

        /// Read items from a file, one per line
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Verify a proof produced by `prove`; prints true or false
    Verify {
        /// Proof file, or `-` for stdin
        #[arg(long, short)]
        proof: String,

        /// Check against this root instead of the one in the proof
        #[arg(long)]
        root: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AlgorithmArg {
    Keccak256,
    Sha256,
}

impl From<AlgorithmArg> for HashAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Keccak256 => HashAlgorithm::Keccak256,
            AlgorithmArg::Sha256 => HashAlgorithm::Sha256,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EncodingArg {
    /// Hash the UTF-8 bytes of each item
    Utf8,
    /// Hex-decode each item before hashing
    Hex,
    /// Items are leaf hashes already
    Prehashed,
}

impl From<EncodingArg> for LeafEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Utf8 => LeafEncoding::Utf8,
            EncodingArg::Hex => LeafEncoding::Hex,
            EncodingArg::Prehashed => LeafEncoding::Prehashed,
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = commands::load_config(
        cli.config.as_deref(),
        cli.algorithm.map(Into::into),
        cli.encoding.map(Into::into),
    )?;

    match cli.command {
        Commands::Root { items, file, json } => {
            println!("{}", commands::root(&config, &items, file.as_deref(), json)?);
        }
        Commands::Prove { index, items, file } => {
            println!("{}", commands::prove(&config, index, &items, file.as_deref())?);
        }
        Commands::Verify { proof, root } => {
            let valid = commands::verify(&config, &proof, root.as_deref())?;
            println!("{}", if valid { "true" } else { "false" });
        }
    }

    Ok(())
}
