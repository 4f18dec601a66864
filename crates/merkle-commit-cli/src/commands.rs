//! Command implementations. Each returns the text to print.

use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use merkle_commit_core::merkle::{verify_proof_with, ProofExport};
use merkle_commit_core::{
    build_tree, CommitConfig, Hash, HashAlgorithm, LeafEncoding, MerkleError, MerkleTree,
    VerifyMode,
};
use tracing::{debug, info};

/// Defaults, then the config file, then command-line overrides.
pub fn load_config(
    path: Option<&Path>,
    algorithm: Option<HashAlgorithm>,
    encoding: Option<LeafEncoding>,
) -> Result<CommitConfig> {
    let mut config = match path {
        Some(path) => CommitConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CommitConfig::default(),
    };

    if let Some(algorithm) = algorithm {
        config.algorithm = algorithm;
    }
    if let Some(encoding) = encoding {
        config.leaf_encoding = encoding;
    }

    debug!(?config, "resolved configuration");
    Ok(config)
}

fn collect_items(items: &[String], file: Option<&Path>) -> Result<Vec<String>> {
    match file {
        Some(_) if !items.is_empty() => bail!("pass items either inline or with --file, not both"),
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read items from {}", path.display()))?;
            Ok(contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect())
        }
        None => Ok(items.to_vec()),
    }
}

fn build(config: &CommitConfig, items: &[String], file: Option<&Path>) -> Result<MerkleTree> {
    let items = collect_items(items, file)?;
    let hasher = config.hasher();
    let leaves = config
        .leaf_encoding
        .to_leaves(&hasher, &items)
        .context("failed to derive leaves")?;
    let tree = build_tree(&hasher, &leaves)?;
    info!(leaf_count = tree.leaf_count(), root = %tree.root(), "committed items");
    Ok(tree)
}

pub fn root(config: &CommitConfig, items: &[String], file: Option<&Path>, json: bool) -> Result<String> {
    let tree = build(config, items, file)?;
    if json {
        Ok(serde_json::to_string_pretty(&tree.stats())?)
    } else {
        Ok(tree.root().to_hex())
    }
}

pub fn prove(config: &CommitConfig, index: i64, items: &[String], file: Option<&Path>) -> Result<String> {
    let tree = build(config, items, file)?;
    let index = usize::try_from(index).map_err(|_| MerkleError::IndexOutOfRange {
        index,
        leaf_count: tree.leaf_count(),
    })?;

    let proof = tree.inclusion_proof(index)?;
    let export = ProofExport::new(&proof, config.hasher().name());
    Ok(export.to_json()?)
}

fn read_source(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read proof from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("failed to read proof {}", source))
    }
}

pub fn verify(config: &CommitConfig, source: &str, root: Option<&str>) -> Result<bool> {
    let export = ProofExport::from_json(&read_source(source)?).context("invalid proof document")?;

    // The proof names its own algorithm; it wins over the configured one
    let algorithm: HashAlgorithm = export.algorithm.parse()?;
    if algorithm != config.algorithm {
        debug!(%algorithm, configured = %config.algorithm, "using algorithm recorded in proof");
    }
    let hasher = algorithm.hasher();

    let bundle = export.into_inclusion_proof();
    let root = match root {
        Some(text) => text.parse::<Hash>()?,
        None => bundle.root_hash,
    };

    let valid = match config.verify_mode {
        VerifyMode::Strict => bundle.verify_against(&hasher, &root)?,
        VerifyMode::Lenient => verify_proof_with(
            &hasher,
            &bundle.leaf_hash,
            bundle.leaf_index,
            &bundle.proof,
            &root,
            VerifyMode::Lenient,
        )?,
    };

    info!(leaf_index = bundle.leaf_index, valid, "verified proof");
    Ok(valid)
}
