use anyhow::{Context, Result};
use gridshift::{source, GridMetadata, IndexConfig, ShiftService, SourceFormat};
use std::path::PathBuf;

pub fn run(
    input: PathBuf,
    output: PathBuf,
    format: SourceFormat,
    metadata: GridMetadata,
    scale: u32,
    seed: Option<u64>,
    seed_attempts: u32,
) -> Result<()> {
    let dataset = source::load_dataset(&input, format, metadata, scale)
        .with_context(|| format!("Failed to import {}", input.display()))?;

    let mut config = IndexConfig::default().seed_attempts(seed_attempts);
    if let Some(seed) = seed {
        config = config.seed(seed);
    }

    let service =
        ShiftService::from_dataset(dataset, &config).context("Failed to build perfect hash index")?;
    service
        .save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let stats = service.stats();
    println!("Engine: {}", output.display());
    println!("Nodes: {}", stats.node_count);
    println!("Buckets: {}", stats.bucket_count);
    println!("Seed: {:#018x}", stats.seed);
    println!("File size: {}", super::info::format_size(stats.encoded_len as u64));

    Ok(())
}
