//! Basic example demonstrating gridshift library usage.
//!
//! Builds a small engine from four OSTN02 nodes and queries it. Pass an
//! engine file to query that instead:
//!
//! Run with: cargo run --example basic -- [/path/to/ostn02.gsb]

use gridshift::{
    GridDataset, GridKey, GridMetadata, IndexConfig, ShiftError, ShiftRecord, ShiftService,
};
use std::env;

fn calibration_service() -> Result<ShiftService, ShiftError> {
    let records = vec![
        (GridKey::new(651, 313), ShiftRecord::new(102.775, -78.244, 44.252)),
        (GridKey::new(652, 313), ShiftRecord::new(102.813, -78.246, 44.236)),
        (GridKey::new(651, 314), ShiftRecord::new(102.783, -78.216, 44.240)),
        (GridKey::new(652, 314), ShiftRecord::new(102.822, -78.227, 44.224)),
    ];
    let dataset = GridDataset::from_records(GridMetadata::ostn02(), records)?;
    ShiftService::from_dataset(dataset, &IndexConfig::default())
}

fn main() -> Result<(), ShiftError> {
    let service = match env::args().nth(1) {
        Some(path) => ShiftService::open(path)?,
        None => calibration_service()?,
    };

    let points = [
        ("Node (651, 313)", 651000.0, 313000.0),
        ("Inside cell", 651307.003, 313255.686),
        ("Outside grid", 800000.0, 313000.0),
    ];

    println!("Shift queries (metres):");
    println!("{:-<60}", "");

    for (name, eastings, northings) in &points {
        match service.get_shifts((*eastings, *northings)) {
            Ok(shift) => {
                println!("{}: {}", name, shift);
            }
            Err(e) if e.is_out_of_domain() => {
                println!("{}: no correction available", name);
            }
            Err(e) => {
                println!("{}: error - {}", name, e);
            }
        }
    }

    // Legacy hex keys address nodes directly
    if let Some(shift) = service.node_shift_hex("13928b") {
        println!("\nNode 13928b: {}", shift);
    }

    let stats = service.stats();
    println!("\nEngine statistics:");
    println!("  Nodes: {}", stats.node_count);
    println!("  Buckets: {}", stats.bucket_count);
    println!("  Seed: {:#018x}", stats.seed);
    println!("  Coverage: {:.4}%", stats.coverage(service.metadata()) * 100.0);

    Ok(())
}
