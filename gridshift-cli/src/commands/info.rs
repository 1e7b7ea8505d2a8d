use anyhow::Result;
use std::path::PathBuf;

pub fn run(data: Option<PathBuf>) -> Result<()> {
    let service = super::load_service(data)?;
    let metadata = service.metadata();
    let stats = service.stats();
    let (max_e, max_n) = metadata.max_position();

    if let Some(path) = service.source_path() {
        println!("Engine: {}", path.display());
    }
    println!();
    println!(
        "Grid: {}x{} nodes, cell size {}",
        metadata.columns, metadata.rows, metadata.cell_size
    );
    println!(
        "Coverage: E {}-{}, N {}-{}",
        metadata.origin_eastings, max_e, metadata.origin_northings, max_n
    );
    println!(
        "Nodes: {} ({:.1}% of grid)",
        stats.node_count,
        stats.coverage(metadata) * 100.0
    );
    println!("Scale: {}", stats.scale);
    println!(
        "Node size: {} bytes ({})",
        stats.node_len,
        if service.dataset().is_compact() {
            "compact"
        } else {
            "wide"
        }
    );
    println!();
    println!("Buckets: {}", stats.bucket_count);
    println!("Seed: {:#018x}", stats.seed);
    match stats.checksum {
        Some(checksum) => println!("Key checksum: {:#010x}", checksum),
        None => println!("Key checksum: none"),
    }
    println!("File size: {}", format_size(stats.encoded_len as u64));

    Ok(())
}

pub(crate) fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        // OSTN02 engine: 876,951 nodes of 10 bytes
        assert_eq!(format_size(8_769_510), "8.36 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
