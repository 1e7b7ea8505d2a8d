use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// A known point and the shift expected there.
pub struct CheckPoint {
    pub eastings: f64,
    pub northings: f64,
    pub expected: (f64, f64, f64),
}

pub fn run(data: Option<PathBuf>, check: Option<CheckPoint>, tolerance: f64) -> Result<()> {
    // Loading verifies the checksum and every node placement
    let service = super::load_service(data)?;

    // Every stored node must decode and come back through its own key
    for (key, record) in service.dataset().records() {
        let looked_up = service
            .node_shift(key)
            .with_context(|| format!("Node {key} is not reachable through the index"))?;
        if looked_up != record {
            bail!("Node {key} returned a different record than stored");
        }
    }
    println!("Index: ok ({} nodes)", service.dataset().len());

    if let Some(check) = check {
        let shift = service
            .get_shifts((check.eastings, check.northings))
            .with_context(|| {
                format!(
                    "No shift at check point ({}, {})",
                    check.eastings, check.northings
                )
            })?;

        let (x, y, z) = check.expected;
        let worst = (shift.x_shift - x)
            .abs()
            .max((shift.y_shift - y).abs())
            .max((shift.z_shift - z).abs());

        if worst > tolerance {
            bail!(
                "Check point ({}, {}): expected ({}, {}, {}), got {} (difference {:.6})",
                check.eastings,
                check.northings,
                x,
                y,
                z,
                shift,
                worst
            );
        }
        println!(
            "Check point ({}, {}): ok {}",
            check.eastings, check.northings, shift
        );
    }

    Ok(())
}
