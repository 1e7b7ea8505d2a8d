pub mod build;
pub mod info;
pub mod query;
pub mod verify;

use anyhow::{Context, Result};
use gridshift::{ShiftService, ShiftServiceBuilder};
use std::path::PathBuf;

/// Load the engine named by `--data`, falling back to `GRIDSHIFT_DATA`.
pub(crate) fn load_service(data: Option<PathBuf>) -> Result<ShiftService> {
    let builder = match data {
        Some(path) => ShiftServiceBuilder::new(path),
        None => ShiftServiceBuilder::from_env()
            .context("GRIDSHIFT_DATA environment variable not set. Use --data or set GRIDSHIFT_DATA")?,
    };

    builder.build().context("Failed to load engine file")
}
