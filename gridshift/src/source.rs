//! Import of published correction tables.
//!
//! Raw grid-shift models are distributed as plain text tables, often inside
//! a zip archive. This module turns such a table into `(GridKey, ShiftRecord)`
//! pairs ready for [`GridDataset::from_records`].
//!
//! # Formats
//!
//! - [`SourceFormat::Ostn02`]: headerless rows of
//!   `point_id, eastings, northings, x_shift, y_shift, z_shift, flag`.
//!   Rows with flag `0` lie outside the transformation area and are skipped.
//! - [`SourceFormat::Simple`]: a header row
//!   `eastings,northings,x_shift,y_shift,z_shift` followed by data rows.
//!
//! Node coordinates must fall exactly on the grid lattice described by the
//! target [`GridMetadata`].

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::dataset::{GridDataset, GridMetadata, ShiftRecord};
use crate::error::{Result, ShiftError};
use crate::key::GridKey;

/// Layout of a source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceFormat {
    /// Published OSTN02 layout with point id and flag columns.
    #[default]
    Ostn02,
    /// Headed `eastings,northings,x_shift,y_shift,z_shift` table.
    Simple,
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ostn02" => Ok(SourceFormat::Ostn02),
            "simple" | "csv" => Ok(SourceFormat::Simple),
            other => Err(format!("unknown source format: {other}")),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Ostn02 => f.write_str("ostn02"),
            SourceFormat::Simple => f.write_str("simple"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Ostn02Row {
    _point_id: u64,
    eastings: f64,
    northings: f64,
    x_shift: f64,
    y_shift: f64,
    z_shift: f64,
    flag: u8,
}

#[derive(Debug, Deserialize)]
struct SimpleRow {
    eastings: f64,
    northings: f64,
    x_shift: f64,
    y_shift: f64,
    z_shift: f64,
}

fn csv_error(err: csv::Error) -> ShiftError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    ShiftError::InvalidSource {
        line,
        reason: err.to_string(),
    }
}

/// Read node records from a table in `format`.
///
/// # Errors
///
/// Returns [`ShiftError::InvalidSource`] for malformed rows or nodes that do
/// not sit on the `metadata` lattice.
pub fn read_records<R: Read>(
    reader: R,
    format: SourceFormat,
    metadata: &GridMetadata,
) -> Result<Vec<(GridKey, ShiftRecord)>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(format == SourceFormat::Simple)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = match format {
        SourceFormat::Simple => Some(csv_reader.headers().map_err(csv_error)?.clone()),
        SourceFormat::Ostn02 => None,
    };

    let mut records = Vec::new();
    let mut skipped = 0u64;

    for row in csv_reader.records() {
        let row = row.map_err(csv_error)?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        // Deserialization errors carry no position of their own
        let invalid_row = |err: csv::Error| ShiftError::InvalidSource {
            line,
            reason: err.to_string(),
        };

        let (eastings, northings, record) = match format {
            SourceFormat::Ostn02 => {
                let parsed: Ostn02Row = row.deserialize(None).map_err(invalid_row)?;
                if parsed.flag == 0 {
                    skipped += 1;
                    continue;
                }
                (
                    parsed.eastings,
                    parsed.northings,
                    ShiftRecord::new(parsed.x_shift, parsed.y_shift, parsed.z_shift),
                )
            }
            SourceFormat::Simple => {
                let parsed: SimpleRow = row.deserialize(headers.as_ref()).map_err(invalid_row)?;
                (
                    parsed.eastings,
                    parsed.northings,
                    ShiftRecord::new(parsed.x_shift, parsed.y_shift, parsed.z_shift),
                )
            }
        };

        let key = metadata
            .key_at(eastings, northings)
            .ok_or_else(|| ShiftError::InvalidSource {
                line,
                reason: format!("({eastings}, {northings}) is not a node of the grid"),
            })?;
        records.push((key, record));
    }

    tracing::debug!(
        format = %format,
        records = records.len(),
        skipped,
        "Read source table"
    );

    Ok(records)
}

/// Read node records from a file, or from the first `.csv`/`.txt` entry of a
/// `.zip` archive.
pub fn read_path<P: AsRef<Path>>(
    path: P,
    format: SourceFormat,
    metadata: &GridMetadata,
) -> Result<Vec<(GridKey, ShiftRecord)>> {
    let path = path.as_ref();
    let file = File::open(path)?;

    let is_zip = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if !is_zip {
        return read_records(file, format, metadata);
    }

    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ShiftError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

    // Look for the table inside the archive
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|e| {
            ShiftError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        let name = entry.name().to_lowercase();
        if entry.is_file() && (name.ends_with(".csv") || name.ends_with(".txt")) {
            tracing::debug!(
                archive = %path.display(),
                entry = %entry.name(),
                "Reading zipped table"
            );
            return read_records(entry, format, metadata);
        }
    }

    Err(ShiftError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("No .csv or .txt table found in {}", path.display()),
    )))
}

/// Read a source table and build a [`GridDataset`] with the given scale.
pub fn load_dataset<P: AsRef<Path>>(
    path: P,
    format: SourceFormat,
    metadata: GridMetadata,
    scale: u32,
) -> Result<GridDataset> {
    let records = read_path(path, format, &metadata)?;
    GridDataset::with_scale(metadata, scale, records)
}
