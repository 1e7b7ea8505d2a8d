//! Error types for the gridshift library.

use thiserror::Error;

use crate::key::GridKey;

/// Errors that can occur when building, loading, or querying a shift grid.
#[derive(Error, Debug)]
pub enum ShiftError {
    /// IO error when reading or writing files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A dataset was constructed from zero records.
    #[error("Dataset contains no records")]
    EmptyDataset,

    /// Two source records share the same grid cell.
    #[error("Duplicate grid key {key}")]
    DuplicateKey { key: GridKey },

    /// A source record lies beyond the declared columns/rows.
    #[error("Grid key {key} lies outside the declared grid extent")]
    KeyOutsideGrid { key: GridKey },

    /// A shift value is not finite or does not fit the fixed-point encoding.
    #[error("Shift record at {key} cannot be encoded")]
    InvalidRecord { key: GridKey },

    /// Grid metadata is unusable (zero extent, bad cell size, ...).
    #[error("Invalid grid metadata: {reason}")]
    InvalidMetadata { reason: String },

    /// No collision-free displacement was found for the given seed.
    #[error("Perfect hash construction failed for seed {seed:#018x}")]
    ConstructionFailed { seed: u64 },

    /// A persisted index blob failed validation.
    #[error("Corrupt index: {reason}")]
    CorruptIndex { reason: String },

    /// A persisted dataset blob failed validation.
    #[error("Corrupt dataset: {reason}")]
    CorruptDataset { reason: String },

    /// The query point lies outside the interpolatable region.
    #[error("No correction available at eastings={eastings}, northings={northings}")]
    OutOfDomain { eastings: f64, northings: f64 },

    /// A row of a source table could not be imported.
    #[error("Invalid source record at line {line}: {reason}")]
    InvalidSource { line: u64, reason: String },
}

impl ShiftError {
    pub(crate) fn corrupt_index(reason: impl Into<String>) -> Self {
        ShiftError::CorruptIndex {
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt_dataset(reason: impl Into<String>) -> Self {
        ShiftError::CorruptDataset {
            reason: reason.into(),
        }
    }

    /// Returns `true` for the per-query error that callers should read as
    /// "no correction here" rather than a failure of the engine.
    pub fn is_out_of_domain(&self) -> bool {
        matches!(self, ShiftError::OutOfDomain { .. })
    }
}

/// Result type alias using [`ShiftError`].
pub type Result<T> = std::result::Result<T, ShiftError>;
