//! Bilinear interpolation of node shifts.
//!
//! A query point is converted to continuous cell space, the enclosing cell is
//! located with `floor`, and the four corner shifts are blended by the
//! point's fractional offsets. Points whose cell would need a node beyond the
//! grid extent are rejected rather than extrapolated.

use crate::dataset::{GridDataset, GridMetadata, ShiftRecord};
use crate::error::{Result, ShiftError};
use crate::key::GridKey;
use crate::phf::PerfectHashIndex;

/// A caller-supplied position in the grid's native units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryPoint {
    pub eastings: f64,
    pub northings: f64,
}

impl QueryPoint {
    pub const fn new(eastings: f64, northings: f64) -> Self {
        Self {
            eastings,
            northings,
        }
    }

    fn out_of_domain(&self) -> ShiftError {
        ShiftError::OutOfDomain {
            eastings: self.eastings,
            northings: self.northings,
        }
    }
}

impl From<(f64, f64)> for QueryPoint {
    fn from((eastings, northings): (f64, f64)) -> Self {
        Self::new(eastings, northings)
    }
}

impl From<(u32, u32)> for QueryPoint {
    fn from((eastings, northings): (u32, u32)) -> Self {
        Self::new(eastings as f64, northings as f64)
    }
}

impl From<(i32, i32)> for QueryPoint {
    fn from((eastings, northings): (i32, i32)) -> Self {
        Self::new(eastings as f64, northings as f64)
    }
}

/// Position of a query point within its enclosing cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellPosition {
    /// Key of the lower-left corner node.
    pub origin: GridKey,
    /// Fractional offset along the column axis, in `[0, 1)`.
    pub tx: f64,
    /// Fractional offset along the row axis, in `[0, 1)`.
    pub ty: f64,
}

impl CellPosition {
    /// Corner keys in the order (col,row), (col+1,row), (col,row+1), (col+1,row+1).
    pub fn corners(&self) -> [GridKey; 4] {
        let GridKey { column, row } = self.origin;
        [
            GridKey::new(column, row),
            GridKey::new(column + 1, row),
            GridKey::new(column, row + 1),
            GridKey::new(column + 1, row + 1),
        ]
    }
}

/// Locate the cell enclosing `point`.
///
/// # Errors
///
/// Returns [`ShiftError::OutOfDomain`] if a coordinate is not finite or the
/// cell's upper corners would fall beyond the last column or row.
pub fn locate(point: QueryPoint, metadata: &GridMetadata) -> Result<CellPosition> {
    let cx = (point.eastings - metadata.origin_eastings) / metadata.cell_size;
    let cy = (point.northings - metadata.origin_northings) / metadata.cell_size;
    if !cx.is_finite() || !cy.is_finite() {
        return Err(point.out_of_domain());
    }

    let col = cx.floor();
    let row = cy.floor();

    // All four surrounding nodes must exist
    if col < 0.0
        || row < 0.0
        || col >= (metadata.columns - 1) as f64
        || row >= (metadata.rows - 1) as f64
    {
        return Err(point.out_of_domain());
    }

    Ok(CellPosition {
        origin: GridKey::new(col as u16, row as u16),
        tx: cx - col,
        ty: cy - row,
    })
}

/// Blend four corner records by the fractional offsets `tx`, `ty`.
///
/// Corners are ordered as in [`CellPosition::corners`].
pub fn bilinear(corners: &[ShiftRecord; 4], tx: f64, ty: f64) -> ShiftRecord {
    let [v00, v10, v01, v11] = corners;
    let w00 = (1.0 - tx) * (1.0 - ty);
    let w10 = tx * (1.0 - ty);
    let w01 = (1.0 - tx) * ty;
    let w11 = tx * ty;

    let blend = |a: f64, b: f64, c: f64, d: f64| a * w00 + b * w10 + c * w01 + d * w11;

    ShiftRecord {
        x_shift: blend(v00.x_shift, v10.x_shift, v01.x_shift, v11.x_shift),
        y_shift: blend(v00.y_shift, v10.y_shift, v01.y_shift, v11.y_shift),
        z_shift: blend(v00.z_shift, v10.z_shift, v01.z_shift, v11.z_shift),
    }
}

/// Shift of the single node at `key`.
///
/// # Errors
///
/// Returns [`ShiftError::OutOfDomain`] if the grid has no node at `key`.
pub fn node_shift(
    key: GridKey,
    dataset: &GridDataset,
    index: &PerfectHashIndex,
) -> Result<ShiftRecord> {
    dataset.fetch(key, index.lookup(key))
}

/// Interpolated shift at `point`.
///
/// `dataset` must have been arranged by `index`.
///
/// # Errors
///
/// Returns [`ShiftError::OutOfDomain`] if the point lies outside the
/// interpolatable region or any of the four corner nodes is missing.
pub fn interpolate(
    point: QueryPoint,
    dataset: &GridDataset,
    index: &PerfectHashIndex,
) -> Result<ShiftRecord> {
    let cell = locate(point, dataset.metadata())?;

    let [k00, k10, k01, k11] = cell.corners();
    let fetch = |key: GridKey| node_shift(key, dataset, index).map_err(|_| point.out_of_domain());
    let corners = [fetch(k00)?, fetch(k10)?, fetch(k01)?, fetch(k11)?];

    Ok(bilinear(&corners, cell.tx, cell.ty))
}
