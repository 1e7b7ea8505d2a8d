//! Correction grid storage.
//!
//! This module provides [`GridDataset`], the immutable table of per-node
//! shift values, together with its metadata and its persisted layout.
//!
//! # Binary Layout
//!
//! All fields are little-endian.
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | magic `GSDS` |
//! | 4 | 2 | version |
//! | 6 | 2 | flags (bit 0: compact nodes) |
//! | 8 | 8 | origin eastings (`f64`) |
//! | 16 | 8 | origin northings (`f64`) |
//! | 24 | 8 | cell size (`f64`) |
//! | 32 | 4 | columns |
//! | 36 | 4 | rows |
//! | 40 | 4 | scale |
//! | 44 | 4 | node count |
//! | 48 | 4 | minimum x (`i32`) |
//! | 52 | 4 | minimum y (`i32`) |
//! | 56 | 4 | minimum z (`i32`) |
//! | 60 | 4 | reserved (0) |
//!
//! followed by `node count` records: packed key (`u32`) and the three
//! fixed-point components stored as unsigned offsets from the minimums.
//! Offsets are `u16` (10-byte records) when every component's range fits,
//! otherwise `u32` (16-byte records). The OSTN02 grid spans well under 65 m
//! per component at millimetre scale, so it always takes the compact form.
//!
//! Once a dataset has been arranged by a [`PerfectHashIndex`], record `i` is
//! the node for slot `i`.

use std::fmt;
use std::io::Write;
use std::ops::Deref;
use std::sync::Arc;

use memmap2::Mmap;

use crate::error::{Result, ShiftError};
use crate::key::GridKey;
use crate::layout::{u16_at, u32_at, Reader};
use crate::phf::PerfectHashIndex;

/// Default fixed-point scale: shift values are stored in thousandths (millimetres).
pub const DEFAULT_SCALE: u32 = 1000;

const DATASET_MAGIC: &[u8; 4] = b"GSDS";
const DATASET_VERSION: u16 = 2;

const FLAG_COMPACT: u16 = 1;

/// Size of the dataset header in bytes.
pub const DATASET_HEADER_LEN: usize = 64;

/// How the three shift offsets of a node are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeEncoding {
    /// key + 3 × u16
    Compact,
    /// key + 3 × u32
    Wide,
}

impl NodeEncoding {
    /// Narrowest encoding that holds every offset in `ranges`.
    fn for_ranges(ranges: [u32; 3]) -> Self {
        if ranges.iter().all(|&range| range <= u16::MAX as u32) {
            NodeEncoding::Compact
        } else {
            NodeEncoding::Wide
        }
    }

    fn from_flags(flags: u16) -> Self {
        if flags & FLAG_COMPACT != 0 {
            NodeEncoding::Compact
        } else {
            NodeEncoding::Wide
        }
    }

    fn flags(self) -> u16 {
        match self {
            NodeEncoding::Compact => FLAG_COMPACT,
            NodeEncoding::Wide => 0,
        }
    }

    const fn node_len(self) -> usize {
        match self {
            NodeEncoding::Compact => 10,
            NodeEncoding::Wide => 16,
        }
    }

    fn push(self, bytes: &mut Vec<u8>, offset: u32) {
        match self {
            NodeEncoding::Compact => bytes.extend_from_slice(&(offset as u16).to_le_bytes()),
            NodeEncoding::Wide => bytes.extend_from_slice(&offset.to_le_bytes()),
        }
    }

    #[inline]
    fn offset_at(self, bytes: &[u8], node: usize, component: usize) -> u32 {
        match self {
            NodeEncoding::Compact => u16_at(bytes, node + 4 + component * 2) as u32,
            NodeEncoding::Wide => u32_at(bytes, node + 4 + component * 4),
        }
    }
}

/// Largest number of columns or rows addressable by a [`GridKey`].
pub const MAX_EXTENT: u32 = u16::MAX as u32 + 1;

/// Correction vector at one grid node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftRecord {
    /// Eastings shift.
    pub x_shift: f64,
    /// Northings shift.
    pub y_shift: f64,
    /// Height shift.
    pub z_shift: f64,
}

impl ShiftRecord {
    /// Create a record from its three components.
    pub const fn new(x_shift: f64, y_shift: f64, z_shift: f64) -> Self {
        Self {
            x_shift,
            y_shift,
            z_shift,
        }
    }

    /// Components as a tuple.
    pub fn as_tuple(&self) -> (f64, f64, f64) {
        (self.x_shift, self.y_shift, self.z_shift)
    }
}

impl From<(f64, f64, f64)> for ShiftRecord {
    fn from((x_shift, y_shift, z_shift): (f64, f64, f64)) -> Self {
        Self::new(x_shift, y_shift, z_shift)
    }
}

impl From<ShiftRecord> for (f64, f64, f64) {
    fn from(record: ShiftRecord) -> Self {
        record.as_tuple()
    }
}

impl fmt::Display for ShiftRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x_shift, self.y_shift, self.z_shift)
    }
}

/// Placement and extent of a correction grid.
///
/// Node `(column, row)` sits at
/// `(origin_eastings + column * cell_size, origin_northings + row * cell_size)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMetadata {
    /// Eastings of node (0, 0).
    pub origin_eastings: f64,
    /// Northings of node (0, 0).
    pub origin_northings: f64,
    /// Node spacing, identical along both axes.
    pub cell_size: f64,
    /// Number of node columns.
    pub columns: u32,
    /// Number of node rows.
    pub rows: u32,
}

impl GridMetadata {
    /// Create validated metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ShiftError::InvalidMetadata`] if the origin is not finite, the
    /// cell size is not a positive finite number, or either extent is zero or
    /// larger than [`MAX_EXTENT`].
    pub fn new(
        origin_eastings: f64,
        origin_northings: f64,
        cell_size: f64,
        columns: u32,
        rows: u32,
    ) -> Result<Self> {
        let metadata = Self {
            origin_eastings,
            origin_northings,
            cell_size,
            columns,
            rows,
        };
        metadata.validate()?;
        Ok(metadata)
    }

    /// The OSTN02 national grid: 1 km nodes covering 0–700 km E, 0–1250 km N.
    pub const fn ostn02() -> Self {
        Self {
            origin_eastings: 0.0,
            origin_northings: 0.0,
            cell_size: 1000.0,
            columns: 701,
            rows: 1251,
        }
    }

    /// Check the invariants listed on [`GridMetadata::new`].
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(ShiftError::InvalidMetadata {
                reason: reason.to_string(),
            })
        };

        if !self.origin_eastings.is_finite() || !self.origin_northings.is_finite() {
            return invalid("origin must be finite");
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return invalid("cell size must be a positive finite number");
        }
        if self.columns == 0 || self.rows == 0 {
            return invalid("grid must have at least one column and one row");
        }
        if self.columns > MAX_EXTENT || self.rows > MAX_EXTENT {
            return invalid("grid extent exceeds 65536 columns or rows");
        }
        Ok(())
    }

    /// Whether `key` addresses a node inside the declared extent.
    pub fn contains(&self, key: GridKey) -> bool {
        (key.column as u32) < self.columns && (key.row as u32) < self.rows
    }

    /// Coordinates of the node at `key`.
    pub fn node_position(&self, key: GridKey) -> (f64, f64) {
        (
            self.origin_eastings + key.column as f64 * self.cell_size,
            self.origin_northings + key.row as f64 * self.cell_size,
        )
    }

    /// Key of the node sitting exactly at `(eastings, northings)`.
    ///
    /// Returns `None` if the position is off the node lattice or outside the
    /// declared extent.
    pub fn key_at(&self, eastings: f64, northings: f64) -> Option<GridKey> {
        let column = lattice_index(eastings - self.origin_eastings, self.cell_size)?;
        let row = lattice_index(northings - self.origin_northings, self.cell_size)?;
        if column >= self.columns as u64 || row >= self.rows as u64 {
            return None;
        }
        Some(GridKey::new(column as u16, row as u16))
    }

    /// Eastings/northings of the last node column and row.
    pub fn max_position(&self) -> (f64, f64) {
        (
            self.origin_eastings + (self.columns - 1) as f64 * self.cell_size,
            self.origin_northings + (self.rows - 1) as f64 * self.cell_size,
        )
    }

    /// Total number of node positions in the declared extent.
    pub fn capacity(&self) -> u64 {
        self.columns as u64 * self.rows as u64
    }
}

/// Index of `offset` on a lattice of spacing `cell_size`, if it lies on one.
fn lattice_index(offset: f64, cell_size: f64) -> Option<u64> {
    let index = offset / cell_size;
    if !index.is_finite() || index < 0.0 || index.fract() != 0.0 {
        return None;
    }
    Some(index as u64)
}

/// Backing bytes of the node table.
enum NodeBytes {
    Owned(Vec<u8>),
    /// A region of a memory-mapped engine file.
    Mapped {
        map: Arc<Mmap>,
        start: usize,
        len: usize,
    },
}

impl Deref for NodeBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            NodeBytes::Owned(bytes) => bytes,
            NodeBytes::Mapped { map, start, len } => &map[*start..*start + *len],
        }
    }
}

/// Immutable table of grid node shifts.
///
/// Shift components are held as `i32` fixed-point values and decoded as
/// `value / scale`, so a source value with at most `log10(scale)` decimal
/// places comes back as exactly the `f64` its text parses to. Each node stores
/// its values as offsets from the dataset-wide minimum of that component, in
/// two bytes when the spread allows it.
///
/// A freshly built dataset keeps its nodes in key order. Lookups by slot
/// ([`GridDataset::fetch`]) require the dataset to have been arranged by the
/// same [`PerfectHashIndex`] that produces the slots.
///
/// # Example
///
/// ```
/// use gridshift::{GridDataset, GridKey, GridMetadata, ShiftRecord};
///
/// let metadata = GridMetadata::new(0.0, 0.0, 1.0, 701, 1251)?;
/// let dataset = GridDataset::from_records(
///     metadata,
///     vec![(GridKey::new(651, 313), ShiftRecord::new(102.775, -78.244, 44.252))],
/// )?;
/// assert_eq!(dataset.len(), 1);
/// # Ok::<(), gridshift::ShiftError>(())
/// ```
pub struct GridDataset {
    metadata: GridMetadata,
    scale: u32,
    minimum: [i32; 3],
    encoding: NodeEncoding,
    node_count: usize,
    nodes: NodeBytes,
}

impl GridDataset {
    /// Build a dataset from `(key, record)` pairs using [`DEFAULT_SCALE`].
    ///
    /// # Errors
    ///
    /// - [`ShiftError::EmptyDataset`] if `records` is empty
    /// - [`ShiftError::DuplicateKey`] if two records share a key
    /// - [`ShiftError::KeyOutsideGrid`] if a key lies beyond the metadata extent
    /// - [`ShiftError::InvalidRecord`] if a value cannot be encoded
    pub fn from_records<I>(metadata: GridMetadata, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (GridKey, ShiftRecord)>,
    {
        Self::with_scale(metadata, DEFAULT_SCALE, records)
    }

    /// Build a dataset with an explicit fixed-point scale.
    pub fn with_scale<I>(metadata: GridMetadata, scale: u32, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (GridKey, ShiftRecord)>,
    {
        metadata.validate()?;
        if scale == 0 {
            return Err(ShiftError::InvalidMetadata {
                reason: "scale must be non-zero".to_string(),
            });
        }

        let mut nodes: Vec<(u32, [i32; 3])> = Vec::new();
        for (key, record) in records {
            if !metadata.contains(key) {
                return Err(ShiftError::KeyOutsideGrid { key });
            }
            let values = encode(record, scale).ok_or(ShiftError::InvalidRecord { key })?;
            nodes.push((key.packed(), values));
        }

        if nodes.is_empty() {
            return Err(ShiftError::EmptyDataset);
        }

        nodes.sort_unstable_by_key(|&(packed, _)| packed);
        if let Some(pair) = nodes.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(ShiftError::DuplicateKey {
                key: GridKey::from_packed(pair[0].0),
            });
        }

        let mut minimum = [i32::MAX; 3];
        let mut maximum = [i32::MIN; 3];
        for (_, values) in &nodes {
            for i in 0..3 {
                minimum[i] = minimum[i].min(values[i]);
                maximum[i] = maximum[i].max(values[i]);
            }
        }
        let ranges = [0, 1, 2].map(|i| maximum[i].abs_diff(minimum[i]));
        let encoding = NodeEncoding::for_ranges(ranges);

        let mut bytes = Vec::with_capacity(nodes.len() * encoding.node_len());
        for (packed, values) in &nodes {
            bytes.extend_from_slice(&packed.to_le_bytes());
            for i in 0..3 {
                encoding.push(&mut bytes, values[i].abs_diff(minimum[i]));
            }
        }

        Ok(Self {
            metadata,
            scale,
            minimum,
            encoding,
            node_count: nodes.len(),
            nodes: NodeBytes::Owned(bytes),
        })
    }

    /// Grid metadata.
    pub fn metadata(&self) -> &GridMetadata {
        &self.metadata
    }

    /// Fixed-point scale of the stored values.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Smallest stored value of each component.
    pub fn minimum(&self) -> ShiftRecord {
        let scale = self.scale as f64;
        ShiftRecord {
            x_shift: self.minimum[0] as f64 / scale,
            y_shift: self.minimum[1] as f64 / scale,
            z_shift: self.minimum[2] as f64 / scale,
        }
    }

    /// Whether nodes use the two-byte offset encoding.
    pub fn is_compact(&self) -> bool {
        self.encoding == NodeEncoding::Compact
    }

    /// Size of one persisted node in bytes.
    pub fn node_len(&self) -> usize {
        self.encoding.node_len()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.node_count
    }

    /// Whether the dataset holds no nodes. Never true for a constructed dataset.
    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    /// Node keys in storage order.
    pub fn keys(&self) -> impl Iterator<Item = GridKey> + '_ {
        (0..self.node_count).map(move |slot| GridKey::from_packed(self.key_at_slot(slot)))
    }

    /// All nodes in storage order.
    pub fn records(&self) -> impl Iterator<Item = (GridKey, ShiftRecord)> + '_ {
        (0..self.node_count).map(move |slot| self.node_at(slot))
    }

    /// Node stored at `slot`, if the slot exists.
    pub fn node(&self, slot: usize) -> Option<(GridKey, ShiftRecord)> {
        (slot < self.node_count).then(|| self.node_at(slot))
    }

    /// Fetch the shift for `key`, which the index mapped to `slot`.
    ///
    /// # Errors
    ///
    /// Returns [`ShiftError::OutOfDomain`] if the key lies outside the
    /// declared extent or the node in `slot` belongs to a different key
    /// (the grid has no node at that cell).
    pub fn fetch(&self, key: GridKey, slot: usize) -> Result<ShiftRecord> {
        if !self.metadata.contains(key) || slot >= self.node_count {
            return Err(self.out_of_domain(key));
        }
        if self.key_at_slot(slot) != key.packed() {
            return Err(self.out_of_domain(key));
        }
        Ok(self.record_at(slot))
    }

    /// Reorder the nodes so that each one lives in the slot `index` assigns it.
    ///
    /// # Errors
    ///
    /// Returns [`ShiftError::ConstructionFailed`] if the index slot count
    /// differs from the node count or two nodes map to the same slot.
    pub fn arrange(self, index: &PerfectHashIndex) -> Result<Self> {
        let failed = ShiftError::ConstructionFailed { seed: index.seed() };
        if index.slot_count() != self.node_count {
            return Err(failed);
        }

        let node_len = self.node_len();
        let mut arranged = vec![0u8; self.node_count * node_len];
        let mut filled = vec![false; self.node_count];
        for from in 0..self.node_count {
            let key = GridKey::from_packed(self.key_at_slot(from));
            let to = index.lookup(key);
            if filled[to] {
                return Err(failed);
            }
            filled[to] = true;
            arranged[to * node_len..(to + 1) * node_len]
                .copy_from_slice(&self.nodes[from * node_len..(from + 1) * node_len]);
        }

        Ok(Self {
            nodes: NodeBytes::Owned(arranged),
            ..self
        })
    }

    /// Serialized length in bytes.
    pub fn encoded_len(&self) -> usize {
        DATASET_HEADER_LEN + self.node_count * self.node_len()
    }

    /// Write the header and node table.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut header = Vec::with_capacity(DATASET_HEADER_LEN);
        header.extend_from_slice(DATASET_MAGIC);
        header.extend_from_slice(&DATASET_VERSION.to_le_bytes());
        header.extend_from_slice(&self.encoding.flags().to_le_bytes());
        header.extend_from_slice(&self.metadata.origin_eastings.to_le_bytes());
        header.extend_from_slice(&self.metadata.origin_northings.to_le_bytes());
        header.extend_from_slice(&self.metadata.cell_size.to_le_bytes());
        header.extend_from_slice(&self.metadata.columns.to_le_bytes());
        header.extend_from_slice(&self.metadata.rows.to_le_bytes());
        header.extend_from_slice(&self.scale.to_le_bytes());
        header.extend_from_slice(&(self.node_count as u32).to_le_bytes());
        for value in self.minimum {
            header.extend_from_slice(&value.to_le_bytes());
        }
        header.extend_from_slice(&0u32.to_le_bytes());

        writer.write_all(&header)?;
        writer.write_all(&self.nodes)?;
        Ok(())
    }

    /// Serialize to a new buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        // Writing into a Vec cannot fail
        let _ = self.write_to(&mut bytes);
        bytes
    }

    /// Parse a dataset blob, copying the node table.
    ///
    /// # Errors
    ///
    /// Returns [`ShiftError::CorruptDataset`] if the magic or version is
    /// wrong, unknown flags are set, the metadata is invalid, or the length
    /// disagrees with the header's node count.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = DatasetHeader::parse(bytes)?;
        Ok(Self {
            metadata: header.metadata,
            scale: header.scale,
            minimum: header.minimum,
            encoding: header.encoding,
            node_count: header.node_count,
            nodes: NodeBytes::Owned(bytes[DATASET_HEADER_LEN..].to_vec()),
        })
    }

    /// Parse a dataset blob occupying `map[start..]` without copying it.
    pub(crate) fn from_mapped(map: Arc<Mmap>, start: usize) -> Result<Self> {
        let bytes = map
            .get(start..)
            .ok_or_else(|| ShiftError::corrupt_dataset("dataset section missing"))?;
        let header = DatasetHeader::parse(bytes)?;
        let len = header.node_count * header.encoding.node_len();

        Ok(Self {
            metadata: header.metadata,
            scale: header.scale,
            minimum: header.minimum,
            encoding: header.encoding,
            node_count: header.node_count,
            nodes: NodeBytes::Mapped {
                map,
                start: start + DATASET_HEADER_LEN,
                len,
            },
        })
    }

    #[inline]
    fn key_at_slot(&self, slot: usize) -> u32 {
        u32_at(&self.nodes, slot * self.node_len())
    }

    #[inline]
    fn record_at(&self, slot: usize) -> ShiftRecord {
        let node = slot * self.node_len();
        let scale = self.scale as f64;
        let component = |i: usize| {
            let offset = self.encoding.offset_at(&self.nodes, node, i);
            (self.minimum[i] as i64 + offset as i64) as f64 / scale
        };
        ShiftRecord {
            x_shift: component(0),
            y_shift: component(1),
            z_shift: component(2),
        }
    }

    fn node_at(&self, slot: usize) -> (GridKey, ShiftRecord) {
        (
            GridKey::from_packed(self.key_at_slot(slot)),
            self.record_at(slot),
        )
    }

    fn out_of_domain(&self, key: GridKey) -> ShiftError {
        let (eastings, northings) = self.metadata.node_position(key);
        ShiftError::OutOfDomain {
            eastings,
            northings,
        }
    }
}

impl fmt::Debug for GridDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridDataset")
            .field("metadata", &self.metadata)
            .field("scale", &self.scale)
            .field("node_count", &self.node_count)
            .field("compact", &self.is_compact())
            .field("mapped", &matches!(self.nodes, NodeBytes::Mapped { .. }))
            .finish()
    }
}

/// Fixed-point encoding of one record, or `None` if a component is not finite
/// or overflows `i32`.
fn encode(record: ShiftRecord, scale: u32) -> Option<[i32; 3]> {
    let component = |value: f64| {
        let scaled = (value * scale as f64).round();
        if scaled.is_finite() && scaled >= i32::MIN as f64 && scaled <= i32::MAX as f64 {
            Some(scaled as i32)
        } else {
            None
        }
    };

    Some([
        component(record.x_shift)?,
        component(record.y_shift)?,
        component(record.z_shift)?,
    ])
}

struct DatasetHeader {
    metadata: GridMetadata,
    scale: u32,
    minimum: [i32; 3],
    encoding: NodeEncoding,
    node_count: usize,
}

impl DatasetHeader {
    fn parse(bytes: &[u8]) -> Result<Self> {
        let truncated = || ShiftError::corrupt_dataset("truncated header");
        let mut reader = Reader::new(bytes);

        if reader.take(4).ok_or_else(truncated)? != DATASET_MAGIC {
            return Err(ShiftError::corrupt_dataset("bad magic"));
        }
        let version = reader.u16().ok_or_else(truncated)?;
        if version != DATASET_VERSION {
            return Err(ShiftError::corrupt_dataset(format!(
                "unsupported version {version}"
            )));
        }
        let flags = reader.u16().ok_or_else(truncated)?;
        if flags & !FLAG_COMPACT != 0 {
            return Err(ShiftError::corrupt_dataset(format!(
                "unknown flags {flags:#06x}"
            )));
        }
        let encoding = NodeEncoding::from_flags(flags);

        let metadata = GridMetadata {
            origin_eastings: reader.f64().ok_or_else(truncated)?,
            origin_northings: reader.f64().ok_or_else(truncated)?,
            cell_size: reader.f64().ok_or_else(truncated)?,
            columns: reader.u32().ok_or_else(truncated)?,
            rows: reader.u32().ok_or_else(truncated)?,
        };
        metadata
            .validate()
            .map_err(|e| ShiftError::corrupt_dataset(e.to_string()))?;

        let scale = reader.u32().ok_or_else(truncated)?;
        if scale == 0 {
            return Err(ShiftError::corrupt_dataset("zero scale"));
        }
        let node_count = reader.u32().ok_or_else(truncated)? as usize;
        if node_count == 0 {
            return Err(ShiftError::corrupt_dataset("no nodes"));
        }
        if node_count as u64 > metadata.capacity() {
            return Err(ShiftError::corrupt_dataset(
                "node count exceeds grid capacity",
            ));
        }

        let mut minimum = [0i32; 3];
        for value in &mut minimum {
            *value = reader.u32().ok_or_else(truncated)? as i32;
        }
        let _reserved = reader.u32().ok_or_else(truncated)?;

        let expected = DATASET_HEADER_LEN + node_count * encoding.node_len();
        if bytes.len() != expected {
            return Err(ShiftError::corrupt_dataset(format!(
                "expected {expected} bytes for {node_count} nodes, found {}",
                bytes.len()
            )));
        }

        Ok(Self {
            metadata,
            scale,
            minimum,
            encoding,
            node_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn km_grid() -> GridMetadata {
        GridMetadata::new(0.0, 0.0, 1.0, 701, 1251).unwrap()
    }

    /// The four nodes around (651, 313) from the published OSTN02 grid.
    fn ostn02_sample() -> Vec<(GridKey, ShiftRecord)> {
        vec![
            (GridKey::new(651, 313), ShiftRecord::new(102.775, -78.244, 44.252)),
            (GridKey::new(652, 313), ShiftRecord::new(102.813, -78.246, 44.236)),
            (GridKey::new(651, 314), ShiftRecord::new(102.783, -78.216, 44.240)),
            (GridKey::new(652, 314), ShiftRecord::new(102.822, -78.227, 44.224)),
        ]
    }

    #[test]
    fn test_metadata_validation() {
        assert!(GridMetadata::new(0.0, 0.0, 1000.0, 701, 1251).is_ok());
        assert!(GridMetadata::ostn02().validate().is_ok());

        for (cell_size, columns, rows) in [
            (0.0, 10, 10),
            (-1.0, 10, 10),
            (f64::NAN, 10, 10),
            (1.0, 0, 10),
            (1.0, 10, 0),
            (1.0, MAX_EXTENT + 1, 10),
        ] {
            let result = GridMetadata::new(0.0, 0.0, cell_size, columns, rows);
            assert!(
                matches!(result, Err(ShiftError::InvalidMetadata { .. })),
                "expected InvalidMetadata for ({cell_size}, {columns}, {rows})"
            );
        }
        assert!(GridMetadata::new(f64::INFINITY, 0.0, 1.0, 1, 1).is_err());
    }

    #[test]
    fn test_metadata_key_at() {
        let metadata = GridMetadata::ostn02();
        assert_eq!(
            metadata.key_at(651000.0, 313000.0),
            Some(GridKey::new(651, 313))
        );
        assert_eq!(metadata.key_at(0.0, 0.0), Some(GridKey::new(0, 0)));
        assert_eq!(metadata.key_at(700000.0, 1250000.0), Some(GridKey::new(700, 1250)));

        // Off the lattice
        assert_eq!(metadata.key_at(651500.0, 313000.0), None);
        // Outside the extent
        assert_eq!(metadata.key_at(701000.0, 0.0), None);
        assert_eq!(metadata.key_at(-1000.0, 0.0), None);
    }

    #[test]
    fn test_metadata_positions() {
        let metadata = GridMetadata::new(100.0, 200.0, 50.0, 3, 4).unwrap();
        assert_eq!(metadata.node_position(GridKey::new(2, 1)), (200.0, 250.0));
        assert_eq!(metadata.max_position(), (200.0, 350.0));
        assert_eq!(metadata.capacity(), 12);
    }

    #[test]
    fn test_empty_dataset() {
        let result = GridDataset::from_records(km_grid(), Vec::new());
        assert!(matches!(result, Err(ShiftError::EmptyDataset)));
    }

    #[test]
    fn test_duplicate_key() {
        let mut records = ostn02_sample();
        records.push((GridKey::new(652, 313), ShiftRecord::new(0.0, 0.0, 0.0)));

        match GridDataset::from_records(km_grid(), records) {
            Err(ShiftError::DuplicateKey { key }) => assert_eq!(key, GridKey::new(652, 313)),
            other => panic!("Expected DuplicateKey error, got {other:?}"),
        }
    }

    #[test]
    fn test_key_outside_grid() {
        let metadata = GridMetadata::new(0.0, 0.0, 1.0, 10, 10).unwrap();
        let records = vec![(GridKey::new(10, 0), ShiftRecord::new(1.0, 2.0, 3.0))];

        match GridDataset::from_records(metadata, records) {
            Err(ShiftError::KeyOutsideGrid { key }) => assert_eq!(key, GridKey::new(10, 0)),
            other => panic!("Expected KeyOutsideGrid error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_record() {
        let records = vec![(GridKey::new(1, 1), ShiftRecord::new(f64::NAN, 0.0, 0.0))];
        assert!(matches!(
            GridDataset::from_records(km_grid(), records),
            Err(ShiftError::InvalidRecord { .. })
        ));

        // 3e6 metres in millimetres overflows i32
        let records = vec![(GridKey::new(1, 1), ShiftRecord::new(0.0, 3.0e6, 0.0))];
        assert!(matches!(
            GridDataset::from_records(km_grid(), records),
            Err(ShiftError::InvalidRecord { .. })
        ));

        assert!(matches!(
            GridDataset::with_scale(km_grid(), 0, ostn02_sample()),
            Err(ShiftError::InvalidMetadata { .. })
        ));
    }

    #[test]
    fn test_records_sorted_and_exact() {
        let dataset = GridDataset::from_records(km_grid(), ostn02_sample()).unwrap();
        let keys: Vec<GridKey> = dataset.keys().collect();
        assert_eq!(
            keys,
            vec![
                GridKey::new(651, 313),
                GridKey::new(652, 313),
                GridKey::new(651, 314),
                GridKey::new(652, 314),
            ]
        );

        // Three-decimal values survive the fixed-point encoding exactly
        for (key, record) in ostn02_sample() {
            let (_, stored) = dataset.records().find(|(k, _)| *k == key).unwrap();
            assert_eq!(stored, record);
        }
    }

    #[test]
    fn test_fetch_checks_key() {
        let dataset = GridDataset::from_records(km_grid(), ostn02_sample()).unwrap();

        // Unarranged datasets are in key order, so slot 0 holds (651, 313)
        let record = dataset.fetch(GridKey::new(651, 313), 0).unwrap();
        assert_eq!(record, ShiftRecord::new(102.775, -78.244, 44.252));

        // Wrong key for the slot: no node there
        assert!(dataset.fetch(GridKey::new(10, 10), 0).unwrap_err().is_out_of_domain());
        // Outside the declared extent
        assert!(dataset.fetch(GridKey::new(900, 0), 0).unwrap_err().is_out_of_domain());
        // Slot beyond the table
        assert!(dataset.fetch(GridKey::new(651, 313), 4).unwrap_err().is_out_of_domain());
    }

    #[test]
    fn test_blob_roundtrip() {
        let dataset = GridDataset::from_records(km_grid(), ostn02_sample()).unwrap();
        let bytes = dataset.to_bytes();
        assert_eq!(bytes.len(), dataset.encoded_len());
        assert_eq!(&bytes[0..4], b"GSDS");

        let loaded = GridDataset::from_bytes(&bytes).unwrap();
        assert_eq!(loaded.metadata(), dataset.metadata());
        assert_eq!(loaded.scale(), DEFAULT_SCALE);
        assert_eq!(
            loaded.records().collect::<Vec<_>>(),
            dataset.records().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_ostn02_values_use_compact_nodes() {
        let dataset = GridDataset::from_records(km_grid(), ostn02_sample()).unwrap();
        assert!(dataset.is_compact());
        assert_eq!(dataset.node_len(), 10);
        assert_eq!(dataset.encoded_len(), DATASET_HEADER_LEN + 4 * 10);
        assert_eq!(dataset.minimum(), ShiftRecord::new(102.775, -78.246, 44.224));

        // Spread of the full national grid at millimetre scale
        let records = vec![
            (GridKey::new(0, 0), ShiftRecord::new(86.275, -81.603, 43.982)),
            (GridKey::new(700, 1250), ShiftRecord::new(103.443, -50.414, 57.604)),
        ];
        let dataset = GridDataset::from_records(km_grid(), records.clone()).unwrap();
        assert!(dataset.is_compact());

        let loaded = GridDataset::from_bytes(&dataset.to_bytes()).unwrap();
        assert!(loaded.is_compact());
        assert_eq!(loaded.records().collect::<Vec<_>>(), records);
    }

    #[test]
    fn test_wide_spread_falls_back_to_four_byte_offsets() {
        // 70 m between the extremes of x does not fit in a u16 of millimetres
        let records = vec![
            (GridKey::new(1, 1), ShiftRecord::new(-35.0, 0.5, 1.0)),
            (GridKey::new(2, 1), ShiftRecord::new(35.0, 0.5, 1.0)),
            (GridKey::new(3, 1), ShiftRecord::new(-2_000_000.0, -2_000_000.0, 2_000_000.0)),
        ];
        let dataset = GridDataset::from_records(km_grid(), records.clone()).unwrap();
        assert!(!dataset.is_compact());
        assert_eq!(dataset.node_len(), 16);

        let bytes = dataset.to_bytes();
        assert_eq!(u16::from_le_bytes([bytes[6], bytes[7]]), 0);
        let loaded = GridDataset::from_bytes(&bytes).unwrap();
        assert!(!loaded.is_compact());
        assert_eq!(loaded.records().collect::<Vec<_>>(), records);
    }

    #[test]
    fn test_unknown_flags_rejected() {
        let dataset = GridDataset::from_records(km_grid(), ostn02_sample()).unwrap();
        let mut bytes = dataset.to_bytes();
        bytes[6..8].copy_from_slice(&0x0003u16.to_le_bytes());

        match GridDataset::from_bytes(&bytes) {
            Err(ShiftError::CorruptDataset { reason }) => assert!(reason.contains("flags")),
            other => panic!("Expected CorruptDataset error, got {other:?}"),
        }

        // Clearing the compact flag changes the expected length
        bytes[6..8].copy_from_slice(&0u16.to_le_bytes());
        assert!(GridDataset::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_corrupt_blobs() {
        let dataset = GridDataset::from_records(km_grid(), ostn02_sample()).unwrap();
        let bytes = dataset.to_bytes();

        // Truncated node table
        let result = GridDataset::from_bytes(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(ShiftError::CorruptDataset { .. })));

        // Trailing garbage
        let mut longer = bytes.clone();
        longer.push(0);
        assert!(GridDataset::from_bytes(&longer).is_err());

        // Bad magic
        let mut bad = bytes.clone();
        bad[0] = b'X';
        assert!(GridDataset::from_bytes(&bad).is_err());

        // Zero cell size
        let mut bad = bytes.clone();
        bad[24..32].copy_from_slice(&0.0f64.to_le_bytes());
        assert!(GridDataset::from_bytes(&bad).is_err());

        // Header only
        assert!(GridDataset::from_bytes(&bytes[..20]).is_err());
    }
}
