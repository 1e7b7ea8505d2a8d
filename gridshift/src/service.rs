//! Grid-shift lookup service.
//!
//! This module provides [`ShiftService`], the engine that answers shift
//! queries, and [`ShiftServiceBuilder`] for loading one from an engine file.
//!
//! # Engine Files
//!
//! An engine file bundles a [`PerfectHashIndex`] with the [`GridDataset`] it
//! was built for:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | magic `GSHF` |
//! | 4 | 2 | version |
//! | 6 | 2 | reserved |
//! | 8 | 4 | index blob length |
//! | 12 | … | index blob |
//! | … | … | dataset blob (to end of file) |
//!
//! Loading memory-maps the file; the node table is read in place.
//!
//! ```ignore
//! use gridshift::ShiftServiceBuilder;
//!
//! let service = ShiftServiceBuilder::new("/data/ostn02.gsb").build()?;
//! let shift = service.get_shifts((651307.003, 313255.686))?;
//! println!("{shift}");
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use memmap2::Mmap;

use crate::dataset::{GridDataset, GridMetadata, ShiftRecord};
use crate::error::{Result, ShiftError};
use crate::interpolate::{self, QueryPoint};
use crate::key::GridKey;
use crate::phf::{IndexConfig, PerfectHashIndex};

const ENGINE_MAGIC: &[u8; 4] = b"GSHF";
const ENGINE_VERSION: u16 = 1;
const ENGINE_HEADER_LEN: usize = 12;

/// Summary of a loaded or built engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStats {
    /// Number of grid nodes.
    pub node_count: usize,
    /// Number of perfect hash buckets.
    pub bucket_count: usize,
    /// Seed of the perfect hash index.
    pub seed: u64,
    /// Key-set checksum, if the index carries one.
    pub checksum: Option<u32>,
    /// Fixed-point scale of the stored shifts.
    pub scale: u32,
    /// Bytes per stored node (10 when compact, 16 otherwise).
    pub node_len: usize,
    /// Whether the node table is read from a memory-mapped file.
    pub memory_mapped: bool,
    /// Size of the engine file in bytes.
    pub encoded_len: usize,
}

impl EngineStats {
    /// Fraction of the declared grid positions that carry a node (0.0 to 1.0).
    pub fn coverage(&self, metadata: &GridMetadata) -> f64 {
        self.node_count as f64 / metadata.capacity() as f64
    }
}

/// Grid-shift lookup engine.
///
/// Holds an immutable [`GridDataset`] together with the [`PerfectHashIndex`]
/// that places its nodes. Every query is a pure read, so one service can be
/// shared across threads by reference or in an [`Arc`].
///
/// # Example
///
/// ```
/// use gridshift::{GridDataset, GridKey, GridMetadata, IndexConfig, ShiftRecord, ShiftService};
///
/// // Kilometre grid around the OSTN02 node (651, 313)
/// let metadata = GridMetadata::new(0.0, 0.0, 1.0, 701, 1251)?;
/// let dataset = GridDataset::from_records(metadata, vec![
///     (GridKey::new(651, 313), ShiftRecord::new(102.775, -78.244, 44.252)),
///     (GridKey::new(652, 313), ShiftRecord::new(102.813, -78.246, 44.236)),
///     (GridKey::new(651, 314), ShiftRecord::new(102.783, -78.216, 44.240)),
///     (GridKey::new(652, 314), ShiftRecord::new(102.822, -78.227, 44.224)),
/// ])?;
/// let service = ShiftService::from_dataset(dataset, &IndexConfig::default())?;
///
/// let shift = service.get_shifts((651u32, 313u32))?;
/// assert_eq!(shift.as_tuple(), (102.775, -78.244, 44.252));
///
/// // Beyond the grid: an explicit error, never a silent zero
/// assert!(service.get_shifts((800u32, 313u32)).unwrap_err().is_out_of_domain());
/// # Ok::<(), gridshift::ShiftError>(())
/// ```
#[derive(Debug)]
pub struct ShiftService {
    index: PerfectHashIndex,
    dataset: GridDataset,
    /// File the engine was loaded from, if any.
    source: Option<PathBuf>,
}

impl ShiftService {
    /// Build an engine in-process from a dataset.
    ///
    /// Builds the perfect hash index with the seed-retry policy of `config`
    /// and arranges the dataset into slot order.
    ///
    /// # Errors
    ///
    /// Returns [`ShiftError::ConstructionFailed`] if no seed of `config`
    /// yields a collision-free index.
    pub fn from_dataset(dataset: GridDataset, config: &IndexConfig) -> Result<Self> {
        let start = Instant::now();

        let keys: Vec<GridKey> = dataset.keys().collect();
        let index = PerfectHashIndex::build_with(&keys, config)?;
        drop(keys);
        let dataset = dataset.arrange(&index)?;

        tracing::info!(
            nodes = dataset.len(),
            buckets = index.bucket_count(),
            seed = index.seed(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built grid shift engine"
        );

        Ok(Self {
            index,
            dataset,
            source: None,
        })
    }

    /// Pair an index with a dataset already arranged by it.
    ///
    /// With `verify` set, the key-set checksum is checked and every node is
    /// confirmed to sit in the slot the index assigns it.
    ///
    /// # Errors
    ///
    /// Returns [`ShiftError::CorruptIndex`] if the two do not belong together.
    pub fn from_parts(index: PerfectHashIndex, dataset: GridDataset, verify: bool) -> Result<Self> {
        if index.slot_count() != dataset.len() {
            return Err(ShiftError::corrupt_index(format!(
                "index has {} slots but dataset has {} nodes",
                index.slot_count(),
                dataset.len()
            )));
        }

        if verify {
            index.verify(dataset.keys())?;
            for (slot, key) in dataset.keys().enumerate() {
                if !dataset.metadata().contains(key) {
                    return Err(ShiftError::corrupt_dataset(format!(
                        "node {key} lies outside the grid extent"
                    )));
                }
                if index.lookup(key) != slot {
                    return Err(ShiftError::corrupt_index(format!(
                        "node {key} is stored in slot {slot} but the index places it elsewhere"
                    )));
                }
            }
        }

        Ok(Self {
            index,
            dataset,
            source: None,
        })
    }

    /// Load an engine file with verification enabled.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        ShiftServiceBuilder::new(path).build()
    }

    /// Create a builder for more configuration options.
    pub fn builder<P: AsRef<Path>>(path: P) -> ShiftServiceBuilder {
        ShiftServiceBuilder::new(path)
    }

    /// Load an engine from an in-memory engine file, copying the node table.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (index, dataset_start) = parse_engine(bytes)?;
        let dataset = GridDataset::from_bytes(&bytes[dataset_start..])?;
        Self::from_parts(index, dataset, true)
    }

    /// Serialize to the engine file format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        // Writing into a Vec cannot fail
        let _ = self.write_to(&mut bytes);
        bytes
    }

    /// Write the engine file to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(ENGINE_MAGIC)?;
        writer.write_all(&ENGINE_VERSION.to_le_bytes())?;
        writer.write_all(&0u16.to_le_bytes())?;
        writer.write_all(&(self.index.encoded_len() as u32).to_le_bytes())?;
        self.index.write_to(writer)?;
        self.dataset.write_to(writer)?;
        Ok(())
    }

    /// Write the engine file to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;

        tracing::info!(
            path = %path.display(),
            bytes = self.encoded_len(),
            "Wrote grid shift engine"
        );
        Ok(())
    }

    /// Interpolated shift at a query point.
    ///
    /// Accepts a [`QueryPoint`] or an `(eastings, northings)` pair of `f64`,
    /// `u32` or `i32`, in the grid's native units.
    ///
    /// # Errors
    ///
    /// Returns [`ShiftError::OutOfDomain`] if the point lies outside the
    /// interpolatable region of the grid or a corner node is missing.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let shift = service.get_shifts((651307.003, 313255.686))?;
    /// let osgb36 = (651307.003 + shift.x_shift, 313255.686 + shift.y_shift);
    /// ```
    pub fn get_shifts<P: Into<QueryPoint>>(&self, point: P) -> Result<ShiftRecord> {
        interpolate::interpolate(point.into(), &self.dataset, &self.index)
    }

    /// Interpolated shifts for a batch of `(eastings, northings)` pairs.
    ///
    /// Returns one result per input point, in input order. A point outside
    /// the grid does not affect the others.
    pub fn get_shifts_batch(&self, points: &[(f64, f64)]) -> Vec<Result<ShiftRecord>> {
        points.iter().map(|&point| self.get_shifts(point)).collect()
    }

    /// Shift stored at a single node, without interpolation.
    ///
    /// # Errors
    ///
    /// Returns [`ShiftError::OutOfDomain`] if the grid has no node at `key`.
    pub fn node_shift(&self, key: GridKey) -> Result<ShiftRecord> {
        interpolate::node_shift(key, &self.dataset, &self.index)
    }

    /// Shift stored at the node named by a legacy hex key (e.g. `"13928b"`).
    ///
    /// Returns `None` if the key does not parse or the grid has no node there.
    pub fn node_shift_hex(&self, key: &str) -> Option<ShiftRecord> {
        let key = GridKey::from_legacy_hex(key)?;
        self.node_shift(key).ok()
    }

    /// Grid metadata.
    pub fn metadata(&self) -> &GridMetadata {
        self.dataset.metadata()
    }

    /// The perfect hash index.
    pub fn index(&self) -> &PerfectHashIndex {
        &self.index
    }

    /// The node dataset, in slot order.
    pub fn dataset(&self) -> &GridDataset {
        &self.dataset
    }

    /// File the engine was loaded from, if any.
    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Size of the engine file format in bytes.
    pub fn encoded_len(&self) -> usize {
        ENGINE_HEADER_LEN + self.index.encoded_len() + self.dataset.encoded_len()
    }

    /// Engine statistics.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            node_count: self.dataset.len(),
            bucket_count: self.index.bucket_count(),
            seed: self.index.seed(),
            checksum: self.index.checksum(),
            scale: self.dataset.scale(),
            node_len: self.dataset.node_len(),
            memory_mapped: self.source.is_some(),
            encoded_len: self.encoded_len(),
        }
    }
}

/// Validate the engine header and parse the index blob.
///
/// Returns the index and the offset of the dataset blob.
fn parse_engine(bytes: &[u8]) -> Result<(PerfectHashIndex, usize)> {
    let header = bytes
        .get(..ENGINE_HEADER_LEN)
        .ok_or_else(|| ShiftError::corrupt_index("file too short for engine header"))?;
    if &header[0..4] != ENGINE_MAGIC {
        return Err(ShiftError::corrupt_index("not a grid shift engine file"));
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != ENGINE_VERSION {
        return Err(ShiftError::corrupt_index(format!(
            "unsupported engine version {version}"
        )));
    }
    let index_len = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;

    let index_end = ENGINE_HEADER_LEN
        .checked_add(index_len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| ShiftError::corrupt_index("index section extends past end of file"))?;
    let index_bytes = &bytes[ENGINE_HEADER_LEN..index_end];

    if PerfectHashIndex::blob_len(index_bytes)? != index_len {
        return Err(ShiftError::corrupt_index(
            "index length disagrees with its bucket count",
        ));
    }
    let index = PerfectHashIndex::from_bytes(index_bytes)?;

    Ok((index, index_end))
}

/// Builder for loading a [`ShiftService`] from an engine file.
///
/// # Example
///
/// ```ignore
/// use gridshift::ShiftServiceBuilder;
///
/// let service = ShiftServiceBuilder::new("/data/ostn02.gsb")
///     .verify(false)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct ShiftServiceBuilder {
    path: PathBuf,
    verify: bool,
}

impl ShiftServiceBuilder {
    /// Create a new builder for the engine file at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            verify: true,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `GRIDSHIFT_DATA` | Path to the engine file | Required |
    /// | `GRIDSHIFT_VERIFY` | Verify checksum and node placement on load | true |
    ///
    /// # Errors
    ///
    /// Returns an error if `GRIDSHIFT_DATA` is not set.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("GRIDSHIFT_DATA").map_err(|_| {
            ShiftError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "GRIDSHIFT_DATA environment variable not set",
            ))
        })?;

        let verify = std::env::var("GRIDSHIFT_VERIFY")
            .map(|v| !(v.eq_ignore_ascii_case("false") || v == "0"))
            .unwrap_or(true);

        Ok(Self {
            path: PathBuf::from(path),
            verify,
        })
    }

    /// Set the engine file path.
    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    /// Enable or disable load-time verification. Default is enabled.
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Load the [`ShiftService`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped, or if its
    /// index or dataset section fails validation.
    pub fn build(self) -> Result<ShiftService> {
        let start = Instant::now();
        let file = File::open(&self.path)?;

        // SAFETY: Memory mapping is safe as long as the file is not modified
        // while mapped. We open the file read-only and never write through the map.
        let map = Arc::new(unsafe { Mmap::map(&file)? });

        let (index, dataset_start) = parse_engine(&map)?;
        let dataset = GridDataset::from_mapped(Arc::clone(&map), dataset_start)?;
        let mut service = ShiftService::from_parts(index, dataset, self.verify)?;

        tracing::info!(
            path = %self.path.display(),
            nodes = service.dataset.len(),
            verified = self.verify,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded grid shift engine"
        );

        service.source = Some(self.path);
        Ok(service)
    }
}
