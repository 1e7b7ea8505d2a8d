//! # gridshift - Grid-Shift Correction Lookups
//!
//! Fast, read-only lookups of datum-transformation corrections stored on a
//! regular 2-D grid, such as the OSTN02 model for Great Britain.
//!
//! ## Features
//!
//! - **Constant Time**: Grid nodes are located through a minimal perfect hash
//!   index built once, offline
//! - **Compact**: One fixed-size record per node, no empty slots
//! - **Memory Mapped**: Engine files are read in place with no parsing pass
//! - **Thread Safe**: A loaded [`ShiftService`] is immutable and can be
//!   shared across threads
//!
//! ## Quick Start
//!
//! ```ignore
//! use gridshift::{source, GridMetadata, IndexConfig, ShiftService, SourceFormat, DEFAULT_SCALE};
//!
//! // Offline: import the published table and write an engine file
//! let dataset = source::load_dataset(
//!     "/data/OSTN02_OSGM02_GB.zip",
//!     SourceFormat::Ostn02,
//!     GridMetadata::ostn02(),
//!     DEFAULT_SCALE,
//! )?;
//! ShiftService::from_dataset(dataset, &IndexConfig::default())?.save("/data/ostn02.gsb")?;
//!
//! // At run time: load and query
//! let service = ShiftService::open("/data/ostn02.gsb")?;
//! let shift = service.get_shifts((651307.003, 313255.686))?;
//! println!("dx={} dy={} dz={}", shift.x_shift, shift.y_shift, shift.z_shift);
//! ```
//!
//! ## Grid Model
//!
//! A grid is described by [`GridMetadata`]: an origin, a square cell size and
//! a number of columns and rows. Node `(c, r)` sits at
//! `(origin_e + c * cell_size, origin_n + r * cell_size)`.
//!
//! - **OSTN02**: 701 x 1251 nodes at 1000 m spacing, origin `(0, 0)`
//!
//! Queries between nodes are bilinearly interpolated from the four corners of
//! the enclosing cell. Queries at a node return its stored shift exactly.
//! Anything else yields [`ShiftError::OutOfDomain`].

pub mod dataset;
pub mod error;
pub mod interpolate;
pub mod key;
mod layout;
pub mod phf;
pub mod service;
pub mod source;

// Re-export main types at crate root for convenience
pub use dataset::{GridDataset, GridMetadata, ShiftRecord, DEFAULT_SCALE};
pub use error::{Result, ShiftError};
pub use interpolate::QueryPoint;
pub use key::GridKey;
pub use phf::{IndexConfig, PerfectHashIndex, DEFAULT_SEED};
pub use service::{EngineStats, ShiftService, ShiftServiceBuilder};
pub use source::SourceFormat;
