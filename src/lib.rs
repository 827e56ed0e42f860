//! # prefix-grid
//!
//! Hierarchical spatial prefix grids for indexing geometries as cell tokens.
//! A grid recursively splits a bounded universe into cells; every cell is
//! addressed by the path of branch symbols from the root (its token). A shape
//! is approximated by the set of cells that cover it at a given precision,
//! and those tokens are what an inverted index stores and searches.
//!
//! ## Features
//!
//! - Geohash grid (32-way, base-32 tokens) and quad grid (4-way, `ABCD` tokens)
//! - Cell covers for points, rectangles, polygons and collections
//! - Precision chosen by explicit depth or by a distance-error percentage
//! - Size-bounded binary geometry encoding with adaptive simplification
//! - Index strategies for grid tokens, binary geometries and bounding boxes
//! - GeoJSON grid overlay rendering
//!
//! ## Usage
//!
//! ```rust
//! use prefix_grid::{CoverOptions, GridType, PrefixGrid, SpatialContext};
//!
//! fn main() -> Result<(), prefix_grid::PrefixGridError> {
//!     let grid = PrefixGrid::new(SpatialContext::geo(), GridType::Quad, 16)?;
//!
//!     let los_angeles = geo::Point::new(-118.24368, 34.05223);
//!     let cells = grid.cover(&los_angeles, 11, CoverOptions::default())?;
//!
//!     assert_eq!(cells.len(), 1);
//!     assert!(cells[0].is_leaf());
//!     assert_eq!(cells[0].level(), 11);
//!     println!("{}", cells[0]);
//!     Ok(())
//! }
//! ```
//!
//! ## Size-bounded encoding
//!
//! Shapes that have to be stored verbatim go through [`GeometryEncoder`]. When
//! the binary form is larger than the budget the geometry is simplified with a
//! growing tolerance until it fits, or the encoder gives up once the size stops
//! shrinking:
//!
//! ```rust
//! use prefix_grid::GeometryEncoder;
//!
//! let encoder = GeometryEncoder::new(32_000);
//! let shape = geo::Geometry::Point(geo::Point::new(2.35, 48.85));
//! let encoded = encoder.encode(&shape).unwrap();
//! assert_eq!(encoded.tolerance(), 0.0);
//! assert_eq!(encoded.decode().unwrap(), shape);
//! ```
//!
//! ## Thread Safety
//!
//! Grids, contexts and encoders are immutable after construction. Share a grid
//! behind an `Arc` and call [`PrefixGrid::cover`] from as many threads as
//! needed; no locking is involved.
use thiserror::Error;

mod args;
mod cell;
mod context;
mod encoder;
mod grid;
mod planner;
mod sample;
mod shape;
mod strategy;
mod update;
mod utils;

pub use args::{DEFAULT_DIST_ERR_PCT, SpatialArgs, SpatialOperation, calc_distance_from_err_pct};
pub use cell::{Cell, LEAF_BYTE, split_leaf_marker};
pub use context::SpatialContext;
pub use encoder::{
    DEFAULT_MAX_BYTES, EncodedGeometry, GeometryEncoder, decode_geometry, encode_geometry,
    simplify_preserving_topology,
};
pub use grid::{CoverOptions, GridType, PrefixGrid};
pub use planner::{
    GeoJsonRenderer, GridPlan, GridQueryPlanner, HierarchyRenderer, Precision, render,
    render_hierarchy,
};
pub use sample::{SampleData, SampleDataReader};
pub use shape::{Shape, SpatialRelation, parse_wkt};
pub use strategy::{
    BBoxStrategy, GeometryStrategy, IndexStrategy, Predicate, PrefixTreeStrategy, StoredValue,
    StrategyConfig,
};
pub use update::{IndexedDocument, InputDocument, ShapeFieldProcessor};

#[derive(Error, Debug)]
pub enum PrefixGridError {
    #[error("invalid precision, {0}")]
    InvalidPrecision(String),
    #[error("can not simplify geometry smaller than max, last length {0}")]
    ShapeTooComplex(usize),
    #[error("unsupported shape, {0}")]
    UnsupportedShape(String),
    #[error("malformed input, {0}")]
    MalformedInput(String),
    #[error("configuration error, {0}")]
    Config(String),
    #[error("geohash error, {0:?}")]
    GeohashError(#[from] geohash::GeohashError),
    #[error("bincode decode error, {0:?}")]
    BincodeDecodeError(#[from] bincode::error::DecodeError),
    #[error("bincode encode error, {0:?}")]
    BincodeEncodeError(#[from] bincode::error::EncodeError),
    #[error("sample data error, {0:?}")]
    CsvError(#[from] csv::Error),
    #[error("io error, {0:?}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PrefixGridError>;
