//! Size-bounded binary encoding of geometries.
use geo::{BoundingRect, Geometry, GeometryCollection, SimplifyVwPreserve};
use log::info;

use crate::{PrefixGridError, Result};

/// Byte budget used when none is configured.
pub const DEFAULT_MAX_BYTES: usize = 32000;

const INITIAL_DIVISOR: f64 = 1000.0;
const DIVISOR_DECAY: f64 = 0.70;

/// A geometry in its stored binary form.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedGeometry {
    bytes: Vec<u8>,
    tolerance: f64,
}

impl EncodedGeometry {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Simplification tolerance applied to fit the budget, 0 if the geometry
    /// was stored as given.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn decode(&self) -> Result<Geometry<f64>> {
        decode_geometry(&self.bytes)
    }
}

/// Encodes geometries under a byte budget.
///
/// A geometry whose encoding is over the budget is simplified with a tolerance
/// starting at 1/1000 of the smaller side of its envelope. Every round that
/// still does not fit grows the tolerance by dividing the divisor by 0.7. Once
/// a round stops shrinking the output the geometry is rejected with
/// [`PrefixGridError::ShapeTooComplex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryEncoder {
    max_bytes: usize,
}

impl Default for GeometryEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}

impl GeometryEncoder {
    /// `max_bytes == 0` disables the budget.
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn encode(&self, geometry: &Geometry<f64>) -> Result<EncodedGeometry> {
        let mut bytes = encode_geometry(geometry)?;
        if self.max_bytes == 0 || bytes.len() <= self.max_bytes {
            return Ok(EncodedGeometry {
                bytes,
                tolerance: 0.0,
            });
        }

        let mut last = bytes.len();
        let Some(envelope) = geometry.bounding_rect() else {
            return Err(PrefixGridError::ShapeTooComplex(last));
        };
        let min_span = envelope.width().min(envelope.height());
        let mut divisor = INITIAL_DIVISOR;
        loop {
            let tolerance = min_span / divisor;
            info!(
                "Simplifying long geometry: length={} tolerance={}",
                bytes.len(),
                tolerance
            );
            let simple = simplify_preserving_topology(geometry, tolerance);
            bytes = encode_geometry(&simple)?;
            if bytes.len() < self.max_bytes {
                return Ok(EncodedGeometry { bytes, tolerance });
            }
            if bytes.len() >= last {
                return Err(PrefixGridError::ShapeTooComplex(last));
            }
            last = bytes.len();
            divisor *= DIVISOR_DECAY;
        }
    }
}

pub fn encode_geometry(geometry: &Geometry<f64>) -> Result<Vec<u8>> {
    Ok(bincode::serde::encode_to_vec(
        geometry,
        bincode::config::standard(),
    )?)
}

pub fn decode_geometry(bytes: &[u8]) -> Result<Geometry<f64>> {
    let (geometry, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(geometry)
}

/// Visvalingam-Whyatt simplification that keeps rings valid and disjoint.
///
/// `tolerance` is a distance; vertices whose triangle with their neighbours
/// has an area under `tolerance²` are dropped. Points, lines, rectangles and
/// triangles come back unchanged.
pub fn simplify_preserving_topology(geometry: &Geometry<f64>, tolerance: f64) -> Geometry<f64> {
    let epsilon = tolerance * tolerance;
    match geometry {
        Geometry::LineString(g) => Geometry::LineString(g.simplify_vw_preserve(epsilon)),
        Geometry::MultiLineString(g) => Geometry::MultiLineString(g.simplify_vw_preserve(epsilon)),
        Geometry::Polygon(g) => Geometry::Polygon(g.simplify_vw_preserve(epsilon)),
        Geometry::MultiPolygon(g) => Geometry::MultiPolygon(g.simplify_vw_preserve(epsilon)),
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(
            gc.iter()
                .map(|g| simplify_preserving_topology(g, tolerance))
                .collect::<GeometryCollection<f64>>(),
        ),
        other => other.clone(),
    }
}
