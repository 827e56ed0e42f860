//! Immutable spatial configuration shared by grids, strategies and encoders.
use std::collections::HashMap;

use geo::{BooleanOps, BoundingRect, Coord, Geometry, MultiPolygon, Point, Polygon, Rect, Translate};

use crate::utils::{degrees_between, euclidean_between, normalize_longitude};
use crate::{PrefixGridError, Result};

/// Coordinate system settings: whether coordinates are lon/lat degrees on a
/// sphere, the extent of the world, and whether geometries crossing the
/// antimeridian get split back into the world.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialContext {
    geo: bool,
    world: Rect<f64>,
    wrap_longitude: bool,
}

impl Default for SpatialContext {
    fn default() -> Self {
        Self::geo()
    }
}

impl SpatialContext {
    /// Lon/lat degrees, world `[-180,180]x[-90,90]`, no longitude wrapping.
    pub fn geo() -> Self {
        Self {
            geo: true,
            world: Rect::new(Coord { x: -180.0, y: -90.0 }, Coord { x: 180.0, y: 90.0 }),
            wrap_longitude: false,
        }
    }

    /// Flat euclidean plane bounded by `world`.
    pub fn cartesian(world: Rect<f64>) -> Self {
        Self {
            geo: false,
            world,
            wrap_longitude: false,
        }
    }

    pub fn with_wrap_longitude(mut self, wrap_longitude: bool) -> Self {
        self.wrap_longitude = wrap_longitude;
        self
    }

    /// Builds a context from string parameters, the way they arrive from a
    /// request or a schema definition.
    ///
    /// Recognized keys: `geo` (default `true`), `normWrapLongitude`
    /// (default `false`) and `worldBounds` as `ENVELOPE(minX, maxX, maxY, minY)`,
    /// which is only allowed for non-geo contexts. Unknown keys are ignored.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let geo = match params.get("geo") {
            Some(v) => parse_bool("geo", v)?,
            None => true,
        };
        let wrap_longitude = match params.get("normWrapLongitude") {
            Some(v) => parse_bool("normWrapLongitude", v)?,
            None => false,
        };
        let world = params
            .get("worldBounds")
            .map(|v| parse_envelope(v))
            .transpose()?;

        let ctx = match (geo, world) {
            (true, Some(_)) => {
                return Err(PrefixGridError::Config(
                    "worldBounds can not be set on a geo context".into(),
                ));
            }
            (true, None) => Self::geo(),
            (false, Some(world)) => Self::cartesian(world),
            (false, None) => {
                return Err(PrefixGridError::Config(
                    "worldBounds is required when geo=false".into(),
                ));
            }
        };
        Ok(ctx.with_wrap_longitude(wrap_longitude))
    }

    pub fn is_geo(&self) -> bool {
        self.geo
    }

    pub fn wrap_longitude(&self) -> bool {
        self.wrap_longitude
    }

    pub fn world_bounds(&self) -> Rect<f64> {
        self.world
    }

    /// Distance in world units: degrees of arc for geo contexts, plain
    /// euclidean distance otherwise.
    pub fn distance(&self, a: Point<f64>, b: Point<f64>) -> f64 {
        if self.geo {
            degrees_between(a, b)
        } else {
            euclidean_between(a, b)
        }
    }

    /// Brings a geometry back into the world when longitude wrapping is on.
    ///
    /// Points get their longitude wrapped. Polygons reaching past ±180 are cut
    /// at the antimeridian and the outside parts shifted by 360 degrees, which
    /// yields a multi-polygon with pieces on both sides.
    pub fn normalize(&self, geometry: Geometry<f64>) -> Geometry<f64> {
        if !(self.geo && self.wrap_longitude) {
            return geometry;
        }
        match geometry {
            Geometry::Point(p) => Geometry::Point(Point::new(normalize_longitude(p.x()), p.y())),
            Geometry::Polygon(polygon) => self.wrap_polygons(vec![polygon]),
            Geometry::MultiPolygon(mp) => self.wrap_polygons(mp.0),
            Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(
                gc.into_iter().map(|g| self.normalize(g)).collect(),
            ),
            other => other,
        }
    }

    fn wrap_polygons(&self, polygons: Vec<Polygon<f64>>) -> Geometry<f64> {
        let world = self.world.to_polygon();
        let (min_x, max_x) = (self.world.min().x, self.world.max().x);
        let span = max_x - min_x;

        let mut pieces: Vec<Polygon<f64>> = Vec::with_capacity(polygons.len());
        for polygon in polygons {
            let Some(bbox) = polygon.bounding_rect() else {
                continue;
            };
            if bbox.min().x >= min_x && bbox.max().x <= max_x {
                pieces.push(polygon);
                continue;
            }
            for shift in [-span, 0.0, span] {
                let shifted = polygon.translate(shift, 0.0);
                let clipped = shifted.intersection(&world);
                pieces.extend(clipped.0.into_iter().filter(|p| !p.exterior().0.is_empty()));
            }
        }

        if pieces.len() == 1 {
            Geometry::Polygon(pieces.remove(0))
        } else {
            Geometry::MultiPolygon(MultiPolygon(pieces))
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(PrefixGridError::MalformedInput(format!(
            "invalid boolean for {}: {}",
            key, value
        ))),
    }
}

/// Parses `ENVELOPE(minX, maxX, maxY, minY)`.
fn parse_envelope(value: &str) -> Result<Rect<f64>> {
    let malformed = || PrefixGridError::MalformedInput(format!("invalid envelope: {}", value));
    let body = value
        .trim()
        .strip_prefix("ENVELOPE")
        .map(str::trim)
        .and_then(|v| v.strip_prefix('('))
        .and_then(|v| v.strip_suffix(')'))
        .ok_or_else(malformed)?;
    let numbers = body
        .split(',')
        .map(|n| n.trim().parse::<f64>().map_err(|_| malformed()))
        .collect::<Result<Vec<f64>>>()?;
    match numbers.as_slice() {
        [min_x, max_x, max_y, min_y] if min_x < max_x && min_y < max_y => Ok(Rect::new(
            Coord { x: *min_x, y: *min_y },
            Coord { x: *max_x, y: *max_y },
        )),
        _ => Err(malformed()),
    }
}
