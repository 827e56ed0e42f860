//! The capability set the grid needs from a shape.
use geo::{BoundingRect, Coord, Geometry, Intersects, Point, Rect, Relate};
use wkt::TryFromWkt;

use crate::{PrefixGridError, Result};

/// Relation of a grid cell to a shape.
///
/// Read it as "the cell is ... the shape": `Within` means the cell lies
/// entirely inside the shape, `Contains` means the whole shape fits in the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialRelation {
    Within,
    Contains,
    Intersects,
    Disjoint,
}

impl SpatialRelation {
    pub fn intersects(&self) -> bool {
        *self != SpatialRelation::Disjoint
    }

    /// The same relation seen from the other side.
    pub fn transpose(&self) -> Self {
        match self {
            SpatialRelation::Within => SpatialRelation::Contains,
            SpatialRelation::Contains => SpatialRelation::Within,
            other => *other,
        }
    }
}

/// Something a prefix grid can decompose.
pub trait Shape {
    /// How `rect` relates to this shape.
    fn relate_rect(&self, rect: &Rect<f64>) -> SpatialRelation;

    fn bounding_box(&self) -> Option<Rect<f64>>;

    /// Center of the bounding box.
    fn center(&self) -> Option<Point<f64>> {
        self.bounding_box().map(|r| Point(r.center()))
    }

    fn is_empty(&self) -> bool {
        self.bounding_box().is_none()
    }

    /// Points have no area, so every precision-derived distance for them is 0.
    fn is_point(&self) -> bool {
        false
    }
}

impl Shape for Point<f64> {
    fn relate_rect(&self, rect: &Rect<f64>) -> SpatialRelation {
        if contains_coord(rect, self.0) {
            SpatialRelation::Contains
        } else {
            SpatialRelation::Disjoint
        }
    }

    fn bounding_box(&self) -> Option<Rect<f64>> {
        Some(Rect::new(self.0, self.0))
    }

    fn is_point(&self) -> bool {
        true
    }
}

impl Shape for Rect<f64> {
    fn relate_rect(&self, rect: &Rect<f64>) -> SpatialRelation {
        relate_rects(rect, self)
    }

    fn bounding_box(&self) -> Option<Rect<f64>> {
        Some(*self)
    }
}

impl Shape for Geometry<f64> {
    fn relate_rect(&self, rect: &Rect<f64>) -> SpatialRelation {
        match self {
            Geometry::Point(p) => p.relate_rect(rect),
            Geometry::Rect(r) => r.relate_rect(rect),
            _ => {
                let Some(bbox) = self.bounding_rect() else {
                    return SpatialRelation::Disjoint;
                };
                if !rect.intersects(&bbox) {
                    return SpatialRelation::Disjoint;
                }
                let matrix = rect.relate(self);
                if matrix.is_disjoint() {
                    SpatialRelation::Disjoint
                } else if matrix.is_within() {
                    SpatialRelation::Within
                } else if matrix.is_contains() {
                    SpatialRelation::Contains
                } else {
                    SpatialRelation::Intersects
                }
            }
        }
    }

    fn bounding_box(&self) -> Option<Rect<f64>> {
        self.bounding_rect()
    }

    fn is_point(&self) -> bool {
        matches!(self, Geometry::Point(_))
    }
}

fn contains_coord(rect: &Rect<f64>, c: Coord<f64>) -> bool {
    let (min, max) = (rect.min(), rect.max());
    c.x >= min.x && c.x <= max.x && c.y >= min.y && c.y <= max.y
}

/// Relation of `cell` to `shape`, both rectangles. Touching edges count as
/// intersecting.
pub(crate) fn relate_rects(cell: &Rect<f64>, shape: &Rect<f64>) -> SpatialRelation {
    let (c_min, c_max) = (cell.min(), cell.max());
    let (s_min, s_max) = (shape.min(), shape.max());
    if c_max.x < s_min.x || c_min.x > s_max.x || c_max.y < s_min.y || c_min.y > s_max.y {
        return SpatialRelation::Disjoint;
    }
    if s_min.x <= c_min.x && c_max.x <= s_max.x && s_min.y <= c_min.y && c_max.y <= s_max.y {
        return SpatialRelation::Within;
    }
    if c_min.x <= s_min.x && s_max.x <= c_max.x && c_min.y <= s_min.y && s_max.y <= c_max.y {
        return SpatialRelation::Contains;
    }
    SpatialRelation::Intersects
}

/// Parses a WKT string into a geometry.
pub fn parse_wkt(wkt: &str) -> Result<Geometry<f64>> {
    Geometry::try_from_wkt_str(wkt.trim())
        .map_err(|e| PrefixGridError::MalformedInput(format!("error parsing geo: {}", e)))
}
