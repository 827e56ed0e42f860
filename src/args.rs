//! Spatial query arguments: an operation, a shape and precision hints.
use std::fmt;
use std::str::FromStr;

use geo::Geometry;
use serde::{Deserialize, Serialize};
use wkt::ToWkt;

use crate::context::SpatialContext;
use crate::shape::{Shape, parse_wkt};
use crate::utils::nearest_horizontal_corner;
use crate::{PrefixGridError, Result};

/// Fraction of a query shape's radius tolerated as positional error when
/// nothing else is specified.
pub const DEFAULT_DIST_ERR_PCT: f64 = 0.025;

/// Predicate between an indexed shape and the query shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpatialOperation {
    Intersects,
    /// The indexed shape lies within the query shape.
    IsWithin,
    /// The indexed shape contains the query shape.
    Contains,
    IsDisjointTo,
}

impl FromStr for SpatialOperation {
    type Err = PrefixGridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intersects" => Ok(SpatialOperation::Intersects),
            "iswithin" => Ok(SpatialOperation::IsWithin),
            "contains" => Ok(SpatialOperation::Contains),
            "isdisjointto" => Ok(SpatialOperation::IsDisjointTo),
            _ => Err(PrefixGridError::MalformedInput(format!(
                "unknown spatial operation: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for SpatialOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpatialOperation::Intersects => "Intersects",
            SpatialOperation::IsWithin => "IsWithin",
            SpatialOperation::Contains => "Contains",
            SpatialOperation::IsDisjointTo => "IsDisjointTo",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpatialArgs {
    pub operation: SpatialOperation,
    pub shape: Geometry<f64>,
    pub dist_err_pct: Option<f64>,
    pub dist_err: Option<f64>,
}

impl SpatialArgs {
    pub fn new(operation: SpatialOperation, shape: Geometry<f64>) -> Self {
        Self {
            operation,
            shape,
            dist_err_pct: None,
            dist_err: None,
        }
    }

    pub fn with_dist_err_pct(mut self, dist_err_pct: f64) -> Self {
        self.dist_err_pct = Some(dist_err_pct);
        self
    }

    pub fn with_dist_err(mut self, dist_err: f64) -> Self {
        self.dist_err = Some(dist_err);
        self
    }

    /// Parses `Operation(WKT) key=value ...`, e.g.
    /// `Intersects(POLYGON((0 0, 1 0, 1 1, 0 0))) distErrPct=0.1`.
    ///
    /// Recognized keys are `distErrPct` and `distErr`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let open = s
            .find('(')
            .ok_or_else(|| PrefixGridError::MalformedInput(format!("missing '(' in {}", s)))?;
        let operation: SpatialOperation = s[..open].parse()?;

        let mut depth = 0usize;
        let mut close = None;
        for (i, ch) in s[open..].char_indices() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let close = close
            .ok_or_else(|| PrefixGridError::MalformedInput(format!("unbalanced ')' in {}", s)))?;

        let mut args = Self::new(operation, parse_wkt(&s[open + 1..close])?);
        for pair in s[close + 1..].split_whitespace() {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                PrefixGridError::MalformedInput(format!("expected key=value, got {}", pair))
            })?;
            let value: f64 = value.parse().map_err(|_| {
                PrefixGridError::MalformedInput(format!("invalid number for {}: {}", key, value))
            })?;
            match key {
                "distErrPct" => args.dist_err_pct = Some(value),
                "distErr" => args.dist_err = Some(value),
                _ => {
                    return Err(PrefixGridError::MalformedInput(format!(
                        "unknown argument: {}",
                        key
                    )));
                }
            }
        }
        Ok(args)
    }

    /// Absolute positional error for this query: `dist_err` when given, else
    /// derived from `dist_err_pct` (or `default_pct`) and the shape's size.
    pub fn resolve_dist_err(&self, ctx: &SpatialContext, default_pct: f64) -> Result<f64> {
        if let Some(dist_err) = self.dist_err {
            return Ok(dist_err);
        }
        calc_distance_from_err_pct(
            &self.shape,
            self.dist_err_pct.unwrap_or(default_pct),
            ctx,
        )
    }
}

impl fmt::Display for SpatialArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.operation, self.shape.wkt_string())?;
        if let Some(pct) = self.dist_err_pct {
            write!(f, " distErrPct={}", pct)?;
        }
        if let Some(dist_err) = self.dist_err {
            write!(f, " distErr={}", dist_err)?;
        }
        Ok(())
    }
}

/// Turns a relative error into an absolute one: `dist_err_pct` times the
/// distance from the center of the shape's bounding box to its corner.
///
/// Points (and empty shapes) always resolve to 0, meaning full precision.
pub fn calc_distance_from_err_pct<S: Shape + ?Sized>(
    shape: &S,
    dist_err_pct: f64,
    ctx: &SpatialContext,
) -> Result<f64> {
    if !(0.0..=0.5).contains(&dist_err_pct) {
        return Err(PrefixGridError::InvalidPrecision(format!(
            "distErrPct {} must be between [0 and 0.5]",
            dist_err_pct
        )));
    }
    if dist_err_pct == 0.0 || shape.is_point() {
        return Ok(0.0);
    }
    let Some(bbox) = shape.bounding_box() else {
        return Ok(0.0);
    };
    let center = geo::Point(bbox.center());
    let diagonal = ctx.distance(center, nearest_horizontal_corner(&bbox));
    Ok(diagonal * dist_err_pct)
}
