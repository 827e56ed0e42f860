//! Ways of turning a shape into indexed values and a query into a matcher.
use std::sync::Arc;

use geo::{Geometry, Point, Rect, Relate};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::args::{DEFAULT_DIST_ERR_PCT, SpatialArgs, SpatialOperation};
use crate::cell::split_leaf_marker;
use crate::context::SpatialContext;
use crate::encoder::{DEFAULT_MAX_BYTES, GeometryEncoder, decode_geometry};
use crate::grid::{CoverOptions, GridType, PrefixGrid};
use crate::planner::render;
use crate::shape::{Shape, SpatialRelation, relate_rects};
use crate::{PrefixGridError, Result};

/// Value stored for one document field.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    /// Grid tokens, leaves carrying the leaf marker.
    Tokens(Vec<String>),
    /// A size-bounded binary geometry.
    Binary(Vec<u8>),
    BBox(Rect<f64>),
}

/// Matcher over stored values produced by [`IndexStrategy::build_filter`].
pub type Predicate = Box<dyn Fn(&StoredValue) -> bool + Send + Sync>;

pub trait IndexStrategy: Send + Sync {
    fn field_name(&self) -> &str;

    fn encode_for_index(&self, shape: &Geometry<f64>) -> Result<StoredValue>;

    fn build_filter(&self, args: &SpatialArgs) -> Result<Predicate>;

    /// Distance from `from` to the indexed shape, for scoring.
    fn distance_value(&self, _stored: &StoredValue, _from: Point<f64>) -> Result<f64> {
        Err(PrefixGridError::UnsupportedShape(format!(
            "distance values are not available for field {}",
            self.field_name()
        )))
    }
}

/// Strategy selection as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    PrefixTree {
        grid_type: GridType,
        #[serde(default)]
        max_levels: Option<usize>,
        #[serde(default)]
        dist_err_pct: Option<f64>,
    },
    Geometry {
        #[serde(default)]
        max_bytes: Option<usize>,
    },
    #[serde(rename = "bbox")]
    BBox,
}

impl StrategyConfig {
    pub fn build(&self, field: &str, ctx: &SpatialContext) -> Result<Box<dyn IndexStrategy>> {
        let strategy: Box<dyn IndexStrategy> = match self {
            StrategyConfig::PrefixTree {
                grid_type,
                max_levels,
                dist_err_pct,
            } => {
                let levels = max_levels.unwrap_or_else(|| grid_type.default_max_levels());
                let grid = PrefixGrid::new(ctx.clone(), *grid_type, levels)?;
                Box::new(
                    PrefixTreeStrategy::new(field, Arc::new(grid))
                        .with_dist_err_pct(dist_err_pct.unwrap_or(DEFAULT_DIST_ERR_PCT)),
                )
            }
            StrategyConfig::Geometry { max_bytes } => Box::new(GeometryStrategy::new(
                field,
                GeometryEncoder::new(max_bytes.unwrap_or(DEFAULT_MAX_BYTES)),
            )),
            StrategyConfig::BBox => Box::new(BBoxStrategy::new(field, ctx.clone())),
        };
        Ok(strategy)
    }
}

/// Indexes the grid cover of a shape.
///
/// Index-time covers keep the parents so a query cell at any level finds the
/// document by exact token. Query-time covers only keep terminal cells.
pub struct PrefixTreeStrategy {
    field: String,
    grid: Arc<PrefixGrid>,
    dist_err_pct: f64,
}

impl PrefixTreeStrategy {
    pub fn new(field: &str, grid: Arc<PrefixGrid>) -> Self {
        Self {
            field: field.to_string(),
            grid,
            dist_err_pct: DEFAULT_DIST_ERR_PCT,
        }
    }

    pub fn with_dist_err_pct(mut self, dist_err_pct: f64) -> Self {
        self.dist_err_pct = dist_err_pct;
        self
    }

    pub fn grid(&self) -> &PrefixGrid {
        &self.grid
    }

    fn level_for(&self, shape: &Geometry<f64>, args: Option<&SpatialArgs>) -> Result<usize> {
        let ctx = self.grid.context();
        let dist_err = match args {
            Some(args) => args.resolve_dist_err(ctx, self.dist_err_pct)?,
            None => crate::args::calc_distance_from_err_pct(shape, self.dist_err_pct, ctx)?,
        };
        Ok(self.grid.level_for_distance(dist_err))
    }
}

impl IndexStrategy for PrefixTreeStrategy {
    fn field_name(&self) -> &str {
        &self.field
    }

    fn encode_for_index(&self, shape: &Geometry<f64>) -> Result<StoredValue> {
        let level = self.level_for(shape, None)?;
        let cells = self
            .grid
            .cover(shape, level, CoverOptions::default().with_parents(true))?;
        Ok(StoredValue::Tokens(render(&cells)))
    }

    fn build_filter(&self, args: &SpatialArgs) -> Result<Predicate> {
        let level = self.level_for(&args.shape, Some(args))?;
        let query: Vec<String> = self
            .grid
            .cover(&args.shape, level, CoverOptions::default())?
            .iter()
            .map(|c| c.token().to_string())
            .collect();
        let operation = args.operation;
        Ok(Box::new(move |stored| {
            let StoredValue::Tokens(tokens) = stored else {
                return false;
            };
            let doc = terminal_tokens(tokens);
            match operation {
                SpatialOperation::Intersects => tokens_intersect(&doc, &query),
                SpatialOperation::IsDisjointTo => !tokens_intersect(&doc, &query),
                SpatialOperation::IsWithin => {
                    !doc.is_empty()
                        && doc.iter().all(|d| query.iter().any(|q| d.starts_with(q.as_str())))
                }
                SpatialOperation::Contains => {
                    !query.is_empty()
                        && query.iter().all(|q| doc.iter().any(|d| q.starts_with(d)))
                }
            }
        }))
    }
}

/// Tokens of a stored cover that are not ancestors of another stored token.
fn terminal_tokens(tokens: &[String]) -> Vec<&str> {
    let mut cells: Vec<(&str, bool)> = tokens.iter().map(|t| split_leaf_marker(t)).collect();
    cells.sort_unstable();
    cells
        .iter()
        .enumerate()
        .filter(|(i, (token, leaf))| {
            *leaf
                || cells
                    .get(i + 1)
                    .is_none_or(|(next, _)| !next.starts_with(token))
        })
        .map(|(_, (token, _))| *token)
        .collect()
}

fn tokens_intersect(doc: &[&str], query: &[String]) -> bool {
    doc.iter()
        .any(|d| query.iter().any(|q| d.starts_with(q.as_str()) || q.starts_with(d)))
}

/// Stores the geometry itself, shrunk to the encoder's budget.
pub struct GeometryStrategy {
    field: String,
    encoder: GeometryEncoder,
}

impl GeometryStrategy {
    pub fn new(field: &str, encoder: GeometryEncoder) -> Self {
        Self {
            field: field.to_string(),
            encoder,
        }
    }
}

impl IndexStrategy for GeometryStrategy {
    fn field_name(&self) -> &str {
        &self.field
    }

    fn encode_for_index(&self, shape: &Geometry<f64>) -> Result<StoredValue> {
        Ok(StoredValue::Binary(self.encoder.encode(shape)?.into_bytes()))
    }

    fn build_filter(&self, args: &SpatialArgs) -> Result<Predicate> {
        let query = args.shape.clone();
        let operation = args.operation;
        let field = self.field.clone();
        Ok(Box::new(move |stored| {
            let StoredValue::Binary(bytes) = stored else {
                return false;
            };
            let doc = match decode_geometry(bytes) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("undecodable geometry in field {}: {}", field, e);
                    return false;
                }
            };
            let matrix = doc.relate(&query);
            match operation {
                SpatialOperation::Intersects => matrix.is_intersects(),
                SpatialOperation::IsWithin => matrix.is_within(),
                SpatialOperation::Contains => matrix.is_contains(),
                SpatialOperation::IsDisjointTo => matrix.is_disjoint(),
            }
        }))
    }
}

/// Stores the bounding box only.
pub struct BBoxStrategy {
    field: String,
    ctx: SpatialContext,
}

impl BBoxStrategy {
    pub fn new(field: &str, ctx: SpatialContext) -> Self {
        Self {
            field: field.to_string(),
            ctx,
        }
    }
}

impl IndexStrategy for BBoxStrategy {
    fn field_name(&self) -> &str {
        &self.field
    }

    fn encode_for_index(&self, shape: &Geometry<f64>) -> Result<StoredValue> {
        shape.bounding_box().map(StoredValue::BBox).ok_or_else(|| {
            PrefixGridError::UnsupportedShape(format!(
                "empty shape has no bounding box for field {}",
                self.field
            ))
        })
    }

    fn build_filter(&self, args: &SpatialArgs) -> Result<Predicate> {
        let query = args.shape.bounding_box().ok_or_else(|| {
            PrefixGridError::UnsupportedShape("empty query shape".to_string())
        })?;
        let operation = args.operation;
        Ok(Box::new(move |stored| {
            let StoredValue::BBox(doc) = stored else {
                return false;
            };
            let relation = relate_rects(doc, &query);
            match operation {
                SpatialOperation::Intersects => relation.intersects(),
                SpatialOperation::IsDisjointTo => !relation.intersects(),
                SpatialOperation::IsWithin => relation == SpatialRelation::Within,
                SpatialOperation::Contains => {
                    relate_rects(&query, doc) == SpatialRelation::Within
                }
            }
        }))
    }

    fn distance_value(&self, stored: &StoredValue, from: Point<f64>) -> Result<f64> {
        match stored {
            StoredValue::BBox(rect) => Ok(self.ctx.distance(from, Point(Rect::center(*rect)))),
            _ => Err(PrefixGridError::UnsupportedShape(format!(
                "field {} does not hold a bounding box",
                self.field
            ))),
        }
    }
}
