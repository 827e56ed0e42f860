//! Turning precision requests into covers, and covers into tokens or
//! overlays.
use std::sync::Arc;

use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use log::info;

use crate::args::calc_distance_from_err_pct;
use crate::cell::Cell;
use crate::grid::{CoverOptions, PrefixGrid};
use crate::shape::Shape;
use crate::{PrefixGridError, Result};

/// How deep to decompose a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Precision {
    /// An explicit grid level.
    Depth(usize),
    /// A fraction of the shape's size, see [`calc_distance_from_err_pct`].
    DistErrPct(f64),
    /// An absolute positional error in world units.
    DistErr(f64),
}

/// Outcome of [`GridQueryPlanner::plan`].
#[derive(Debug, Clone)]
pub struct GridPlan {
    pub detail_level: usize,
    pub cells: Vec<Cell>,
}

impl GridPlan {
    pub fn leaf_cells(&self) -> Vec<Cell> {
        self.cells.iter().filter(|c| c.is_leaf()).cloned().collect()
    }

    /// Level of the coarsest leaf, `None` without leaves.
    pub fn biggest_leaf_level(&self) -> Option<usize> {
        self.cells
            .iter()
            .filter(|c| c.is_leaf())
            .map(|c| c.level())
            .min()
    }

    pub fn summary(&self) -> String {
        let leaves = self.cells.iter().filter(|c| c.is_leaf()).count();
        let biggest = self
            .biggest_leaf_level()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "none".to_string());
        format!(
            "Using detail level {} (biggest is {}) yielding {} leaf tokens, {} total.",
            self.detail_level,
            biggest,
            leaves,
            self.cells.len()
        )
    }
}

pub struct GridQueryPlanner {
    grid: Arc<PrefixGrid>,
}

impl GridQueryPlanner {
    pub fn new(grid: Arc<PrefixGrid>) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> &PrefixGrid {
        &self.grid
    }

    pub fn resolve_level<S: Shape + ?Sized>(&self, shape: &S, precision: Precision) -> Result<usize> {
        match precision {
            Precision::Depth(depth) if depth > self.grid.max_levels() => {
                Err(PrefixGridError::InvalidPrecision(format!(
                    "depth {} exceeds max levels {}",
                    depth,
                    self.grid.max_levels()
                )))
            }
            Precision::Depth(depth) => Ok(depth),
            Precision::DistErr(dist_err) => Ok(self.grid.level_for_distance(dist_err)),
            Precision::DistErrPct(pct) => {
                let dist_err = calc_distance_from_err_pct(shape, pct, self.grid.context())?;
                Ok(self.grid.level_for_distance(dist_err))
            }
        }
    }

    /// Resolves the level and covers `shape` with parents and sibling
    /// simplification, which is the layout an index stores.
    pub fn plan<S: Shape + ?Sized>(&self, shape: &S, precision: Precision) -> Result<GridPlan> {
        let detail_level = self.resolve_level(shape, precision)?;
        let cells = self.grid.cover(
            shape,
            detail_level,
            CoverOptions::default().with_parents(true),
        )?;
        let plan = GridPlan {
            detail_level,
            cells,
        };
        info!("{}", plan.summary());
        Ok(plan)
    }
}

/// Token strings of `cells`, in order, leaves suffixed with the leaf marker.
pub fn render(cells: &[Cell]) -> Vec<String> {
    cells.iter().map(|c| c.token_string()).collect()
}

/// Builds a visual document out of decoded cells.
pub trait HierarchyRenderer {
    type Output;

    fn render(&self, name: &str, cells: &[Cell]) -> Self::Output;
}

/// Decodes `tokens` with `grid` and hands the cells to `renderer`.
pub fn render_hierarchy<R: HierarchyRenderer>(
    grid: &PrefixGrid,
    name: &str,
    tokens: &[String],
    renderer: &R,
) -> Result<R::Output> {
    let cells = tokens
        .iter()
        .map(|t| grid.cell_for_token(t))
        .collect::<Result<Vec<Cell>>>()?;
    Ok(renderer.render(name, &cells))
}

/// Renders cells as a GeoJSON feature collection, one rectangle per cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonRenderer;

impl HierarchyRenderer for GeoJsonRenderer {
    type Output = FeatureCollection;

    fn render(&self, name: &str, cells: &[Cell]) -> FeatureCollection {
        let features = cells
            .iter()
            .map(|cell| {
                let mut properties = JsonObject::new();
                properties.insert("token".to_string(), JsonValue::from(cell.token()));
                properties.insert("level".to_string(), JsonValue::from(cell.level()));
                properties.insert("leaf".to_string(), JsonValue::from(cell.is_leaf()));
                Feature {
                    bbox: None,
                    geometry: Some(geojson::Geometry::new(geojson::Value::from(
                        &cell.rect().to_polygon(),
                    ))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        let mut foreign_members = JsonObject::new();
        foreign_members.insert("name".to_string(), JsonValue::from(name));
        FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign_members),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SpatialContext;
    use crate::grid::GridType;
    use geo::{Coord, Point, Rect};

    fn planner(grid_type: GridType, max_levels: usize) -> GridQueryPlanner {
        GridQueryPlanner::new(Arc::new(
            PrefixGrid::new(SpatialContext::geo(), grid_type, max_levels).unwrap(),
        ))
    }

    #[test]
    fn test_resolve_level() {
        let planner = planner(GridType::Quad, 16);
        let p = Point::new(10.0, 10.0);
        assert_eq!(planner.resolve_level(&p, Precision::Depth(7)).unwrap(), 7);
        assert!(matches!(
            planner.resolve_level(&p, Precision::Depth(17)),
            Err(PrefixGridError::InvalidPrecision(_))
        ));
        assert_eq!(planner.resolve_level(&p, Precision::DistErr(100.0)).unwrap(), 2);
        // points resolve to full precision
        assert_eq!(
            planner.resolve_level(&p, Precision::DistErrPct(0.025)).unwrap(),
            16
        );

        let rect = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 40.0, y: 40.0 });
        let coarse = planner.resolve_level(&rect, Precision::DistErrPct(0.5)).unwrap();
        let fine = planner.resolve_level(&rect, Precision::DistErrPct(0.01)).unwrap();
        assert!(fine > coarse);
    }

    #[test]
    fn test_plan_summary() {
        let planner = planner(GridType::Quad, 16);
        let plan = planner
            .plan(&Point::new(-118.24368, 34.05223), Precision::Depth(11))
            .unwrap();
        assert_eq!(plan.cells.len(), 11);
        assert_eq!(plan.leaf_cells().len(), 1);
        assert_eq!(plan.biggest_leaf_level(), Some(11));
        assert_eq!(
            plan.summary(),
            "Using detail level 11 (biggest is 11) yielding 1 leaf tokens, 11 total."
        );
    }

    #[test]
    fn test_render_and_hierarchy() {
        let planner = planner(GridType::Geohash, 8);
        let rect = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 10.0 });
        let cells = planner.grid().cover(&rect, 2, CoverOptions::default()).unwrap();
        let tokens = render(&cells);
        assert_eq!(tokens.len(), cells.len());
        assert!(tokens.iter().zip(&cells).all(|(t, c)| t.ends_with('+') == c.is_leaf()));

        let collection = render_hierarchy(planner.grid(), "demo", &tokens, &GeoJsonRenderer).unwrap();
        assert_eq!(collection.features.len(), tokens.len());
        let first = &collection.features[0];
        let props = first.properties.as_ref().unwrap();
        assert_eq!(props["token"], JsonValue::from(cells[0].token()));
        assert_eq!(props["leaf"], JsonValue::from(cells[0].is_leaf()));
        assert_eq!(
            collection.foreign_members.as_ref().unwrap()["name"],
            JsonValue::from("demo")
        );

        assert!(render_hierarchy(planner.grid(), "bad", &["zz!".to_string()], &GeoJsonRenderer).is_err());
    }
}
