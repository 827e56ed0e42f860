//! Hierarchical prefix grids and shape covers.
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use geo::{Coord, Point, Rect};
use lazy_static::lazy_static;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, split_leaf_marker};
use crate::context::SpatialContext;
use crate::shape::{Shape, SpatialRelation};
use crate::{PrefixGridError, Result};

const QUAD_ALPHABET: &[u8] = b"ABCD";
const GEOHASH_ALPHABET: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";
// longest hash the geohash codec handles, deeper cells are split locally
const GEOHASH_CODEC_LEVELS: usize = 12;

lazy_static! {
    static ref QUAD_INDEX: HashMap<u8, usize> = symbol_index(QUAD_ALPHABET);
    static ref GEOHASH_INDEX: HashMap<u8, usize> = symbol_index(GEOHASH_ALPHABET);
}

fn symbol_index(alphabet: &[u8]) -> HashMap<u8, usize> {
    alphabet.iter().enumerate().map(|(i, s)| (*s, i)).collect()
}

/// Branching scheme of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridType {
    /// 32-way split, tokens are geohashes. Geo contexts only.
    Geohash,
    /// 4-way split into quadrants `A` (north-west), `B` (north-east),
    /// `C` (south-west) and `D` (south-east).
    Quad,
}

impl GridType {
    pub fn alphabet(&self) -> &'static [u8] {
        match self {
            GridType::Geohash => GEOHASH_ALPHABET,
            GridType::Quad => QUAD_ALPHABET,
        }
    }

    pub fn branching_factor(&self) -> usize {
        self.alphabet().len()
    }

    /// Deepest level the grid can address.
    pub fn max_levels_possible(&self) -> usize {
        match self {
            GridType::Geohash => 24,
            GridType::Quad => 50,
        }
    }

    pub fn default_max_levels(&self) -> usize {
        match self {
            GridType::Geohash => 11,
            GridType::Quad => 12,
        }
    }

    fn symbol_index(&self, symbol: u8) -> Option<usize> {
        match self {
            GridType::Geohash => GEOHASH_INDEX.get(&symbol).copied(),
            GridType::Quad => QUAD_INDEX.get(&symbol).copied(),
        }
    }
}

impl FromStr for GridType {
    type Err = PrefixGridError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "geohash" => Ok(GridType::Geohash),
            "quad" => Ok(GridType::Quad),
            _ => Err(PrefixGridError::MalformedInput(format!(
                "unknown grid type: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridType::Geohash => f.write_str("geohash"),
            GridType::Quad => f.write_str("quad"),
        }
    }
}

/// How a cover treats cells that are not fully resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverOptions {
    /// Keep boundary cells at the target level. When false only cells lying
    /// inside the shape, or holding all of it at the target level, are kept.
    pub intersect: bool,
    /// Also emit every ancestor visited on the way down, as a non-leaf cell
    /// placed before its descendants.
    pub include_parents: bool,
    /// Replace a complete set of leaf siblings by their parent marked leaf.
    pub simplify: bool,
}

impl Default for CoverOptions {
    fn default() -> Self {
        Self {
            intersect: true,
            include_parents: false,
            simplify: true,
        }
    }
}

impl CoverOptions {
    /// `want_leaves` asks for terminal cells only; without it the ancestors
    /// are part of the cover too.
    pub fn new(want_intersect: bool, want_leaves: bool) -> Self {
        Self {
            intersect: want_intersect,
            include_parents: !want_leaves,
            simplify: true,
        }
    }

    pub fn within() -> Self {
        Self {
            intersect: false,
            ..Self::default()
        }
    }

    pub fn with_parents(mut self, include_parents: bool) -> Self {
        self.include_parents = include_parents;
        self
    }

    pub fn with_simplify(mut self, simplify: bool) -> Self {
        self.simplify = simplify;
        self
    }
}

/// A spatial prefix tree over the world of a [`SpatialContext`].
///
/// The grid is immutable once built; covers of the same shape at the same
/// level always produce the same tokens in the same order, which is what
/// makes index-time and query-time tokens comparable.
#[derive(Debug, Clone)]
pub struct PrefixGrid {
    ctx: SpatialContext,
    grid_type: GridType,
    max_levels: usize,
    // cell width and height per level, index 0 being the world
    level_w: Vec<f64>,
    level_h: Vec<f64>,
}

impl PrefixGrid {
    pub fn new(ctx: SpatialContext, grid_type: GridType, max_levels: usize) -> Result<Self> {
        let possible = grid_type.max_levels_possible();
        if max_levels == 0 || max_levels > possible {
            return Err(PrefixGridError::InvalidPrecision(format!(
                "max levels {} outside 1..={} for a {} grid",
                max_levels, possible, grid_type
            )));
        }
        if grid_type == GridType::Geohash && !ctx.is_geo() {
            return Err(PrefixGridError::Config(
                "a geohash grid requires a geo context".into(),
            ));
        }

        let world = ctx.world_bounds();
        let (level_w, level_h): (Vec<f64>, Vec<f64>) = (0..=max_levels)
            .map(|level| match grid_type {
                GridType::Quad => {
                    let div = 2f64.powi(level as i32);
                    (world.width() / div, world.height() / div)
                }
                GridType::Geohash => {
                    let bits = 5 * level as i32;
                    let lon_bits = (bits + 1) / 2;
                    let lat_bits = bits / 2;
                    (360.0 / 2f64.powi(lon_bits), 180.0 / 2f64.powi(lat_bits))
                }
            })
            .unzip();

        Ok(Self {
            ctx,
            grid_type,
            max_levels,
            level_w,
            level_h,
        })
    }

    pub fn context(&self) -> &SpatialContext {
        &self.ctx
    }

    pub fn grid_type(&self) -> GridType {
        self.grid_type
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Width and height of the cells at `level`.
    pub fn cell_size(&self, level: usize) -> Result<(f64, f64)> {
        self.check_level(level)?;
        Ok((self.level_w[level], self.level_h[level]))
    }

    /// Shallowest level whose cells are no wider nor taller than `dist`.
    ///
    /// A distance of zero (or anything not positive) asks for full precision.
    /// The result is never below 1 and never above the grid's max levels.
    pub fn level_for_distance(&self, dist: f64) -> usize {
        if !(dist > 0.0) {
            return self.max_levels;
        }
        (1..=self.max_levels)
            .find(|&level| self.level_w[level] <= dist && self.level_h[level] <= dist)
            .unwrap_or(self.max_levels)
    }

    /// The root cell, covering the whole world.
    pub fn world_cell(&self) -> Cell {
        Cell::new(String::new(), self.ctx.world_bounds())
    }

    /// Decodes a token (optionally carrying the leaf marker) back into its cell.
    pub fn cell_for_token(&self, token: &str) -> Result<Cell> {
        let (bare, leaf) = split_leaf_marker(token);
        if bare.len() > self.max_levels {
            return Err(PrefixGridError::InvalidPrecision(format!(
                "token {} is deeper than max levels {}",
                token, self.max_levels
            )));
        }
        let mut indexes = Vec::with_capacity(bare.len());
        for symbol in bare.bytes() {
            let index = self.grid_type.symbol_index(symbol).ok_or_else(|| {
                PrefixGridError::MalformedInput(format!(
                    "invalid symbol {:?} in {} token {}",
                    symbol as char, self.grid_type, token
                ))
            })?;
            indexes.push(index);
        }

        let rect = match self.grid_type {
            GridType::Quad => indexes
                .iter()
                .enumerate()
                .fold(self.ctx.world_bounds(), |rect, (level, index)| {
                    self.quad_child_rect(&rect, level + 1, *index)
                }),
            GridType::Geohash if bare.is_empty() => self.ctx.world_bounds(),
            GridType::Geohash => {
                let head = bare.len().min(GEOHASH_CODEC_LEVELS);
                let rect = geohash::decode_bbox(&bare[..head])?;
                indexes[head..]
                    .iter()
                    .enumerate()
                    .fold(rect, |rect, (i, index)| {
                        geohash_child_rect(&rect, head + i, *index)
                    })
            }
        };

        let mut cell = Cell::new(bare.to_string(), rect);
        if leaf {
            cell.set_leaf();
        }
        Ok(cell)
    }

    /// The cell at `level` that holds `point`.
    pub fn cell_for_point(&self, point: Point<f64>, level: usize) -> Result<Cell> {
        self.check_level(level)?;
        if point.relate_rect(&self.ctx.world_bounds()) == SpatialRelation::Disjoint {
            return Err(PrefixGridError::UnsupportedShape(format!(
                "point {:?} is outside the world",
                point
            )));
        }
        match self.grid_type {
            GridType::Quad => {
                let mut cell = self.world_cell();
                for child_level in 1..=level {
                    let rect = cell.rect();
                    let mid_x = rect.min().x + self.level_w[child_level];
                    let mid_y = rect.min().y + self.level_h[child_level];
                    let index = match (point.x() >= mid_x, point.y() >= mid_y) {
                        (false, true) => 0,
                        (true, true) => 1,
                        (false, false) => 2,
                        (true, false) => 3,
                    };
                    let mut token = cell.token().to_string();
                    token.push(QUAD_ALPHABET[index] as char);
                    cell = Cell::new(token, self.quad_child_rect(&rect, child_level, index));
                }
                Ok(cell)
            }
            GridType::Geohash if level == 0 => Ok(self.world_cell()),
            GridType::Geohash => {
                let head = level.min(GEOHASH_CODEC_LEVELS);
                let mut token = geohash::encode(point.0, head)?;
                let mut rect = geohash::decode_bbox(&token)?;
                for position in head..level {
                    let index = geohash_child_index(&rect, position, point);
                    rect = geohash_child_rect(&rect, position, index);
                    token.push(GEOHASH_ALPHABET[index] as char);
                }
                Ok(Cell::new(token, rect))
            }
        }
    }

    /// The children of `cell`, in alphabet order.
    pub fn sub_cells(&self, cell: &Cell) -> Result<Vec<Cell>> {
        if cell.level() >= self.max_levels {
            return Ok(vec![]);
        }
        let alphabet = self.grid_type.alphabet();
        match self.grid_type {
            GridType::Quad => {
                let rect = cell.rect();
                Ok(alphabet
                    .iter()
                    .enumerate()
                    .map(|(index, symbol)| {
                        let mut token = String::with_capacity(cell.level() + 1);
                        token.push_str(cell.token());
                        token.push(*symbol as char);
                        Cell::new(token, self.quad_child_rect(&rect, cell.level() + 1, index))
                    })
                    .collect())
            }
            GridType::Geohash => {
                let parent = cell.rect();
                alphabet
                    .iter()
                    .enumerate()
                    .map(|(index, symbol)| {
                        let mut token = String::with_capacity(cell.level() + 1);
                        token.push_str(cell.token());
                        token.push(*symbol as char);
                        let rect = if cell.level() < GEOHASH_CODEC_LEVELS {
                            geohash::decode_bbox(&token)?
                        } else {
                            geohash_child_rect(&parent, cell.level(), index)
                        };
                        Ok(Cell::new(token, rect))
                    })
                    .collect()
            }
        }
    }

    /// Computes the cells approximating `shape` down to `detail_level`.
    ///
    /// Cells lying inside the shape become leaves at whatever level they are
    /// found. Cells still crossing the shape's boundary at `detail_level` are
    /// kept as non-leaf cells in intersect mode and dropped otherwise; a cell
    /// holding the entire shape at that level is a leaf. Disjoint cells are
    /// pruned, so a shape outside the world yields an empty cover.
    pub fn cover<S: Shape + ?Sized>(
        &self,
        shape: &S,
        detail_level: usize,
        options: CoverOptions,
    ) -> Result<Vec<Cell>> {
        if detail_level > self.max_levels {
            return Err(PrefixGridError::InvalidPrecision(format!(
                "detail level {} exceeds max levels {}",
                detail_level, self.max_levels
            )));
        }
        let mut cells = vec![];
        if shape.is_empty() {
            return Ok(cells);
        }

        let mut root = self.world_cell();
        if detail_level == 0 {
            let relation = shape.relate_rect(&root.rect());
            if relation.intersects() {
                root.set_relation(relation);
                if matches!(relation, SpatialRelation::Within | SpatialRelation::Contains) {
                    root.set_leaf();
                }
                if root.is_leaf() || options.intersect {
                    cells.push(root);
                }
            }
            return Ok(cells);
        }

        self.recursive_cover(&root, shape, detail_level, options, &mut cells)?;
        debug!(
            "{} grid cover at level {}: {} cells, {} leaves",
            self.grid_type,
            detail_level,
            cells.len(),
            cells.iter().filter(|c| c.is_leaf()).count()
        );
        Ok(cells)
    }

    /// Returns true when `cell` ended up as a leaf in `result`.
    fn recursive_cover<S: Shape + ?Sized>(
        &self,
        cell: &Cell,
        shape: &S,
        detail_level: usize,
        options: CoverOptions,
        result: &mut Vec<Cell>,
    ) -> Result<bool> {
        if cell.is_leaf() {
            result.push(cell.clone());
            return Ok(true);
        }
        if cell.level() == detail_level {
            if options.intersect {
                result.push(cell.clone());
            }
            return Ok(false);
        }

        let parent_index = if options.include_parents && cell.level() > 0 {
            result.push(cell.clone());
            Some(result.len() - 1)
        } else {
            None
        };

        let children = self.relating_sub_cells(cell, shape, detail_level)?;
        let first_child = result.len();
        let mut leaves = 0;
        for child in &children {
            if self.recursive_cover(child, shape, detail_level, options, result)? {
                leaves += 1;
            }
        }

        // no descendant made it into the cover, drop the ancestor as well
        if result.len() == first_child {
            if let Some(index) = parent_index {
                result.truncate(index);
            }
            return Ok(false);
        }

        // every child resolved to exactly one leaf entry
        if options.simplify && cell.level() > 0 && leaves == self.grid_type.branching_factor() {
            result.truncate(first_child);
            match parent_index {
                Some(index) => result[index].set_leaf(),
                None => {
                    let mut parent = cell.clone();
                    parent.set_leaf();
                    result.push(parent);
                }
            }
            return Ok(true);
        }
        Ok(false)
    }

    /// Children of `cell` that touch `shape`, tagged with their relation.
    fn relating_sub_cells<S: Shape + ?Sized>(
        &self,
        cell: &Cell,
        shape: &S,
        detail_level: usize,
    ) -> Result<Vec<Cell>> {
        let child_level = cell.level() + 1;
        let mut children = self.sub_cells(cell)?;
        children.retain_mut(|child| {
            let relation = shape.relate_rect(&child.rect());
            if relation == SpatialRelation::Disjoint {
                return false;
            }
            child.set_relation(relation);
            if relation == SpatialRelation::Within
                || (relation == SpatialRelation::Contains && child_level == detail_level)
            {
                child.set_leaf();
            }
            true
        });
        Ok(children)
    }

    /// Quadrant `index` of `parent`, a cell at `child_level - 1`. Edges are
    /// taken from the parent so children partition it exactly.
    fn quad_child_rect(&self, parent: &Rect<f64>, child_level: usize, index: usize) -> Rect<f64> {
        let (min, max) = (parent.min(), parent.max());
        let mid_x = min.x + self.level_w[child_level];
        let mid_y = min.y + self.level_h[child_level];
        let (lo, hi) = match index {
            0 => (Coord { x: min.x, y: mid_y }, Coord { x: mid_x, y: max.y }),
            1 => (Coord { x: mid_x, y: mid_y }, Coord { x: max.x, y: max.y }),
            2 => (Coord { x: min.x, y: min.y }, Coord { x: mid_x, y: mid_y }),
            _ => (Coord { x: mid_x, y: min.y }, Coord { x: max.x, y: mid_y }),
        };
        Rect::new(lo, hi)
    }

    fn check_level(&self, level: usize) -> Result<()> {
        if level > self.max_levels {
            return Err(PrefixGridError::InvalidPrecision(format!(
                "level {} exceeds max levels {}",
                level, self.max_levels
            )));
        }
        Ok(())
    }
}

/// Child `index` of a geohash cell whose token has `position` symbols.
///
/// A symbol holds five bits that alternate between longitude and latitude
/// over the whole hash, longitude first, each bit halving the range.
fn geohash_child_rect(parent: &Rect<f64>, position: usize, index: usize) -> Rect<f64> {
    let (mut min, mut max) = (parent.min(), parent.max());
    for bit in 0..5 {
        let set = (index >> (4 - bit)) & 1 == 1;
        if (position * 5 + bit) % 2 == 0 {
            let mid = (min.x + max.x) / 2.0;
            if set {
                min.x = mid;
            } else {
                max.x = mid;
            }
        } else {
            let mid = (min.y + max.y) / 2.0;
            if set {
                min.y = mid;
            } else {
                max.y = mid;
            }
        }
    }
    Rect::new(min, max)
}

/// Symbol index of the child of a geohash cell holding `point`.
fn geohash_child_index(parent: &Rect<f64>, position: usize, point: Point<f64>) -> usize {
    let (mut min, mut max) = (parent.min(), parent.max());
    let mut index = 0;
    for bit in 0..5 {
        index <<= 1;
        if (position * 5 + bit) % 2 == 0 {
            let mid = (min.x + max.x) / 2.0;
            if point.x() >= mid {
                index |= 1;
                min.x = mid;
            } else {
                max.x = mid;
            }
        } else {
            let mid = (min.y + max.y) / 2.0;
            if point.y() >= mid {
                index |= 1;
                min.y = mid;
            } else {
                max.y = mid;
            }
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, polygon};

    fn quad(max_levels: usize) -> PrefixGrid {
        PrefixGrid::new(SpatialContext::geo(), GridType::Quad, max_levels).unwrap()
    }

    fn geohash_grid(max_levels: usize) -> PrefixGrid {
        PrefixGrid::new(SpatialContext::geo(), GridType::Geohash, max_levels).unwrap()
    }

    fn tokens(cells: &[Cell]) -> Vec<String> {
        cells.iter().map(|c| c.token_string()).collect()
    }

    #[test]
    fn test_new_rejects_bad_levels() {
        assert!(matches!(
            PrefixGrid::new(SpatialContext::geo(), GridType::Geohash, 25),
            Err(PrefixGridError::InvalidPrecision(_))
        ));
        assert!(matches!(
            PrefixGrid::new(SpatialContext::geo(), GridType::Quad, 0),
            Err(PrefixGridError::InvalidPrecision(_))
        ));
        let flat = SpatialContext::cartesian(Rect::new(
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 100.0, y: 100.0 },
        ));
        assert!(matches!(
            PrefixGrid::new(flat, GridType::Geohash, 5),
            Err(PrefixGridError::Config(_))
        ));
    }

    #[test]
    fn test_cell_sizes() {
        let grid = quad(16);
        assert_eq!(grid.cell_size(0).unwrap(), (360.0, 180.0));
        assert_eq!(grid.cell_size(2).unwrap(), (90.0, 45.0));

        let grid = geohash_grid(12);
        assert_eq!(grid.cell_size(1).unwrap(), (45.0, 45.0));
        assert_eq!(grid.cell_size(2).unwrap(), (11.25, 5.625));
        assert!(grid.cell_size(13).is_err());
    }

    #[test]
    fn test_level_for_distance() {
        let grid = quad(16);
        assert_eq!(grid.level_for_distance(100.0), 2);
        assert_eq!(grid.level_for_distance(1000.0), 1);
        assert_eq!(grid.level_for_distance(0.0), 16);
        assert_eq!(grid.level_for_distance(1e-12), 16);

        let grid = geohash_grid(12);
        assert_eq!(grid.level_for_distance(50.0), 1);
        assert_eq!(grid.level_for_distance(20.0), 2);
    }

    #[test]
    fn test_quad_sub_cells_partition_parent() {
        let grid = quad(4);
        let children = grid.sub_cells(&grid.world_cell()).unwrap();
        assert_eq!(tokens(&children), vec!["A", "B", "C", "D"]);
        assert_eq!(
            children[0].rect(),
            Rect::new(Coord { x: -180.0, y: 0.0 }, Coord { x: 0.0, y: 90.0 })
        );
        assert_eq!(
            children[3].rect(),
            Rect::new(Coord { x: 0.0, y: -90.0 }, Coord { x: 180.0, y: 0.0 })
        );
        let area: f64 = children
            .iter()
            .map(|c| c.rect().width() * c.rect().height())
            .sum();
        assert_eq!(area, 360.0 * 180.0);
    }

    #[test]
    fn test_cell_for_token() {
        let grid = quad(8);
        let cell = grid.cell_for_token("AD+").unwrap();
        assert!(cell.is_leaf());
        assert_eq!(cell.token(), "AD");
        assert_eq!(
            cell.rect(),
            Rect::new(Coord { x: -90.0, y: 0.0 }, Coord { x: 0.0, y: 45.0 })
        );

        assert!(matches!(
            grid.cell_for_token("AE"),
            Err(PrefixGridError::MalformedInput(_))
        ));
        assert!(matches!(
            grid.cell_for_token("AAAAAAAAA"),
            Err(PrefixGridError::InvalidPrecision(_))
        ));

        let grid = geohash_grid(8);
        assert_eq!(grid.cell_for_token("").unwrap().rect(), grid.world_cell().rect());
        assert!(matches!(
            grid.cell_for_token("9qa"),
            Err(PrefixGridError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_cell_for_point() {
        let la = Point::new(-118.24368, 34.05223);

        let grid = geohash_grid(12);
        let cell = grid.cell_for_point(la, 5).unwrap();
        assert_eq!(cell.token(), geohash::encode(la.0, 5).unwrap());
        assert!(cell.token().starts_with("9q5"));

        let grid = quad(12);
        let cell = grid.cell_for_point(la, 7).unwrap();
        assert_eq!(cell.level(), 7);
        assert!(cell.token().starts_with('A'));
        assert_eq!(grid.cell_for_token(cell.token()).unwrap().rect(), cell.rect());

        assert!(grid.cell_for_point(Point::new(200.0, 0.0), 3).is_err());
    }

    #[test]
    fn test_cover_point_is_single_leaf() {
        let la = Point::new(-118.24368, 34.05223);
        for grid in [quad(16), geohash_grid(12)] {
            let cells = grid.cover(&la, 11, CoverOptions::default()).unwrap();
            assert_eq!(cells.len(), 1);
            assert!(cells[0].is_leaf());
            assert_eq!(cells[0].level(), 11);
            assert_eq!(cells[0].relation(), Some(SpatialRelation::Contains));
        }
    }

    #[test]
    fn test_cover_rejects_deep_level() {
        let grid = quad(8);
        assert!(matches!(
            grid.cover(&Point::new(0.0, 0.0), 9, CoverOptions::default()),
            Err(PrefixGridError::InvalidPrecision(_))
        ));
    }

    #[test]
    fn test_cover_outside_world_is_empty() {
        let grid = quad(8);
        let far = Rect::new(Coord { x: 500.0, y: 0.0 }, Coord { x: 600.0, y: 10.0 });
        assert!(grid.cover(&far, 5, CoverOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_cover_rect_aligned_with_cell() {
        let grid = quad(8);
        // exactly quadrant A
        let rect = Rect::new(Coord { x: -180.0, y: 0.0 }, Coord { x: 0.0, y: 90.0 });
        let cells = grid.cover(&rect, 3, CoverOptions::within()).unwrap();
        assert_eq!(tokens(&cells), vec!["A+"]);

        // intersect mode adds the non-leaf cells along the shared edges
        let cells = grid.cover(&rect, 3, CoverOptions::default()).unwrap();
        assert_eq!(cells[0].token_string(), "A+");
        assert!(cells[1..].iter().all(|c| !c.is_leaf() && c.level() == 3));
    }

    #[test]
    fn test_cover_simplify_collapses_siblings() {
        let grid = quad(8);
        // center of quadrant A touches all four of its children
        let center = Point::new(-90.0, 45.0);

        let cells = grid
            .cover(&center, 2, CoverOptions::default().with_simplify(false))
            .unwrap();
        assert_eq!(tokens(&cells), vec!["AA+", "AB+", "AC+", "AD+"]);

        let cells = grid.cover(&center, 2, CoverOptions::default()).unwrap();
        assert_eq!(tokens(&cells), vec!["A+"]);
    }

    #[test]
    fn test_cover_with_parents() {
        let grid = quad(8);
        let la = Point::new(-118.24368, 34.05223);
        let cells = grid
            .cover(&la, 4, CoverOptions::new(true, false))
            .unwrap();
        assert_eq!(cells.len(), 4);
        for (i, cell) in cells.iter().enumerate() {
            assert_eq!(cell.level(), i + 1);
            assert_eq!(cell.is_leaf(), i == 3);
        }
        assert!(cells[0].is_prefix_of(&cells[3]));
    }

    #[test]
    fn test_within_cover_keeps_only_ancestors_of_leaves() {
        let grid = quad(8);
        let square = Geometry::Polygon(polygon![
            (x: 1.0, y: 1.0),
            (x: 60.0, y: 1.0),
            (x: 60.0, y: 60.0),
            (x: 1.0, y: 60.0),
            (x: 1.0, y: 1.0),
        ]);
        let options = CoverOptions::new(false, false);

        // no cell down to level 3 fits inside the square
        assert!(grid.cover(&square, 3, options).unwrap().is_empty());

        for level in 4..=6 {
            let cells = grid.cover(&square, level, options).unwrap();
            let leaves: Vec<&Cell> = cells.iter().filter(|c| c.is_leaf()).collect();
            assert!(!leaves.is_empty(), "level {}", level);
            for cell in cells.iter().filter(|c| !c.is_leaf()) {
                assert!(
                    leaves.iter().any(|leaf| cell.is_prefix_of(leaf)),
                    "{} has no leaf below it at level {}",
                    cell,
                    level
                );
            }
        }
    }

    #[test]
    fn test_geohash_beyond_codec_levels() {
        let grid = geohash_grid(24);
        let la = Point::new(-118.24368, 34.05223);
        let codec = geohash::encode(la.0, 12).unwrap();

        for level in [13, 16, 20] {
            let cells = grid.cover(&la, level, CoverOptions::default()).unwrap();
            assert_eq!(cells.len(), 1, "level {}", level);
            let cell = &cells[0];
            assert!(cell.is_leaf());
            assert_eq!(cell.level(), level);
            assert!(cell.token().starts_with(&codec));

            let by_point = grid.cell_for_point(la, level).unwrap();
            assert_eq!(by_point.token(), cell.token());
            assert_eq!(by_point.rect(), cell.rect());
            assert_eq!(grid.cell_for_token(&cell.token_string()).unwrap().rect(), cell.rect());
            assert_eq!(la.relate_rect(&cell.rect()), SpatialRelation::Contains);
        }

        // children of a full length geohash split it into 32 equal parts
        let parent = grid.cell_for_token(&codec).unwrap();
        let children = grid.sub_cells(&parent).unwrap();
        assert_eq!(children.len(), 32);
        let (w, h) = grid.cell_size(13).unwrap();
        for child in &children {
            assert!((child.rect().width() - w).abs() < 1e-12);
            assert!((child.rect().height() - h).abs() < 1e-12);
            assert_eq!(
                parent.rect().relate_rect(&child.rect()),
                SpatialRelation::Within
            );
            assert_eq!(
                grid.cell_for_token(child.token()).unwrap().rect(),
                child.rect()
            );
        }
    }

    #[test]
    fn test_cover_level_zero() {
        let grid = quad(8);
        let cells = grid
            .cover(&Point::new(1.0, 1.0), 0, CoverOptions::default())
            .unwrap();
        assert_eq!(tokens(&cells), vec!["+"]);
    }

    #[test]
    fn test_grid_type_from_str() {
        assert_eq!("quad".parse::<GridType>().unwrap(), GridType::Quad);
        assert_eq!("geohash".parse::<GridType>().unwrap(), GridType::Geohash);
        assert!("hex".parse::<GridType>().is_err());
        assert_eq!(GridType::Geohash.branching_factor(), 32);
    }
}
