//! Turns the WKT source field of incoming documents into indexed spatial
//! fields, one per configured strategy.
use std::collections::{BTreeMap, HashMap};

use geo::{Geometry, MultiPolygon, Point, Polygon};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::context::SpatialContext;
use crate::shape::{Shape, parse_wkt};
use crate::strategy::{IndexStrategy, StoredValue};
use crate::{PrefixGridError, Result};

/// A document as submitted, every field multi-valued text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputDocument {
    pub id: String,
    #[serde(default)]
    pub fields: HashMap<String, Vec<String>>,
}

impl InputDocument {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub id: String,
    pub source: InputDocument,
    /// Stored values keyed by strategy field name.
    pub fields: BTreeMap<String, StoredValue>,
    /// Center of the shape's bounding box.
    pub center: Option<Point<f64>>,
}

pub struct ShapeFieldProcessor {
    ctx: SpatialContext,
    source_field: String,
    strategies: Vec<Box<dyn IndexStrategy>>,
}

impl ShapeFieldProcessor {
    pub fn new(ctx: SpatialContext, source_field: &str) -> Self {
        Self {
            ctx,
            source_field: source_field.to_string(),
            strategies: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn IndexStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn source_field(&self) -> &str {
        &self.source_field
    }

    /// Processes one document.
    ///
    /// Returns `Ok(None)` when the shape does not parse; the document is
    /// dropped. A document without the source field passes through with no
    /// spatial fields.
    pub fn process(&self, doc: InputDocument) -> Result<Option<IndexedDocument>> {
        let wkt = match doc.fields.get(&self.source_field).map(Vec::as_slice) {
            None | Some([]) => {
                return Ok(Some(IndexedDocument {
                    id: doc.id.clone(),
                    source: doc,
                    fields: BTreeMap::new(),
                    center: None,
                }));
            }
            Some([wkt]) => wkt,
            Some(values) => {
                return Err(PrefixGridError::MalformedInput(format!(
                    "multiple values found for '{}' field: {:?}",
                    self.source_field, values
                )));
            }
        };

        let shape = match parse_wkt(wkt) {
            Ok(shape) => shape,
            Err(e) => {
                error!("Couldn't parse shape for doc {}: {}", doc.id, e);
                return Ok(None);
            }
        };
        let shape = collapse_polygons(self.ctx.normalize(shape));

        let mut fields = BTreeMap::new();
        for strategy in &self.strategies {
            fields.insert(
                strategy.field_name().to_string(),
                strategy.encode_for_index(&shape)?,
            );
        }
        debug!("indexed doc {} into {} fields", doc.id, fields.len());
        Ok(Some(IndexedDocument {
            id: doc.id.clone(),
            center: shape.center(),
            source: doc,
            fields,
        }))
    }

    /// Processes every document, logging and dropping the ones that fail.
    pub fn process_batch<I>(&self, docs: I) -> Vec<IndexedDocument>
    where
        I: IntoIterator<Item = InputDocument>,
    {
        docs.into_iter()
            .filter_map(|doc| {
                let id = doc.id.clone();
                match self.process(doc) {
                    Ok(indexed) => indexed,
                    Err(e) => {
                        warn!("skipping doc {}: {}", id, e);
                        None
                    }
                }
            })
            .collect()
    }
}

/// A collection made only of polygons becomes one multi-polygon. Anything
/// else is returned as is.
fn collapse_polygons(shape: Geometry<f64>) -> Geometry<f64> {
    let Geometry::GeometryCollection(gc) = shape else {
        return shape;
    };
    let all_polygonal = gc
        .iter()
        .all(|g| matches!(g, Geometry::Polygon(_) | Geometry::MultiPolygon(_)));
    if !all_polygonal || gc.0.is_empty() {
        return Geometry::GeometryCollection(gc);
    }
    let polygons: Vec<Polygon<f64>> = gc
        .into_iter()
        .flat_map(|g| match g {
            Geometry::Polygon(p) => vec![p],
            Geometry::MultiPolygon(mp) => mp.0,
            _ => vec![],
        })
        .collect();
    Geometry::MultiPolygon(MultiPolygon(polygons))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyConfig;
    use crate::grid::GridType;

    fn processor() -> ShapeFieldProcessor {
        let ctx = SpatialContext::geo().with_wrap_longitude(true);
        let configs = [
            (
                "geohash",
                StrategyConfig::PrefixTree {
                    grid_type: GridType::Geohash,
                    max_levels: Some(6),
                    dist_err_pct: None,
                },
            ),
            ("geo", StrategyConfig::Geometry { max_bytes: None }),
            ("bbox", StrategyConfig::BBox),
        ];
        configs
            .iter()
            .fold(ShapeFieldProcessor::new(ctx.clone(), "shape"), |p, (field, config)| {
                p.with_strategy(config.build(field, &ctx).unwrap())
            })
    }

    #[test]
    fn test_process_fills_every_field() {
        let doc = InputDocument::new("1").with_field("shape", "POINT(10 20)");
        let indexed = processor().process(doc).unwrap().unwrap();
        assert_eq!(indexed.id, "1");
        assert_eq!(
            indexed.fields.keys().collect::<Vec<_>>(),
            vec!["bbox", "geo", "geohash"]
        );
        assert_eq!(indexed.center, Some(Point::new(10.0, 20.0)));
        let StoredValue::Tokens(tokens) = &indexed.fields["geohash"] else {
            panic!("expected tokens");
        };
        assert_eq!(tokens.len(), 6);
    }

    #[test]
    fn test_missing_field_passes_through() {
        let doc = InputDocument::new("2").with_field("title", "no shape");
        let indexed = processor().process(doc.clone()).unwrap().unwrap();
        assert!(indexed.fields.is_empty());
        assert_eq!(indexed.source, doc);
    }

    #[test]
    fn test_bad_input() {
        let doc = InputDocument::new("3")
            .with_field("shape", "POINT(1 1)")
            .with_field("shape", "POINT(2 2)");
        assert!(matches!(
            processor().process(doc),
            Err(PrefixGridError::MalformedInput(_))
        ));

        let doc = InputDocument::new("4").with_field("shape", "POINT(1");
        assert_eq!(processor().process(doc).unwrap(), None);
    }

    #[test]
    fn test_process_batch_skips_failures() {
        let docs = vec![
            InputDocument::new("a").with_field("shape", "POINT(1 1)"),
            InputDocument::new("b").with_field("shape", "not wkt"),
            InputDocument::new("c")
                .with_field("shape", "POINT(1 1)")
                .with_field("shape", "POINT(1 1)"),
            InputDocument::new("d").with_field("shape", "POLYGON((0 0, 4 0, 4 4, 0 4, 0 0))"),
        ];
        let indexed = processor().process_batch(docs);
        let ids: Vec<&str> = indexed.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[test]
    fn test_collection_of_polygons_collapses() {
        let doc = InputDocument::new("5").with_field(
            "shape",
            "GEOMETRYCOLLECTION(POLYGON((0 0, 1 0, 1 1, 0 0)), POLYGON((5 5, 6 5, 6 6, 5 5)))",
        );
        let indexed = processor().process(doc).unwrap().unwrap();
        let StoredValue::Binary(bytes) = &indexed.fields["geo"] else {
            panic!("expected a binary value");
        };
        assert!(matches!(
            crate::encoder::decode_geometry(bytes).unwrap(),
            Geometry::MultiPolygon(ref mp) if mp.0.len() == 2
        ));
    }

    #[test]
    fn test_antimeridian_shape_is_split() {
        let doc = InputDocument::new("6")
            .with_field("shape", "POLYGON((170 -10, 190 -10, 190 10, 170 10, 170 -10))");
        let indexed = processor().process(doc).unwrap().unwrap();
        let StoredValue::BBox(bbox) = indexed.fields["bbox"] else {
            panic!("expected a bbox");
        };
        assert!(bbox.min().x < -179.999);
        assert!(bbox.max().x > 179.999);
    }
}
