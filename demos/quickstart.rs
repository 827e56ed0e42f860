use std::sync::Arc;

use prefix_grid::*;
use wkt::ToWkt;

fn main() -> Result<()> {
    let ctx = SpatialContext::geo().with_wrap_longitude(true);
    let grid = Arc::new(PrefixGrid::new(ctx.clone(), GridType::Quad, 16)?);

    // cover a point and a polygon
    let la = parse_wkt("POINT(-118.24368 34.05223)")?;
    let cells = grid.cover(&la, 11, CoverOptions::default())?;
    println!("los angeles at level 11: {:?}", render(&cells));

    let planner = GridQueryPlanner::new(Arc::clone(&grid));
    let california = parse_wkt(
        "POLYGON((-127.00390625 39.8125,-112.765625 39.98828125,-111.53515625 31.375,-125.94921875 30.14453125,-127.00390625 39.8125))",
    )?;
    let plan = planner.plan(&california, Precision::DistErrPct(DEFAULT_DIST_ERR_PCT))?;
    println!("{}", plan.summary());

    // index both shapes and run a query against them
    let processor = ShapeFieldProcessor::new(ctx.clone(), "wkt")
        .with_strategy(Box::new(PrefixTreeStrategy::new("quad", Arc::clone(&grid))))
        .with_strategy(StrategyConfig::Geometry { max_bytes: None }.build("geo", &ctx)?);
    let docs = processor.process_batch(vec![
        InputDocument::new("la").with_field("wkt", "POINT(-118.24368 34.05223)"),
        InputDocument::new("ca").with_field("wkt", &california.wkt_string()),
    ]);

    let args = SpatialArgs::parse("Intersects(POINT(-118.24368 34.05223))")?;
    let filter = PrefixTreeStrategy::new("quad", grid).build_filter(&args)?;
    for doc in &docs {
        println!("{} intersects query: {}", doc.id, filter(&doc.fields["quad"]));
    }

    let overlay = render_hierarchy(planner.grid(), "los angeles", &render(&cells), &GeoJsonRenderer)?;
    println!("{}", overlay);
    Ok(())
}
