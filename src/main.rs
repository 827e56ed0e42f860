//! # Prefix Grid Info Service
//!
//! A REST API service that decomposes a shape into prefix grid cells and
//! reports the resulting tokens, for inspecting how a geometry would be indexed.
//!
//! ## Features
//!
//! * Geohash and quad grids with configurable depth
//! * Shapes as WKT or looked up by country id in a sample data file
//! * Precision by distance error percentage
//! * Plain text token lists or GeoJSON grid overlays
//! * CORS support for web applications
//!
//! ## API Endpoints
//!
//! * `GET /grid?gridType=quad&geometry=POINT(1 2)` - Cover a shape
//! * `POST /grid` - Same, parameters as a form body
//!
//! ## Configuration
//!
//! Environment variables:
//! * `PREFIX_GRID_ADDR` - Listen address (default: 0.0.0.0:3000)
//! * `PREFIX_GRID_SAMPLE_DATA` - Tab-separated `id, name, wkt` file used for `country` lookups
//! * `RUST_LOG` - Log filter (default: info)
use axum::{
    Form, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use dashmap::DashMap;
use log::{debug, info};
use prefix_grid::{
    GeoJsonRenderer, GridQueryPlanner, GridType, Precision, PrefixGrid, SampleDataReader,
    SpatialContext, DEFAULT_DIST_ERR_PCT, parse_wkt, render, render_hierarchy,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use std::{collections::HashMap, sync::Arc};
use tower_http::cors::{Any, CorsLayer};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridParams {
    grid_type: Option<String>,
    depth: Option<usize>,
    geometry: Option<String>,
    country: Option<String>,
    name: Option<String>,
    dist_err_pct: Option<f64>,
    format: Option<String>,
    geo: Option<String>,
    norm_wrap_longitude: Option<String>,
    world_bounds: Option<String>,
}

/// Planners kept alive at once; requests past the cap get an uncached planner.
const MAX_CACHED_PLANNERS: usize = 64;

/// A grid identified by its parsed settings, so `geo=1` and `geo=true` share
/// one planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GridKey {
    grid_type: GridType,
    depth: usize,
    geo: bool,
    wrap_longitude: bool,
    world: [u64; 4],
}

impl GridKey {
    fn new(grid_type: GridType, depth: usize, ctx: &SpatialContext) -> Self {
        let world = ctx.world_bounds();
        Self {
            grid_type,
            depth,
            geo: ctx.is_geo(),
            wrap_longitude: ctx.wrap_longitude(),
            world: [
                world.min().x.to_bits(),
                world.min().y.to_bits(),
                world.max().x.to_bits(),
                world.max().y.to_bits(),
            ],
        }
    }
}

struct AppState {
    sample_data: Option<PathBuf>,
    planners: DashMap<GridKey, Arc<GridQueryPlanner>>,
}

enum GridInfo {
    Text(String),
    GeoJson { name: String, body: String },
}

impl IntoResponse for GridInfo {
    fn into_response(self) -> Response {
        match self {
            GridInfo::Text(body) => {
                ([(header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string())], body)
                    .into_response()
            }
            GridInfo::GeoJson { name, body } => (
                [
                    (header::CONTENT_TYPE, "application/geo+json".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}.geojson\"", name),
                    ),
                ],
                body,
            )
                .into_response(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr = std::env::var("PREFIX_GRID_ADDR").unwrap_or("0.0.0.0:3000".to_string());
    let sample_data = std::env::var("PREFIX_GRID_SAMPLE_DATA").ok().map(PathBuf::from);

    let shared_state = Arc::new(AppState {
        sample_data,
        planners: DashMap::new(),
    });

    let app = Router::new()
        .route("/grid", get(grid_get).post(grid_post))
        .with_state(Arc::clone(&shared_state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("grid info service listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn grid_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GridParams>,
) -> Result<GridInfo, (StatusCode, String)> {
    grid_info(&state, params)
}

async fn grid_post(
    State(state): State<Arc<AppState>>,
    Form(params): Form<GridParams>,
) -> Result<GridInfo, (StatusCode, String)> {
    grid_info(&state, params)
}

fn bad_request<E: ToString>(e: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}

fn planner_for(
    state: &AppState,
    params: &GridParams,
) -> Result<Arc<GridQueryPlanner>, (StatusCode, String)> {
    let grid_type: GridType = params
        .grid_type
        .as_deref()
        .ok_or_else(|| bad_request("missing parameter: 'gridType'"))?
        .parse()
        .map_err(bad_request)?;
    let depth = params.depth.unwrap_or(16);

    // the country outlines cross the antimeridian, so wrapping is on by default
    let mut ctx_params = vec![
        ("geo".to_string(), params.geo.clone().unwrap_or("true".to_string())),
        (
            "normWrapLongitude".to_string(),
            params
                .norm_wrap_longitude
                .clone()
                .unwrap_or("true".to_string()),
        ),
    ];
    if let Some(bounds) = &params.world_bounds {
        ctx_params.push(("worldBounds".to_string(), bounds.clone()));
    }

    let ctx = SpatialContext::from_params(&ctx_params.into_iter().collect::<HashMap<_, _>>())
        .map_err(bad_request)?;
    let key = GridKey::new(grid_type, depth, &ctx);
    if let Some(planner) = state.planners.get(&key) {
        return Ok(Arc::clone(&planner));
    }
    let grid = PrefixGrid::new(ctx, grid_type, depth).map_err(bad_request)?;
    let planner = Arc::new(GridQueryPlanner::new(Arc::new(grid)));
    if state.planners.len() < MAX_CACHED_PLANNERS {
        state.planners.insert(key, Arc::clone(&planner));
    } else {
        debug!("planner cache is full, not caching {:?}", key);
    }
    Ok(planner)
}

fn grid_info(state: &AppState, params: GridParams) -> Result<GridInfo, (StatusCode, String)> {
    let mut name = params.name.clone().filter(|n| !n.is_empty());
    let mut wkt = None;
    if let Some(country) = params.country.as_deref().filter(|c| c.len() == 3) {
        let path = state
            .sample_data
            .as_ref()
            .ok_or_else(|| bad_request("no sample data configured"))?;
        let data = SampleDataReader::from_path(path)
            .and_then(|reader| reader.find(country))
            .map_err(bad_request)?
            .ok_or_else(|| bad_request(format!("unable to find: {}", country)))?;
        name.get_or_insert(data.name);
        wkt = Some(data.shape);
    }

    let planner = planner_for(state, &params)?;
    let wkt = wkt
        .or(params.geometry)
        .ok_or_else(|| bad_request("missing parameter: 'geometry'"))?;
    let shape = planner.grid().context().normalize(parse_wkt(&wkt).map_err(bad_request)?);

    let dist_err_pct = params.dist_err_pct.unwrap_or(DEFAULT_DIST_ERR_PCT);
    let plan = planner
        .plan(&shape, Precision::DistErrPct(dist_err_pct))
        .map_err(bad_request)?;
    let tokens = render(&plan.leaf_cells());

    if params.format.as_deref() == Some("geojson") {
        let name = name.filter(|n| n.len() >= 2).unwrap_or_else(|| {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            format!("GeoJSON - {}", now)
        });
        let collection = render_hierarchy(planner.grid(), &name, &tokens, &GeoJsonRenderer)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        return Ok(GridInfo::GeoJson {
            name,
            body: collection.to_string(),
        });
    }

    Ok(GridInfo::Text(format!(
        "{}\n[{}]\n",
        plan.summary(),
        tokens.join(", ")
    )))
}
