//! Grid cover and encoder benchmarks.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use geo::{Geometry, LineString, Point, Polygon};
use prefix_grid::{CoverOptions, GeometryEncoder, GridType, PrefixGrid, SpatialContext};

/// Regular polygon with `n` vertices around `(cx, cy)`.
fn ring(cx: f64, cy: f64, r: f64, n: usize) -> Geometry<f64> {
    let mut coords: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let a = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
            (cx + r * a.cos(), cy + r * a.sin())
        })
        .collect();
    coords.push(coords[0]);
    Geometry::Polygon(Polygon::new(LineString::from(coords), vec![]))
}

fn bench_cover(c: &mut Criterion) {
    let mut group = c.benchmark_group("cover");
    let shape = ring(10.0, 45.0, 4.0, 64);
    let point = Point::new(-118.24368, 34.05223);

    for grid_type in [GridType::Quad, GridType::Geohash] {
        let grid = PrefixGrid::new(SpatialContext::geo(), grid_type, 12).unwrap();

        group.bench_with_input(BenchmarkId::new("point", grid_type), &grid, |b, grid| {
            b.iter(|| grid.cover(black_box(&point), 12, CoverOptions::default()).unwrap())
        });

        let levels: &[usize] = match grid_type {
            GridType::Quad => &[6, 8, 10],
            GridType::Geohash => &[3, 4],
        };
        for &level in levels {
            group.bench_with_input(
                BenchmarkId::new(format!("polygon/{}", grid_type), level),
                &level,
                |b, &level| {
                    b.iter(|| {
                        grid.cover(
                            black_box(&shape),
                            level,
                            CoverOptions::default().with_parents(true),
                        )
                        .unwrap()
                    })
                },
            );
        }
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let encoder = GeometryEncoder::default();
    let small = ring(0.0, 0.0, 1.0, 100);
    let large = ring(0.0, 0.0, 1.0, 5000);

    c.bench_function("encode/small", |b| {
        b.iter(|| encoder.encode(black_box(&small)).unwrap())
    });
    c.bench_function("encode/simplified", |b| {
        b.iter(|| encoder.encode(black_box(&large)).unwrap())
    });
}

criterion_group!(benches, bench_cover, bench_encode);
criterion_main!(benches);
