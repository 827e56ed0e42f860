use geo::{Coord, Distance, Haversine, Point, Rect};

/// Mean earth radius used by `geo::Haversine`, expressed as meters per degree
/// of arc on the great circle.
pub const METERS_PER_DEGREE: f64 = 2.0 * std::f64::consts::PI * 6_371_008.8 / 360.0;

/// Great-circle distance between two lon/lat points, in degrees of arc.
pub fn degrees_between(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine.distance(a, b) / METERS_PER_DEGREE
}

pub fn euclidean_between(a: Point<f64>, b: Point<f64>) -> f64 {
    (a.x() - b.x()).hypot(a.y() - b.y())
}

/// Wraps a longitude into `[-180, 180]`, keeping `180` itself.
pub fn normalize_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        return lon;
    }
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Corner of `rect` used to measure its "radius" from the center: the top
/// corner in the northern half, the bottom one in the southern half, so the
/// shorter of the two geodesic distances is picked.
pub fn nearest_horizontal_corner(rect: &Rect<f64>) -> Point<f64> {
    let center = rect.center();
    let y = if center.y >= 0.0 {
        rect.max().y
    } else {
        rect.min().y
    };
    Point(Coord {
        x: rect.max().x,
        y,
    })
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_degrees_between() {
        // one degree along the equator
        let d = degrees_between(Point::new(0.0, 0.0), Point::new(1.0, 0.0));
        assert!((d - 1.0).abs() < 1e-9);

        // one degree along a meridian
        let d = degrees_between(Point::new(10.0, 10.0), Point::new(10.0, 11.0));
        assert!((d - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_longitude() {
        assert_eq!(normalize_longitude(10.0), 10.0);
        assert_eq!(normalize_longitude(180.0), 180.0);
        assert_eq!(normalize_longitude(-180.0), -180.0);
        assert!((normalize_longitude(190.0) - -170.0).abs() < 1e-9);
        assert!((normalize_longitude(-190.0) - 170.0).abs() < 1e-9);
        assert_eq!(normalize_longitude(540.0), 180.0);
    }

    #[test]
    fn test_nearest_horizontal_corner() {
        let north = Rect::new(Coord { x: 0.0, y: 10.0 }, Coord { x: 10.0, y: 20.0 });
        assert_eq!(nearest_horizontal_corner(&north), Point::new(10.0, 20.0));

        let south = Rect::new(Coord { x: 0.0, y: -20.0 }, Coord { x: 10.0, y: -10.0 });
        assert_eq!(nearest_horizontal_corner(&south), Point::new(10.0, -20.0));
    }
}
