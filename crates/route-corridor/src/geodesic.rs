//! Geodesic distance and bearing on the WGS84 ellipsoid
//!
//! Route coordinates are geographic (longitude/latitude in degrees), so planar distances are wrong at
//! the scales corridor matching works with. Both functions solve the inverse geodesic problem
//! (Karney's algorithm via `geo`) and are pure, so they can be called from any thread.

use geo::{Bearing, Coord, Distance, Geodesic, Point};

/// Geodesic distance between two coordinates in meters
///
/// # Arguments
/// * `a` - First coordinate (x = longitude, y = latitude, degrees)
/// * `b` - Second coordinate
#[inline]
pub fn distance_meters(a: Coord<f64>, b: Coord<f64>) -> f64 {
    if a == b {
        return 0.0;
    }
    Geodesic.distance(Point::from(a), Point::from(b))
}

/// Initial bearing from `a` to `b` in degrees, clockwise from north, in `[0, 360)`
#[inline]
pub fn bearing_degrees(a: Coord<f64>, b: Coord<f64>) -> f64 {
    normalize_degrees(Geodesic.bearing(Point::from(a), Point::from(b)))
}

/// Wrap an angle in degrees into `[0, 360)`
#[inline(always)]
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use geo::coord;

    #[test]
    fn test_distance_to_self_is_zero() {
        let points = [
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 16.2075, y: 48.3849 },
            coord! { x: -179.9999, y: -89.5 },
            coord! { x: 13.789743483066559, y: 47.76935515104816 },
        ];
        for p in points {
            assert_eq!(distance_meters(p, p), 0.0);
        }
    }

    #[test]
    fn test_distance_one_degree_of_longitude_at_equator() {
        // One degree of longitude on the WGS84 equator is 111319.49 m
        let d = distance_meters(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 0.0 });
        assert_abs_diff_eq!(d, 111_319.49, epsilon = 0.01);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = coord! { x: 16.2075, y: 48.3849 };
        let b = coord! { x: 16.2071, y: 48.3847 };
        assert_abs_diff_eq!(distance_meters(a, b), distance_meters(b, a), epsilon = 1e-9);
        // Roughly 35 meters apart
        assert!(distance_meters(a, b) > 30.0 && distance_meters(a, b) < 40.0);
    }

    #[test]
    fn test_distance_keeps_sub_meter_precision() {
        // 1e-7 degrees of latitude is about 1.1 cm
        let a = coord! { x: 13.7897434, y: 47.7693551 };
        let b = coord! { x: 13.7897434, y: 47.7693552 };
        let d = distance_meters(a, b);
        assert!(d > 0.005 && d < 0.02, "distance was {d}");
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = coord! { x: 0.0, y: 0.0 };
        assert_abs_diff_eq!(
            bearing_degrees(origin, coord! { x: 0.0, y: 1.0 }),
            0.0,
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(
            bearing_degrees(origin, coord! { x: 1.0, y: 0.0 }),
            90.0,
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(
            bearing_degrees(origin, coord! { x: 0.0, y: -1.0 }),
            180.0,
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(
            bearing_degrees(origin, coord! { x: -1.0, y: 0.0 }),
            270.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_bearing_is_in_range() {
        let a = coord! { x: 16.2075, y: 48.3849 };
        let b = coord! { x: 16.2071, y: 48.3847 };
        for (from, to) in [(a, b), (b, a)] {
            let bearing = bearing_degrees(from, to);
            assert!((0.0..360.0).contains(&bearing));
        }
    }

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(normalize_degrees(0.0), 0.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(450.0), 90.0);
        assert!(normalize_degrees(-1e-18) < 360.0);
    }
}
