//! Distance computations on the WGS84 ellipsoid.
//!
//! All coordinates are WGS84 latitude/longitude in degrees. Horizontal
//! distances are geodesics (Karney's algorithm via the `geo` crate), not
//! great-circle approximations.

use geo::{point, GeodesicDistance};

use crate::point::Point;

/// Ellipsoidal distance between two lat/lon pairs in meters.
pub fn distance_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let a = point!(x: lon1, y: lat1);
    let b = point!(x: lon2, y: lat2);
    a.geodesic_distance(&b)
}

/// Ellipsoidal distance between two points in meters. Elevation is ignored.
pub fn distance(a: &Point, b: &Point) -> f64 {
    distance_deg(a.lat, a.lon, b.lat, b.lon)
}

/// Distance including the elevation delta when both elevations are known.
///
/// Falls back to [`distance`] when either elevation is missing.
pub fn distance_3d(a: &Point, b: &Point) -> f64 {
    let d = distance(a, b);
    match (a.ele, b.ele) {
        (Some(ea), Some(eb)) => {
            let h = ea - eb;
            (d * d + h * h).sqrt()
        }
        _ => d,
    }
}

/// Degrees to FIT semicircles, truncated toward zero.
///
/// 180 degrees maps to 2^31, which saturates to `i32::MAX`.
pub fn semicircles(degrees: f64) -> i32 {
    (degrees * 2_147_483_648.0 / 180.0) as i32
}

/// Grade-adjusted speed factor for walking and running.
///
/// Polynomial fit of the metabolic cost of locomotion on slopes after
/// Minetti et al. (2002), J. Appl. Physiol. 93, 1039-1046. `grade` is rise
/// over run, signed.
pub fn walking_grade_factor(grade: f64) -> f64 {
    let g = grade;
    1.0 + (g * (19.5 + g * (46.3 + g * (-43.3 + g * (-30.4 + g * 155.4))))) / 3.6
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lat: f64, lon: f64) -> Point {
        Point::new(lat, lon)
    }

    #[test]
    fn distance_same_point() {
        let p = pt(47.3769, 8.5417);
        assert!(distance(&p, &p).abs() < 1e-6);
    }

    #[test]
    fn distance_one_degree_latitude() {
        // One degree of latitude centred on 45N is about 111.132 km on WGS84
        let d = distance(&pt(44.5, 7.0), &pt(45.5, 7.0));
        assert!((d - 111_132.0).abs() < 5.0, "Expected ~111132 m, got {d:.1}");
    }

    #[test]
    fn distance_equator_longitude() {
        // One degree of longitude on the equator is 111.32 km on WGS84
        let d = distance(&pt(0.0, 0.0), &pt(0.0, 1.0));
        assert!((d - 111_319.5).abs() < 1.0, "Expected ~111319.5 m, got {d:.1}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = pt(47.0, 7.0);
        let b = pt(47.8, 11.0);
        assert!((distance(&a, &b) - distance(&b, &a)).abs() < 1e-6);
    }

    #[test]
    fn distance_3d_combines_elevation() {
        let a = pt(47.0, 8.0).with_ele(400.0);
        let b = pt(47.0, 8.0).with_ele(430.0);
        assert!((distance_3d(&a, &b) - 30.0).abs() < 1e-6);

        let c = pt(47.001, 8.0).with_ele(500.0);
        let horizontal = distance(&a, &c);
        let expected = (horizontal * horizontal + 100.0 * 100.0).sqrt();
        assert!((distance_3d(&a, &c) - expected).abs() < 1e-6);
    }

    #[test]
    fn distance_3d_without_elevation_is_horizontal() {
        let a = pt(47.0, 8.0).with_ele(400.0);
        let b = pt(47.01, 8.0);
        assert_eq!(distance_3d(&a, &b), distance(&a, &b));
    }

    #[test]
    fn semicircles_known_values() {
        assert_eq!(semicircles(0.0), 0);
        assert_eq!(semicircles(90.0), 1 << 30);
        assert_eq!(semicircles(-90.0), -(1 << 30));
        assert_eq!(semicircles(180.0), i32::MAX);
    }

    #[test]
    fn semicircles_truncate_toward_zero() {
        // 1e-9 degrees is ~0.0119 semicircles
        assert_eq!(semicircles(1e-9), 0);
        assert_eq!(semicircles(-1e-9), 0);
    }

    #[test]
    fn semicircles_monotonic() {
        let mut prev = semicircles(-180.0);
        let mut deg = -180.0;
        while deg < 180.0 {
            deg += 0.37;
            let s = semicircles(deg);
            assert!(s >= prev, "semicircles not monotonic at {deg}");
            prev = s;
        }
    }

    #[test]
    fn walking_grade_factor_flat_is_one() {
        assert_eq!(walking_grade_factor(0.0), 1.0);
    }

    #[test]
    fn walking_grade_factor_polynomial() {
        let g: f64 = 0.1;
        let expected = 1.0
            + (19.5 * g + 46.3 * g.powi(2) - 43.3 * g.powi(3) - 30.4 * g.powi(4)
                + 155.4 * g.powi(5))
                / 3.6;
        assert!((walking_grade_factor(g) - expected).abs() < 1e-12);
    }
}
