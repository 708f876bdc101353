//! Track simplification.
//!
//! Reduces dense GPX tracks with the Douglas-Peucker algorithm before they
//! are turned into FIT records. Only track points are ever simplified;
//! route points and waypoints are planned positions and stay untouched.

use crate::geo_math::distance_deg;
use crate::point::Point;

/// Deviations below this are treated as a perfectly straight span.
const EPSILON: f64 = 1e-8;

/// Start and end closer than this (degrees) make a degenerate chord.
const SAME_POSITION_DEG: f64 = 1e-6;

/// Douglas-Peucker line simplification.
///
/// `tolerance_m` is the largest allowed distance, in meters, between a
/// dropped point and the chord that replaces it. A tolerance of zero or
/// less, or an input of at most two points, returns the input unchanged.
///
/// The first and last points are always kept and the order is preserved.
pub fn reduce(points: &[Point], tolerance_m: f64) -> Vec<Point> {
    if tolerance_m <= 0.0 || points.len() <= 2 {
        return points.to_vec();
    }

    let first = &points[0];
    let last = &points[points.len() - 1];

    let split = farthest_from_chord(points);
    let deviation = distance_to_line_m(&points[split], first, last);

    if deviation > tolerance_m {
        let mut left = reduce(&points[..=split], tolerance_m);
        let right = reduce(&points[split..], tolerance_m);

        // Both halves contain the split point
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first.clone(), last.clone()]
    }
}

/// Index of the interior point farthest from the first-to-last chord.
///
/// Near-straight spans return the middle index so that long collinear runs
/// split evenly instead of degenerating into a linear recursion.
fn farthest_from_chord(points: &[Point]) -> usize {
    let first = &points[0];
    let last = &points[points.len() - 1];

    let mut max_dist = 0.0;
    let mut max_idx = 0;

    for (i, p) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let dist = distance_to_line_m(p, first, last);
        if dist > max_dist {
            max_dist = dist;
            max_idx = i;
        }
    }

    if max_dist < EPSILON {
        points.len() / 2
    } else {
        max_idx
    }
}

/// Distance from `p` to the infinite line through `a` and `b`, in meters.
///
/// The foot of the perpendicular is found in plain lon/lat coordinates,
/// then the geodesic distance from `p` to that foot is measured. This is
/// not a true cross-track distance, but it is close enough for legs of a
/// few kilometres and keeps simplification results stable.
///
/// When `a` and `b` coincide, the distance from `p` to `a` is returned.
pub fn distance_to_line_m(p: &Point, a: &Point, b: &Point) -> f64 {
    let dx = b.lon - a.lon;
    let dy = b.lat - a.lat;

    if dx.abs() < SAME_POSITION_DEG && dy.abs() < SAME_POSITION_DEG {
        return distance_deg(a.lat, a.lon, p.lat, p.lon);
    }

    let t = ((p.lon - a.lon) * dx + (p.lat - a.lat) * dy) / (dx * dx + dy * dy);
    let foot_lon = a.lon + t * dx;
    let foot_lat = a.lat + t * dy;

    distance_deg(p.lat, p.lon, foot_lat, foot_lon)
}
