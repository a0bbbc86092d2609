//! Angle difference between a sequence of points and a route
//!
//! A point pair is compared against the route's local direction where its first point projects.
//! Up to three pairs are sampled along the sequence (start, end and middle) and the smallest
//! difference wins, so a single noisy pair cannot turn a match into a non-match.

use crate::diagnostics::DiagnosticSink;
use crate::{Coordinate, MAX_SENTINEL, Route, geodesic, linear, measure};

/// Smallest angle difference in degrees between the sampled pairs of `points` and `route`
///
/// The result is the raw `|route bearing - point bearing|` in `[0, 360)`; callers interpret it
/// circularly. Returns [`MAX_SENTINEL`] for a route without direction and `0.0` when fewer than
/// two points are given. A sample whose first point lies more than `max_lateral_distance` meters
/// from the route contributes [`MAX_SENTINEL`], as does a pair whose two points coincide: a
/// stationary pair has no heading and never lowers the minimum.
pub fn angle_difference(
    route: &Route,
    points: &[Coordinate],
    max_lateral_distance: f64,
    sink: &mut dyn DiagnosticSink,
) -> f64 {
    if route.is_empty() {
        sink.record("routeEmpty", true.into());
        return MAX_SENTINEL;
    }
    if points.len() < 2 {
        return 0.0;
    }
    if !route.has_direction() {
        sink.record("routeWithoutDirection", true.into());
        return MAX_SENTINEL;
    }

    let n = points.len();
    let mut difference =
        sample_difference(route, points[0], points[1], max_lateral_distance, sink);

    if n >= 3 {
        let last = sample_difference(
            route,
            points[n - 2],
            points[n - 1],
            max_lateral_distance,
            sink,
        );
        difference = difference.min(last);
    }

    let middle = n / 2;
    if middle + 1 < n - 1 {
        let mid = sample_difference(
            route,
            points[middle],
            points[middle + 1],
            max_lateral_distance,
            sink,
        );
        difference = difference.min(mid);
    }

    difference
}

/// [`angle_difference`] over independent point sequences, keeping the smallest
///
/// No groups at all behaves like an empty point list.
pub fn grouped_angle_difference(
    route: &Route,
    groups: &[Vec<Coordinate>],
    max_lateral_distance: f64,
    sink: &mut dyn DiagnosticSink,
) -> f64 {
    if groups.is_empty() {
        return angle_difference(route, &[], max_lateral_distance, sink);
    }
    groups
        .iter()
        .map(|group| angle_difference(route, group, max_lateral_distance, sink))
        .fold(MAX_SENTINEL, f64::min)
}

/// Whole percentage (truncated) of `points` within `max_distance` meters of `route`
///
/// Zero for an empty point list or an empty route.
pub fn percentage_within_distance(route: &Route, points: &[Coordinate], max_distance: f64) -> u32 {
    percentage(count_within_distance(route, points, max_distance), points.len())
}

/// [`percentage_within_distance`] counting the points of every group
pub fn grouped_percentage_within_distance(
    route: &Route,
    groups: &[Vec<Coordinate>],
    max_distance: f64,
) -> u32 {
    let (within, total) = groups.iter().fold((0, 0), |(within, total), group| {
        (
            within + count_within_distance(route, group, max_distance),
            total + group.len(),
        )
    });
    percentage(within, total)
}

fn count_within_distance(route: &Route, points: &[Coordinate], max_distance: f64) -> usize {
    points
        .iter()
        .filter(|&&point| measure::corridor_distance(route, point) <= max_distance)
        .count()
}

#[inline]
fn percentage(within: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    u32::try_from(within * 100 / total).unwrap_or(u32::MAX)
}

/// Whether `difference` is within `tolerance` of 0° (or 360°)
#[inline]
pub fn in_primary_band(difference: f64, tolerance: f64) -> bool {
    (difference >= 360.0 - tolerance && difference <= 360.0)
        || (difference >= 0.0 && difference <= tolerance)
}

/// Whether `difference` is within `tolerance` of 180°
#[inline]
pub fn in_opposite_band(difference: f64, tolerance: f64) -> bool {
    difference >= 180.0 - tolerance && difference <= 180.0 + tolerance
}

fn sample_difference(
    route: &Route,
    first: Coordinate,
    second: Coordinate,
    max_lateral_distance: f64,
    sink: &mut dyn DiagnosticSink,
) -> f64 {
    if first == second {
        sink.record_sample("stationaryPair", true.into());
        return MAX_SENTINEL;
    }
    let Some(location) = linear::project(route, first) else {
        return MAX_SENTINEL;
    };
    let Some(nearest) = linear::location_coordinate(route, location) else {
        return MAX_SENTINEL;
    };

    sink.record_sample("queryCoordinate", first.into());
    sink.record_sample("routeCoordinate", nearest.into());

    let distance = geodesic::distance_meters(nearest, first);
    sink.record_sample("distance", distance.into());
    if distance > max_lateral_distance {
        sink.record_sample("tooFarFromRoute", true.into());
        return MAX_SENTINEL;
    }

    let Some((tangent_start, tangent_end)) = linear::tangent_at(route, location) else {
        return MAX_SENTINEL;
    };
    let route_bearing = geodesic::bearing_degrees(tangent_start, tangent_end);
    let query_bearing = geodesic::bearing_degrees(first, second);
    let difference = (route_bearing - query_bearing).abs();

    sink.record_sample("routeAngle", route_bearing.into());
    sink.record_sample("queryAngle", query_bearing.into());
    sink.record_sample("difference", difference.into());

    difference
}
