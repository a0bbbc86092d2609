//! Linear referencing on routes
//!
//! A [`LinearLocation`] names a position on a route as a segment index plus a fraction along that
//! segment. Projection works in coordinate space (longitude/latitude treated as planar, which is
//! what the nearest-point search on short corridors needs), while lengths along the route are
//! geodesic meters.

use crate::{Coordinate, Route, geodesic};

/// A position on a route: segment `segment_index` (from vertex `i` to `i + 1`) at `fraction`
///
/// Locations produced by [`project`] are normalized: `fraction` is in `[0, 1)` except for the
/// route's final vertex, which is `(last segment, 1.0)`. A location on a vertex other than the
/// last one therefore always has `fraction == 0.0`. A `segment_index` past the route's last
/// segment addresses the final vertex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearLocation {
    pub segment_index: usize,
    pub fraction: f64,
}

impl LinearLocation {
    pub fn new(segment_index: usize, fraction: f64) -> Self {
        Self {
            segment_index,
            fraction: fraction.clamp(0.0, 1.0),
        }
    }

    /// The start of any route
    pub fn start() -> Self {
        Self::new(0, 0.0)
    }

    /// The final vertex of `route`
    pub fn end(route: &Route) -> Self {
        match route.len() {
            0 | 1 => Self::start(),
            n => Self::new(n - 2, 1.0),
        }
    }

    /// Whether the location sits exactly on a route vertex
    pub fn is_vertex(&self) -> bool {
        self.fraction == 0.0 || self.fraction == 1.0
    }
}

/// Project `point` onto the nearest position of `route`
///
/// Returns `None` for the empty route. When two segments are equally near, the earlier one wins.
pub fn project(route: &Route, point: Coordinate) -> Option<LinearLocation> {
    let coordinates = route.coordinates();
    match coordinates.len() {
        0 => return None,
        1 => return Some(LinearLocation::start()),
        _ => {}
    }

    let segment_count = coordinates.len() - 1;
    let mut best_index = 0;
    let mut best_fraction = 0.0;
    let mut best_distance_sq = f64::INFINITY;

    for (index, pair) in coordinates.windows(2).enumerate() {
        let fraction = segment_fraction(pair[0], pair[1], point);
        let closest = interpolate(pair[0], pair[1], fraction);
        let dx = point.x - closest.x;
        let dy = point.y - closest.y;
        let distance_sq = dx * dx + dy * dy;

        // Strict comparison keeps the lower segment index on ties
        if distance_sq < best_distance_sq {
            best_distance_sq = distance_sq;
            best_index = index;
            best_fraction = fraction;
        }
    }

    if best_fraction >= 1.0 && best_index + 1 < segment_count {
        return Some(LinearLocation::new(best_index + 1, 0.0));
    }
    Some(LinearLocation::new(best_index, best_fraction))
}

/// The coordinate at `location`, or `None` for the empty route
pub fn location_coordinate(route: &Route, location: LinearLocation) -> Option<Coordinate> {
    let (start, end) = segment_bounds(route, location.segment_index)?;
    Some(interpolate(start, end, location.fraction))
}

/// Geodesic length in meters from the start of `route` to `location`
///
/// The empty route has no length and yields `0.0`.
pub fn length_to(route: &Route, location: LinearLocation) -> f64 {
    let Some(last_segment) = route.len().checked_sub(2) else {
        return 0.0;
    };
    let (index, fraction) = normalized(location, last_segment);

    if fraction >= 1.0 {
        return route.length_at_vertex(index + 1).unwrap_or(0.0);
    }

    let vertex_length = route.length_at_vertex(index).unwrap_or(0.0);
    if fraction <= 0.0 {
        return vertex_length;
    }

    match (route.coordinate(index), location_coordinate(route, location)) {
        (Some(vertex), Some(position)) => {
            vertex_length + geodesic::distance_meters(vertex, position)
        }
        _ => vertex_length,
    }
}

/// The two coordinates bounding the route segment that defines the local direction at `location`
///
/// On a vertex the segment ending at that vertex is used, so a point sitting on a junction takes
/// the direction it arrived with. The first vertex has no incoming segment and uses the first
/// segment.
///
/// Zero-length segments (repeated vertices) have no direction and are skipped: the search walks
/// back towards the route start first, then forward. Returns `None` when the route has fewer than
/// two coordinates or all of its coordinates are identical.
pub fn tangent_at(route: &Route, location: LinearLocation) -> Option<(Coordinate, Coordinate)> {
    let last_segment = route.len().checked_sub(2)?;
    let (index, fraction) = normalized(location, last_segment);
    let preferred = if fraction == 0.0 && index > 0 {
        index - 1
    } else {
        index
    };

    (0..=preferred)
        .rev()
        .chain(preferred + 1..=last_segment)
        .filter_map(|segment| Some((route.coordinate(segment)?, route.coordinate(segment + 1)?)))
        .find(|(start, end)| start != end)
}

/// Segment index and fraction with out-of-range indices mapped onto the final vertex
#[inline]
fn normalized(location: LinearLocation, last_segment: usize) -> (usize, f64) {
    if location.segment_index > last_segment {
        (last_segment, 1.0)
    } else {
        (location.segment_index, location.fraction)
    }
}

/// Fraction along `start -> end` of the point nearest to `point`, clamped to `[0, 1]`
#[inline]
fn segment_fraction(start: Coordinate, end: Coordinate, point: Coordinate) -> f64 {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return 0.0;
    }
    (((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq).clamp(0.0, 1.0)
}

#[inline]
fn interpolate(start: Coordinate, end: Coordinate, fraction: f64) -> Coordinate {
    if fraction <= 0.0 {
        return start;
    }
    if fraction >= 1.0 {
        return end;
    }
    Coordinate {
        x: start.x + (end.x - start.x) * fraction,
        y: start.y + (end.y - start.y) * fraction,
    }
}

/// Start and end vertices of a segment; a single-vertex route yields a degenerate segment
fn segment_bounds(route: &Route, segment_index: usize) -> Option<(Coordinate, Coordinate)> {
    let last_vertex = route.len().checked_sub(1)?;
    let start = segment_index.min(last_vertex);
    let end = (start + 1).min(last_vertex);
    Some((route.coordinate(start)?, route.coordinate(end)?))
}
