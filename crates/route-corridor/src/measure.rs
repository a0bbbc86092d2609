//! Distance and position queries against a route
//!
//! These never fail: an empty route or an empty point list yields [`MAX_SENTINEL`], so one bad
//! document cannot abort the evaluation of a whole batch.

use crate::{Coordinate, MAX_SENTINEL, Route, geodesic, linear};

/// Geodesic distance in meters from `point` to the nearest position on `route`
pub fn corridor_distance(route: &Route, point: Coordinate) -> f64 {
    let Some(location) = linear::project(route, point) else {
        return MAX_SENTINEL;
    };
    match linear::location_coordinate(route, location) {
        Some(nearest) => geodesic::distance_meters(nearest, point),
        None => MAX_SENTINEL,
    }
}

/// Geodesic length in meters along `route` up to the projection of `point`
pub fn corridor_position(route: &Route, point: Coordinate) -> f64 {
    match linear::project(route, point) {
        Some(location) => linear::length_to(route, location),
        None => MAX_SENTINEL,
    }
}

/// Distance in meters from `route` to a disk of `radius_meters` around `point`
///
/// Zero when the route passes through the disk.
pub fn circle_distance(route: &Route, point: Coordinate, radius_meters: f64) -> f64 {
    let distance = corridor_distance(route, point);
    if distance == MAX_SENTINEL {
        return MAX_SENTINEL;
    }
    (distance - radius_meters).max(0.0)
}

/// Smallest [`corridor_distance`] over `points`
pub fn points_distance(route: &Route, points: &[Coordinate]) -> f64 {
    points
        .iter()
        .map(|&point| corridor_distance(route, point))
        .fold(MAX_SENTINEL, f64::min)
}

/// Smallest [`circle_distance`] over `points`
pub fn points_circle_distance(route: &Route, points: &[Coordinate], radius_meters: f64) -> f64 {
    points
        .iter()
        .map(|&point| circle_distance(route, point, radius_meters))
        .fold(MAX_SENTINEL, f64::min)
}

/// [`corridor_position`] of the first point
pub fn points_position(route: &Route, points: &[Coordinate]) -> f64 {
    match points.first() {
        Some(&point) => corridor_position(route, point),
        None => MAX_SENTINEL,
    }
}
