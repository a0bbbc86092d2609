//! Route storage module
//!
//! This module provides the `Route` struct: an immutable polyline of geographic coordinates
//! with precomputed cumulative geodesic lengths.

use crate::geodesic;
use geo::{Coord, LineString};
use std::sync::Arc;

/// A 2-D geographic coordinate (x = longitude, y = latitude, degrees)
pub type Coordinate = Coord<f64>;

/// An ordered polyline that points are matched against
///
/// Insertion order is the travel direction of the route. A route without coordinates is the
/// canonical "no route" sentinel: every consumer treats it as "no match possible".
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    /// The polyline in route order
    line: LineString<f64>,
    /// Cumulative geodesic length in meters at every vertex (same length as `line`)
    cumulative_lengths: Vec<f64>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Route {
    /// Create a new Route from coordinates in travel order
    ///
    /// Cumulative lengths are computed once here so position queries do not walk the route.
    pub fn new(coordinates: Vec<Coordinate>) -> Arc<Self> {
        #[cfg(feature = "profiling")]
        profiling::scope!("route::new");

        let mut cumulative_lengths = Vec::with_capacity(coordinates.len());
        let mut total = 0.0;
        let mut prev: Option<Coordinate> = None;
        for &coordinate in &coordinates {
            if let Some(prev) = prev {
                total += geodesic::distance_meters(prev, coordinate);
            }
            cumulative_lengths.push(total);
            prev = Some(coordinate);
        }

        Arc::new(Route {
            line: LineString::new(coordinates),
            cumulative_lengths,
        })
    }

    /// The empty-route sentinel
    pub fn empty() -> Arc<Self> {
        Self::new(Vec::new())
    }

    /// Access the underlying polyline
    #[inline]
    pub fn line_string(&self) -> &LineString<f64> {
        &self.line
    }

    /// All coordinates in route order
    #[inline]
    pub fn coordinates(&self) -> &[Coordinate] {
        &self.line.0
    }

    /// Get a coordinate by vertex index
    #[inline]
    pub fn coordinate(&self, index: usize) -> Option<Coordinate> {
        self.line.0.get(index).copied()
    }

    #[inline]
    pub fn first(&self) -> Option<Coordinate> {
        self.line.0.first().copied()
    }

    #[inline]
    pub fn last(&self) -> Option<Coordinate> {
        self.line.0.last().copied()
    }

    /// Number of vertices
    #[inline]
    pub fn len(&self) -> usize {
        self.line.0.len()
    }

    /// Check if this is the empty-route sentinel
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.line.0.is_empty()
    }

    /// Whether the route has at least one segment, and therefore a direction
    #[inline]
    pub fn has_direction(&self) -> bool {
        self.line.0.len() >= 2
    }

    /// Cumulative geodesic length in meters from the start to a vertex
    #[inline]
    pub fn length_at_vertex(&self, index: usize) -> Option<f64> {
        self.cumulative_lengths.get(index).copied()
    }

    /// Total geodesic length of the route in meters
    ///
    /// This is O(1) as the value is cached during construction.
    #[inline]
    pub fn total_length(&self) -> f64 {
        self.cumulative_lengths.last().copied().unwrap_or(0.0)
    }
}
