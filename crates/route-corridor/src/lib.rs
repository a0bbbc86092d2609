//! Route Corridor - Geometric corridor matching against geographic routes
//!
//! This library answers, for a reference route (a polyline of WGS84 coordinates), how far a point
//! lies from it, where along it the point projects, and whether a sequence of points travels in a
//! direction compatible with the route. It is meant to be embedded in a search engine that evaluates
//! these questions per document, possibly millions of times per query, from many threads.
//!
//! # Architecture
//!
//! - **[`Route`]**: Immutable polyline with precomputed cumulative geodesic lengths
//! - **[`geodesic`]**: WGS84 ellipsoidal distance and bearing
//! - **[`linear`]**: Linear referencing (projection, position along route, local tangent)
//! - **[`RouteCache`]**: Concurrent content-addressed cache of parsed routes
//! - **[`angle`]** / **[`direction`]**: Angle difference sampling and the direction-match decision
//! - **[`measure`]**: Distance and position queries
//! - **[`CorridorEvaluator`]**: Dispatches a [`CorridorQuery`] over per-document values
//!
//! # Sentinels
//!
//! Degenerate input is data, not an error: distance-like queries return [`MAX_SENTINEL`] and
//! direction queries return [`DirectionMatch::NoOpinion`] when the document has no route.

pub mod angle;
mod cache;
pub mod diagnostics;
pub mod direction;
mod evaluator;
pub mod geodesic;
pub mod linear;
pub mod measure;
mod route;
pub mod wkt;

// Public API exports
pub use cache::{CacheConfig, CacheStats, RouteCache, RouteKey};
pub use diagnostics::{DebugValues, DiagnosticSink, DiagnosticValue, NoopSink};
pub use direction::{DirectionConfig, DirectionMatch};
pub use evaluator::{Config, CorridorEvaluator, CorridorQuery, DocumentValues};
pub use linear::LinearLocation;
pub use route::{Coordinate, Route};

/// Value returned when a distance, position or angle cannot be defined for the input.
pub const MAX_SENTINEL: f64 = f64::MAX;

/// Error types for the corridor library
#[derive(Debug, thiserror::Error)]
pub enum CorridorError {
    #[error("Parameter must be a valid WKT LineString: {0}")]
    InvalidLineString(String),

    #[error("Parameter must be a valid WKT Point: {0}")]
    InvalidPoint(String),

    #[error("Invalid coordinate '{0}'")]
    InvalidCoordinate(String),

    #[error("Invalid route key '{0}'")]
    InvalidRouteKey(String),

    #[error("Invalid direction payload: {reason}")]
    InvalidDirectionPayload { reason: String },

    #[error("Route key {0} is not cached and no route text was supplied")]
    UnknownRouteKey(RouteKey),
}

pub type Result<T> = std::result::Result<T, CorridorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that all public types are accessible
        let _: fn(Config) -> CorridorEvaluator = CorridorEvaluator::new;
        let _: fn() -> Config = Config::default;
        let _: fn(CacheConfig) -> RouteCache = RouteCache::new;
    }

    #[test]
    fn test_error_messages() {
        let err = CorridorError::InvalidLineString("POINT(1 2)".to_string());
        assert!(err.to_string().contains("LineString"));

        let err = CorridorError::InvalidDirectionPayload {
            reason: "missing flag".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid direction payload: missing flag");
    }
}
