//! CorridorEvaluator - Top-level entry point for corridor queries
//!
//! A [`CorridorQuery`] carries the query-side inputs, parsed once up front. The evaluator then
//! applies it to any number of documents, resolving document routes through the shared
//! [`RouteCache`]. Per-document problems never fail the query: they become sentinel values.

use crate::cache::{CacheConfig, KEY_PREFIX, RouteCache};
use crate::diagnostics::{DebugValues, DiagnosticSink, NoopSink};
use crate::direction::{self, DirectionConfig, DirectionMatch, DirectionPayload};
use crate::{Coordinate, MAX_SENTINEL, Result, Route, angle, measure, wkt};

use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for the evaluator
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Size and idle time of the route cache
    pub cache: CacheConfig,
    /// Defaults for direction queries built from this configuration
    pub direction: DirectionConfig,
}

impl Config {
    /// [`CorridorQuery::in_direction`] with this configuration's direction parameters
    pub fn in_direction<'a>(
        &self,
        points: impl IntoIterator<Item = &'a str>,
    ) -> Result<CorridorQuery> {
        CorridorQuery::in_direction(points, self.direction.clone())
    }

    /// [`CorridorQuery::in_direction_points`] with this configuration's direction parameters
    pub fn in_direction_points(&self, route: &str) -> Result<CorridorQuery> {
        CorridorQuery::in_direction_points(route, self.direction.clone())
    }
}

/// A corridor query with its query-side inputs already parsed
#[derive(Debug, Clone, PartialEq)]
pub enum CorridorQuery {
    /// Distance in meters from the document's point to the query route
    RouteDistance { route: Arc<Route> },
    /// Position in meters along the query route of the document's point
    RoutePosition { route: Arc<Route> },
    /// Smallest distance in meters from the query points to the document's route
    PointsDistance { points: Vec<Coordinate> },
    /// Position in meters along the document's route of the first query point
    PointsPosition { points: Vec<Coordinate> },
    /// Smallest distance in meters from the document's route to disks around the query points
    CircleDistance {
        points: Vec<Coordinate>,
        radius_meters: f64,
    },
    /// Raw angle difference in degrees between the query points and the document's route
    ///
    /// Without a lateral gate every point pair counts.
    Direction {
        points: Vec<Coordinate>,
        max_lateral_distance: Option<f64>,
    },
    /// Whether the query points travel along the document's route: 1, 0 or -1
    InDirection {
        points: Vec<Coordinate>,
        config: DirectionConfig,
    },
    /// Whether the document's direction payload travels along the query route: 1, 0 or -1
    ///
    /// The bidirectional flag comes from the payload, not from `config`.
    InDirectionPoints {
        route: Arc<Route>,
        config: DirectionConfig,
    },
}

impl CorridorQuery {
    pub fn route_distance(route: &str) -> Result<Self> {
        Ok(Self::RouteDistance {
            route: wkt::parse_linestring(route)?,
        })
    }

    pub fn route_position(route: &str) -> Result<Self> {
        Ok(Self::RoutePosition {
            route: wkt::parse_linestring(route)?,
        })
    }

    pub fn points_distance<'a>(points: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        Ok(Self::PointsDistance {
            points: parse_points(points)?,
        })
    }

    pub fn points_position<'a>(points: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        Ok(Self::PointsPosition {
            points: parse_points(points)?,
        })
    }

    pub fn circle_distance<'a>(
        points: impl IntoIterator<Item = &'a str>,
        radius_meters: f64,
    ) -> Result<Self> {
        Ok(Self::CircleDistance {
            points: parse_points(points)?,
            radius_meters,
        })
    }

    pub fn direction<'a>(
        points: impl IntoIterator<Item = &'a str>,
        max_lateral_distance: Option<f64>,
    ) -> Result<Self> {
        Ok(Self::Direction {
            points: parse_points(points)?,
            max_lateral_distance,
        })
    }

    pub fn in_direction<'a>(
        points: impl IntoIterator<Item = &'a str>,
        config: DirectionConfig,
    ) -> Result<Self> {
        Ok(Self::InDirection {
            points: parse_points(points)?,
            config,
        })
    }

    pub fn in_direction_points(route: &str, config: DirectionConfig) -> Result<Self> {
        Ok(Self::InDirectionPoints {
            route: wkt::parse_linestring(route)?,
            config,
        })
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::RouteDistance { .. } => "routeDistance",
            Self::RoutePosition { .. } => "routePosition",
            Self::PointsDistance { .. } => "pointsDistance",
            Self::PointsPosition { .. } => "pointsPosition",
            Self::CircleDistance { .. } => "circleDistance",
            Self::Direction { .. } => "pointsDirection",
            Self::InDirection { .. } => "inPointsDirection",
            Self::InDirectionPoints { .. } => "inDirectionPoints",
        }
    }

    /// Whether a document without a route yields the no-opinion value rather than MAX
    fn is_direction_query(&self) -> bool {
        matches!(
            self,
            Self::Direction { .. } | Self::InDirection { .. } | Self::InDirectionPoints { .. }
        )
    }
}

fn parse_points<'a>(texts: impl IntoIterator<Item = &'a str>) -> Result<Vec<Coordinate>> {
    texts.into_iter().map(wkt::parse_point).collect()
}

/// The text fields of one document that queries read
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentValues<'a> {
    /// Route as WKT, or a `hash-<hex>` key of an already cached route
    pub route: Option<&'a str>,
    /// Precomputed key of `route`, stored at index time
    pub route_hash: Option<&'a str>,
    /// A WKT point
    pub location: Option<&'a str>,
    /// Direction payload: `"<bool>, x y, x y; ..."`
    pub direction: Option<&'a str>,
}

impl<'a> DocumentValues<'a> {
    pub fn with_route(route: &'a str) -> Self {
        Self {
            route: Some(route),
            ..Self::default()
        }
    }

    pub fn with_location(location: &'a str) -> Self {
        Self {
            location: Some(location),
            ..Self::default()
        }
    }

    pub fn with_direction(direction: &'a str) -> Self {
        Self {
            direction: Some(direction),
            ..Self::default()
        }
    }
}

/// Evaluates corridor queries against documents
#[derive(Debug, Clone)]
pub struct CorridorEvaluator {
    config: Config,
    cache: Arc<RouteCache>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl CorridorEvaluator {
    /// Create a new evaluator with its own route cache
    pub fn new(config: Config) -> Self {
        let cache = Arc::new(RouteCache::new(config.cache.clone()));
        Self { config, cache }
    }

    /// Create an evaluator sharing an existing route cache
    pub fn with_cache(config: Config, cache: Arc<RouteCache>) -> Self {
        Self { config, cache }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<RouteCache> {
        &self.cache
    }

    /// Evaluate `query` for one document
    ///
    /// Never fails: unusable document values are logged and yield [`MAX_SENTINEL`].
    pub fn evaluate(&self, query: &CorridorQuery, document: &DocumentValues<'_>) -> f64 {
        #[cfg(feature = "profiling")]
        profiling::scope!("evaluator::evaluate");

        self.evaluate_with(query, document, &mut NoopSink)
    }

    /// Evaluate `query` and also return the diagnostics behind the value as JSON
    pub fn evaluate_debug(
        &self,
        query: &CorridorQuery,
        document: &DocumentValues<'_>,
    ) -> (f64, String) {
        let mut debug = DebugValues::new();
        let value = self.evaluate_with(query, document, &mut debug);
        debug.record("result", value.into());
        (value, debug.to_json())
    }

    /// Evaluate `query` for many documents in parallel, keeping document order
    pub fn evaluate_batch(
        &self,
        query: &CorridorQuery,
        documents: &[DocumentValues<'_>],
    ) -> Vec<f64> {
        #[cfg(feature = "profiling")]
        profiling::scope!("evaluator::evaluate_batch");

        documents
            .par_iter()
            .map(|document| self.evaluate(query, document))
            .collect()
    }

    fn evaluate_with(
        &self,
        query: &CorridorQuery,
        document: &DocumentValues<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> f64 {
        match self.try_evaluate(query, document, sink) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(
                    query = query.name(),
                    route = document.route.unwrap_or_default(),
                    "Could not calculate value: {err}"
                );
                if sink.is_enabled() {
                    sink.record("error", err.to_string().into());
                }
                MAX_SENTINEL
            }
        }
    }

    fn try_evaluate(
        &self,
        query: &CorridorQuery,
        document: &DocumentValues<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<f64> {
        // Queries that need the document's route
        let route = match query {
            CorridorQuery::RouteDistance { .. }
            | CorridorQuery::RoutePosition { .. }
            | CorridorQuery::InDirectionPoints { .. } => None,
            _ => match self.document_route(document)? {
                Some(route) => Some(route),
                None => {
                    sink.record("routeAsString", "empty".into());
                    return Ok(missing_value(query));
                }
            },
        };

        let value = match (query, route) {
            (CorridorQuery::RouteDistance { route }, _) => match document_point(document)? {
                Some(point) => measure::corridor_distance(route, point),
                None => MAX_SENTINEL,
            },
            (CorridorQuery::RoutePosition { route }, _) => match document_point(document)? {
                Some(point) => measure::corridor_position(route, point),
                None => MAX_SENTINEL,
            },
            (CorridorQuery::InDirectionPoints { route, config }, _) => {
                match document.direction.filter(|text| !text.trim().is_empty()) {
                    Some(text) => {
                        let payload: DirectionPayload = text.parse()?;
                        let config = DirectionConfig {
                            bidirectional: payload.bidirectional,
                            ..config.clone()
                        };
                        direction::grouped_direction_match(route, &payload.groups, &config, sink)
                            .as_f64()
                    }
                    None => {
                        sink.record("directionAsString", "empty".into());
                        DirectionMatch::NoOpinion.as_f64()
                    }
                }
            }
            (CorridorQuery::PointsDistance { points }, Some(route)) => {
                measure::points_distance(&route, points)
            }
            (CorridorQuery::PointsPosition { points }, Some(route)) => {
                measure::points_position(&route, points)
            }
            (
                CorridorQuery::CircleDistance {
                    points,
                    radius_meters,
                },
                Some(route),
            ) => measure::points_circle_distance(&route, points, *radius_meters),
            (
                CorridorQuery::Direction {
                    points,
                    max_lateral_distance,
                },
                Some(route),
            ) => {
                let gate = max_lateral_distance.unwrap_or(f64::INFINITY);
                angle::angle_difference(&route, points, gate, sink)
            }
            (CorridorQuery::InDirection { points, config }, Some(route)) => {
                direction::direction_match(&route, points, config, sink).as_f64()
            }
            (_, None) => missing_value(query),
        };
        Ok(value)
    }

    /// Resolve the document's route through the cache; `None` when the document has none
    fn document_route(&self, document: &DocumentValues<'_>) -> Result<Option<Arc<Route>>> {
        let Some(text) = document.route.map(str::trim).filter(|text| !text.is_empty()) else {
            return Ok(None);
        };

        let route = if text.starts_with(KEY_PREFIX) {
            self.cache.resolve_by_hash(text, None)?
        } else if let Some(hash) = document.route_hash.filter(|hash| !hash.is_empty()) {
            self.cache.resolve_by_hash(hash, Some(text))?
        } else {
            self.cache.resolve_text(text)?
        };
        Ok(Some(route))
    }
}

fn document_point(document: &DocumentValues<'_>) -> Result<Option<Coordinate>> {
    document
        .location
        .filter(|text| !text.trim().is_empty())
        .map(wkt::parse_point)
        .transpose()
}

#[inline]
fn missing_value(query: &CorridorQuery) -> f64 {
    if query.is_direction_query() {
        DirectionMatch::NoOpinion.as_f64()
    } else {
        MAX_SENTINEL
    }
}
