//! Direction-match decision
//!
//! Turns an angle difference into a match verdict. A strict angular tolerance accepts on its own;
//! a relaxed tolerance only accepts when enough of the points also lie close to the route.

use crate::angle::{self, in_opposite_band, in_primary_band};
use crate::diagnostics::DiagnosticSink;
use crate::{Coordinate, CorridorError, Result, Route, wkt};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Parameters of the direction-match decision
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DirectionConfig {
    /// Angular tolerance in degrees that accepts without corroboration.
    /// Default: 0
    pub max_difference: f64,
    /// Wider angular tolerance in degrees that accepts only with corroboration.
    /// Default: 0
    pub max_difference_relaxed: f64,
    /// Also accept points travelling against the route.
    /// Default: false
    pub bidirectional: bool,
    /// Lateral distance in meters for the angle gate and the corroboration check.
    /// Default: 0.1
    pub points_max_distance_to_route: f64,
    /// Whole percentage of points that must lie within `points_max_distance_to_route`.
    /// Default: 100
    pub percentage_required: u32,
    /// Require corroboration before looking at angles at all.
    /// Default: false
    pub always_check_percentage: bool,
}

impl Default for DirectionConfig {
    fn default() -> Self {
        Self {
            max_difference: 0.0,
            max_difference_relaxed: 0.0,
            bidirectional: false,
            points_max_distance_to_route: 0.1,
            percentage_required: 100,
            always_check_percentage: false,
        }
    }
}

/// Outcome of a direction match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionMatch {
    Match,
    NoMatch,
    /// The document has no route to compare against
    NoOpinion,
}

impl DirectionMatch {
    /// Numeric value used by range filters: 1, 0 or -1
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Match => 1.0,
            Self::NoMatch => 0.0,
            Self::NoOpinion => -1.0,
        }
    }

    pub fn is_match(self) -> bool {
        self == Self::Match
    }
}

impl From<bool> for DirectionMatch {
    fn from(matched: bool) -> Self {
        if matched { Self::Match } else { Self::NoMatch }
    }
}

/// Decide whether ordered `points` travel along `route`
pub fn direction_match(
    route: &Route,
    points: &[Coordinate],
    config: &DirectionConfig,
    sink: &mut dyn DiagnosticSink,
) -> DirectionMatch {
    decide(route, Points::Flat(points), config, sink)
}

/// [`direction_match`] for independent point sequences
///
/// The angle difference is the smallest over all groups; corroboration counts every point.
pub fn grouped_direction_match(
    route: &Route,
    groups: &[Vec<Coordinate>],
    config: &DirectionConfig,
    sink: &mut dyn DiagnosticSink,
) -> DirectionMatch {
    decide(route, Points::Grouped(groups), config, sink)
}

#[derive(Clone, Copy)]
enum Points<'a> {
    Flat(&'a [Coordinate]),
    Grouped(&'a [Vec<Coordinate>]),
}

impl Points<'_> {
    fn angle_difference(self, route: &Route, gate: f64, sink: &mut dyn DiagnosticSink) -> f64 {
        match self {
            Points::Flat(points) => angle::angle_difference(route, points, gate, sink),
            Points::Grouped(groups) => angle::grouped_angle_difference(route, groups, gate, sink),
        }
    }

    fn percentage_within_distance(self, route: &Route, max_distance: f64) -> u32 {
        match self {
            Points::Flat(points) => angle::percentage_within_distance(route, points, max_distance),
            Points::Grouped(groups) => {
                angle::grouped_percentage_within_distance(route, groups, max_distance)
            }
        }
    }
}

/// Percentage check, computed at most once per decision
struct Corroboration<'a> {
    route: &'a Route,
    points: Points<'a>,
    config: &'a DirectionConfig,
    verdict: Option<bool>,
}

impl Corroboration<'_> {
    fn holds(&mut self, sink: &mut dyn DiagnosticSink) -> bool {
        if let Some(verdict) = self.verdict {
            return verdict;
        }
        let percentage = self
            .points
            .percentage_within_distance(self.route, self.config.points_max_distance_to_route);
        let verdict = percentage >= self.config.percentage_required;
        sink.record("percentageOfPointsWithinDistance", percentage.into());
        sink.record("enoughPointsWithinDistance", verdict.into());
        self.verdict = Some(verdict);
        verdict
    }
}

fn decide(
    route: &Route,
    points: Points<'_>,
    config: &DirectionConfig,
    sink: &mut dyn DiagnosticSink,
) -> DirectionMatch {
    let mut corroboration = Corroboration {
        route,
        points,
        config,
        verdict: None,
    };

    if config.always_check_percentage {
        sink.record("alwaysCheckPercentage", true.into());
        if !corroboration.holds(sink) {
            return DirectionMatch::NoMatch;
        }
    }

    let difference = points.angle_difference(route, config.points_max_distance_to_route, sink);
    sink.record("difference", difference.into());
    sink.record("maxDifference", config.max_difference.into());

    if in_primary_band(difference, config.max_difference) {
        sink.record("primaryBand", true.into());
        return DirectionMatch::Match;
    }
    if config.bidirectional && in_opposite_band(difference, config.max_difference) {
        sink.record("oppositeBand", true.into());
        return DirectionMatch::Match;
    }

    sink.record("maxDifferenceRelaxed", config.max_difference_relaxed.into());
    if in_primary_band(difference, config.max_difference_relaxed) && corroboration.holds(sink) {
        sink.record("primaryBandRelaxed", true.into());
        return DirectionMatch::Match;
    }
    if config.bidirectional
        && in_opposite_band(difference, config.max_difference_relaxed)
        && corroboration.holds(sink)
    {
        sink.record("oppositeBandRelaxed", true.into());
        return DirectionMatch::Match;
    }

    DirectionMatch::NoMatch
}

/// Points stored with a document for direction matching: `"<bool>, x y, x y; x y, ..."`
///
/// The leading flag says whether the points may travel either way. `;` separates independent
/// point sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionPayload {
    pub bidirectional: bool,
    pub groups: Vec<Vec<Coordinate>>,
}

impl DirectionPayload {
    /// All points of all groups in order
    pub fn points(&self) -> impl Iterator<Item = Coordinate> + '_ {
        self.groups.iter().flatten().copied()
    }

    pub fn point_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }
}

impl FromStr for DirectionPayload {
    type Err = CorridorError;

    fn from_str(text: &str) -> Result<Self> {
        let (flag, rest) = text.split_once(',').unwrap_or((text, ""));
        let flag = flag.trim();
        let bidirectional = if flag.eq_ignore_ascii_case("true") {
            true
        } else if flag.eq_ignore_ascii_case("false") {
            false
        } else {
            return Err(CorridorError::InvalidDirectionPayload {
                reason: format!("expected a leading true/false flag, found '{flag}'"),
            });
        };

        let groups = rest
            .split(';')
            .filter(|group| !group.trim().is_empty())
            .map(|group| {
                group
                    .split(',')
                    .map(wkt::parse_coordinate)
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            bidirectional,
            groups,
        })
    }
}
