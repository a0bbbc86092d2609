use clap::{Args, Parser, Subcommand};
use route_corridor::{
    CacheConfig, Config, CorridorQuery, DirectionConfig, DocumentValues, Result,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Route Corridor - Evaluate corridor queries against routes, points and direction payloads
///
/// Documents are read one per line from the input. Each line holds the document field the query
/// needs: a WKT point, a WKT route, or a direction payload.
pub struct Settings {
    /// File with one document value per line (default: stdin)
    #[clap(short, long, global = true, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Maximum number of parsed routes kept in the cache
    #[clap(long, global = true, default_value = "100000")]
    pub max_cache_entries: usize,

    /// Seconds a cached route may stay unused before it is dropped
    #[clap(long, global = true, default_value = "86400")]
    pub cache_ttl_secs: u64,

    /// Print the diagnostics JSON after each value
    #[clap(long, global = true, default_value = "false")]
    pub debug: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Distance in meters from each document point to the route
    Distance {
        /// Route as WKT LineString
        #[clap(long)]
        route: String,
    },

    /// Position in meters along the route of each document point
    Position {
        /// Route as WKT LineString
        #[clap(long)]
        route: String,
    },

    /// Smallest distance in meters from the points to each document route
    PointsDistance(PointsArgs),

    /// Position in meters along each document route of the first point
    PointsPosition(PointsArgs),

    /// Distance in meters from each document route to disks around the points
    Circle {
        #[clap(flatten)]
        points: PointsArgs,

        /// Disk radius in meters
        #[clap(long, default_value = "0")]
        radius: f64,
    },

    /// Raw angle difference in degrees between the points and each document route
    Direction {
        #[clap(flatten)]
        points: PointsArgs,

        /// Ignore point pairs further than this many meters from the route
        #[clap(long)]
        max_lateral_distance: Option<f64>,
    },

    /// 1 if the points travel along each document route, 0 if not, -1 without a route
    InDirection {
        #[clap(flatten)]
        points: PointsArgs,

        #[clap(flatten)]
        options: DirectionOptions,
    },

    /// 1 if each document's direction payload travels along the route, 0 if not
    InDirectionPoints {
        /// Route as WKT LineString
        #[clap(long)]
        route: String,

        #[clap(flatten)]
        options: DirectionOptions,
    },
}

#[derive(Args, Debug, Clone)]
pub struct PointsArgs {
    /// Query point as WKT Point, in travel order (repeat for several)
    #[clap(long = "point", value_name = "WKT", required = true)]
    pub points: Vec<String>,
}

impl PointsArgs {
    fn texts(&self) -> impl Iterator<Item = &str> {
        self.points.iter().map(String::as_str)
    }
}

#[derive(Args, Debug, Clone)]
pub struct DirectionOptions {
    /// Angle tolerance in degrees accepted without corroboration
    #[clap(long, default_value = "0")]
    pub max_difference: f64,

    /// Wider angle tolerance in degrees accepted only when enough points lie near the route
    #[clap(long, default_value = "0")]
    pub max_difference_relaxed: f64,

    /// Also accept points travelling against the route
    #[clap(long, default_value = "false")]
    pub bidirectional: bool,

    /// Lateral distance in meters for the angle gate and the corroboration check
    #[clap(long, default_value = "0.1")]
    pub points_max_distance_to_route: f64,

    /// Percentage of points that must lie within the lateral distance (0-100)
    #[clap(long, default_value = "100")]
    pub percentage_required: u32,

    /// Check the percentage before looking at angles
    #[clap(long, default_value = "false")]
    pub always_check_percentage: bool,
}

impl From<&DirectionOptions> for DirectionConfig {
    fn from(options: &DirectionOptions) -> Self {
        Self {
            max_difference: options.max_difference,
            max_difference_relaxed: options.max_difference_relaxed,
            bidirectional: options.bidirectional,
            points_max_distance_to_route: options.points_max_distance_to_route,
            percentage_required: options.percentage_required,
            always_check_percentage: options.always_check_percentage,
        }
    }
}

impl Settings {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.max_cache_entries,
            time_to_idle: Duration::from_secs(self.cache_ttl_secs),
        }
    }

    pub fn config(&self) -> Config {
        Config {
            cache: self.cache_config(),
            direction: self.command.direction_config(),
        }
    }
}

impl Command {
    /// Direction parameters of the direction-match commands, defaults otherwise
    pub fn direction_config(&self) -> DirectionConfig {
        match self {
            Command::InDirection { options, .. } | Command::InDirectionPoints { options, .. } => {
                options.into()
            }
            _ => DirectionConfig::default(),
        }
    }

    /// Parse the query-side inputs; a malformed one fails the whole run
    pub fn to_query(&self, config: &Config) -> Result<CorridorQuery> {
        match self {
            Command::Distance { route } => CorridorQuery::route_distance(route),
            Command::Position { route } => CorridorQuery::route_position(route),
            Command::PointsDistance(points) => CorridorQuery::points_distance(points.texts()),
            Command::PointsPosition(points) => CorridorQuery::points_position(points.texts()),
            Command::Circle { points, radius } => {
                CorridorQuery::circle_distance(points.texts(), *radius)
            }
            Command::Direction {
                points,
                max_lateral_distance,
            } => CorridorQuery::direction(points.texts(), *max_lateral_distance),
            Command::InDirection { points, .. } => config.in_direction(points.texts()),
            Command::InDirectionPoints { route, .. } => config.in_direction_points(route),
        }
    }

    /// Interpret one input line as the document field this command reads
    pub fn document<'a>(&self, line: &'a str) -> DocumentValues<'a> {
        let line = line.trim();
        if line.is_empty() {
            return DocumentValues::default();
        }
        match self {
            Command::Distance { .. } | Command::Position { .. } => {
                DocumentValues::with_location(line)
            }
            Command::InDirectionPoints { .. } => DocumentValues::with_direction(line),
            _ => DocumentValues::with_route(line),
        }
    }
}
