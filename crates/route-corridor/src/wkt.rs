//! WKT text layer for routes and points
//!
//! Only the two shapes corridor queries deal with are understood: `LINESTRING(x y, ...)` and
//! `POINT(x y)`. Keywords are case-insensitive and whitespace between tokens is free.

use crate::{CorridorError, Coordinate, Result, Route};
use std::sync::Arc;

const LINESTRING: &str = "LINESTRING";
const POINT: &str = "POINT";

/// Parse a WKT LineString into a route
///
/// `LINESTRING()` and `LINESTRING EMPTY` yield the empty-route sentinel. Missing delimiters or a
/// malformed coordinate are reported as errors.
pub fn parse_linestring(text: &str) -> Result<Arc<Route>> {
    let body = tagged_body(text, LINESTRING)
        .ok_or_else(|| CorridorError::InvalidLineString(text.to_string()))?;

    if body.trim().is_empty() {
        return Ok(Route::empty());
    }

    let coordinates = body
        .split(',')
        .map(parse_coordinate)
        .collect::<Result<Vec<_>>>()?;

    Ok(Route::new(coordinates))
}

/// Parse a WKT Point into a coordinate
pub fn parse_point(text: &str) -> Result<Coordinate> {
    let body =
        tagged_body(text, POINT).ok_or_else(|| CorridorError::InvalidPoint(text.to_string()))?;
    if body.trim().is_empty() {
        return Err(CorridorError::InvalidPoint(text.to_string()));
    }
    parse_coordinate(body)
}

/// Parse a bare `x y` coordinate pair
pub fn parse_coordinate(raw: &str) -> Result<Coordinate> {
    let invalid = || CorridorError::InvalidCoordinate(raw.trim().to_string());

    let mut ordinates = raw.split_whitespace().map(|token| {
        token
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
    });

    let x = ordinates.next().flatten().ok_or_else(invalid)?;
    let y = ordinates.next().flatten().ok_or_else(invalid)?;
    if ordinates.next().is_some() {
        return Err(invalid());
    }

    Ok(Coordinate { x, y })
}

/// Whitespace-insensitive canonical text of a WKT geometry
///
/// Runs of whitespace collapse to one space, whitespace next to `(`, `)` and `,` is dropped and
/// letters are upper-cased. Texts with equal canonical forms describe the same geometry.
pub fn canonical_form(text: &str) -> String {
    let mut canonical = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.trim().chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }

        let is_delimiter = matches!(ch, '(' | ')' | ',');
        if pending_space && !is_delimiter && !canonical.ends_with(['(', ')', ',']) {
            canonical.push(' ');
        }
        pending_space = false;
        canonical.push(ch.to_ascii_uppercase());
    }

    canonical
}

/// Format a route back into canonical WKT
pub fn to_wkt(route: &Route) -> String {
    let coordinates = route
        .coordinates()
        .iter()
        .map(|c| format!("{} {}", c.x, c.y))
        .collect::<Vec<_>>()
        .join(",");
    format!("{LINESTRING}({coordinates})")
}

/// Return the text between `KEYWORD(` and the closing `)`, or `""` for `KEYWORD EMPTY`
fn tagged_body<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let text = text.trim();
    let prefix = text.get(..keyword.len())?;
    if !prefix.eq_ignore_ascii_case(keyword) {
        return None;
    }

    let rest = text[keyword.len()..].trim_start();
    if rest.eq_ignore_ascii_case("EMPTY") {
        return Some("");
    }

    rest.strip_prefix('(')?.strip_suffix(')')
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn test_parse_linestring() {
        let route = parse_linestring("LINESTRING(16.2075 48.3849, 16.2071 48.3847)").unwrap();
        assert_eq!(route.len(), 2);
        assert_eq!(route.first(), Some(coord! { x: 16.2075, y: 48.3849 }));
        assert_eq!(route.last(), Some(coord! { x: 16.2071, y: 48.3847 }));
    }

    #[test]
    fn test_parse_linestring_keeps_full_precision() {
        let route =
            parse_linestring("LINESTRING(13.789743483066559 47.76935515104816, 13.79 47.77)")
                .unwrap();
        let first = route.first().unwrap();
        assert_eq!(first.x, 13.789743483066559);
        assert_eq!(first.y, 47.76935515104816);
    }

    #[test]
    fn test_parse_linestring_is_lenient_with_whitespace_and_case() {
        let route = parse_linestring("  linestring ( 0 0 ,1   0,  2 1 )  ").unwrap();
        assert_eq!(route.len(), 3);
        assert_eq!(route.coordinate(2), Some(coord! { x: 2.0, y: 1.0 }));
    }

    #[test]
    fn test_parse_empty_linestring() {
        assert!(parse_linestring("LINESTRING()").unwrap().is_empty());
        assert!(parse_linestring("LINESTRING( )").unwrap().is_empty());
        assert!(parse_linestring("LINESTRING EMPTY").unwrap().is_empty());
    }

    #[test]
    fn test_parse_linestring_rejects_missing_delimiters() {
        assert!(matches!(
            parse_linestring("0 0, 1 0"),
            Err(CorridorError::InvalidLineString(_))
        ));
        assert!(matches!(
            parse_linestring("LINESTRING(0 0, 1 0"),
            Err(CorridorError::InvalidLineString(_))
        ));
        assert!(matches!(
            parse_linestring("POINT(0 0)"),
            Err(CorridorError::InvalidLineString(_))
        ));
    }

    #[test]
    fn test_parse_linestring_rejects_bad_coordinates() {
        assert!(matches!(
            parse_linestring("LINESTRING(0 0, 1)"),
            Err(CorridorError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            parse_linestring("LINESTRING(0 0, a b)"),
            Err(CorridorError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            parse_linestring("LINESTRING(0 0 0, 1 1 1)"),
            Err(CorridorError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            parse_linestring("LINESTRING(0 0,, 1 1)"),
            Err(CorridorError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            parse_linestring("LINESTRING(NaN 0, 1 1)"),
            Err(CorridorError::InvalidCoordinate(_))
        ));
    }

    #[test]
    fn test_parse_point() {
        assert_eq!(
            parse_point("POINT(16.2075 48.3849)").unwrap(),
            coord! { x: 16.2075, y: 48.3849 }
        );
        assert_eq!(parse_point("point (1 2)").unwrap(), coord! { x: 1.0, y: 2.0 });
        assert!(parse_point("POINT()").is_err());
        assert!(parse_point("16.2075 48.3849").is_err());
        assert!(parse_point("POINT(1 2 3)").is_err());
    }

    #[test]
    fn test_canonical_form() {
        assert_eq!(
            canonical_form("LINESTRING(0 0, 1 0)"),
            canonical_form(" linestring ( 0  0 ,1\t0 ) ")
        );
        assert_eq!(canonical_form("LINESTRING (0 0, 1 0)"), "LINESTRING(0 0,1 0)");
        assert_ne!(
            canonical_form("LINESTRING(0 0, 1 0)"),
            canonical_form("LINESTRING(1 0, 0 0)")
        );
    }

    #[test]
    fn test_to_wkt_parses_back() {
        let route = parse_linestring("LINESTRING(0.5 1.25, -3 4)").unwrap();
        let text = to_wkt(&route);
        assert_eq!(text, "LINESTRING(0.5 1.25,-3 4)");
        assert_eq!(parse_linestring(&text).unwrap(), route);
    }
}
