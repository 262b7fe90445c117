//! Point geometry reader
//!
//! The tree table stores each location as a raw point string such as
//! `POINT (174.82 -41.31)` or `(174.82, -41.31)`. The source order is
//! (longitude, latitude); the resulting `geo::Point` keeps longitude on
//! the x axis and latitude on the y axis.

use geo::Point;

use crate::error::GeometryError;

/// Valid latitude range in degrees
const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;
/// Valid longitude range in degrees
const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

/// Read a raw point string into a validated location
///
/// Everything other than digits, commas, periods, minus signs and
/// whitespace is blanked out (this drops the `POINT` tag and the
/// parentheses). Commas separate fields just like whitespace does.
/// Exactly two finite numbers must remain, in (longitude, latitude) order.
pub fn parse_point(raw: &str) -> Result<Point<f64>, GeometryError> {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_digit() || matches!(c, ',' | '.' | '-') || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let tokens: Vec<&str> = cleaned
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .collect();

    let [lon_token, lat_token] = tokens.as_slice() else {
        return Err(GeometryError::malformed(
            raw,
            format!("expected 2 numeric fields, found {}", tokens.len()),
        ));
    };

    let longitude = parse_coordinate(raw, lon_token)?;
    let latitude = parse_coordinate(raw, lat_token)?;

    if !LATITUDE_RANGE.contains(&latitude) {
        return Err(GeometryError::malformed(
            raw,
            format!("latitude {latitude} is outside [-90, 90]"),
        ));
    }
    if !LONGITUDE_RANGE.contains(&longitude) {
        return Err(GeometryError::malformed(
            raw,
            format!("longitude {longitude} is outside [-180, 180]"),
        ));
    }

    Ok(Point::new(longitude, latitude))
}

fn parse_coordinate(raw: &str, token: &str) -> Result<f64, GeometryError> {
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(GeometryError::malformed(
            raw,
            format!("{token:?} is not a number"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parenthesized_pair_is_swapped() {
        let point = parse_point("(174.82, -41.31)").unwrap();
        assert_eq!(point.y(), -41.31);
        assert_eq!(point.x(), 174.82);
    }

    #[test]
    fn test_wkt_point() {
        let point = parse_point("POINT (174.7762 -41.2865)").unwrap();
        assert_eq!(point.x(), 174.7762);
        assert_eq!(point.y(), -41.2865);
    }

    #[test]
    fn test_wrong_field_count() {
        assert!(parse_point("POINT (174.82)").is_err());
        assert!(parse_point("POINT Z (174.82 -41.31 12.0)").is_err());
        assert!(parse_point("").is_err());
    }

    #[test]
    fn test_unparseable_token() {
        let err = parse_point("(174.82.1 -41.31)").unwrap_err();
        assert!(matches!(err, GeometryError::MalformedGeometry { .. }));
        assert!(parse_point("(- -41.31)").is_err());
    }

    #[test]
    fn test_out_of_range() {
        // Swapped columns put the longitude into the latitude slot
        assert!(parse_point("(-41.31 174.82)").is_err());
        assert!(parse_point("(181.0 10.0)").is_err());
    }

    #[test]
    fn test_range_edges_are_valid() {
        let point = parse_point("(-180 90)").unwrap();
        assert_eq!(point.x(), -180.0);
        assert_eq!(point.y(), 90.0);
    }
}
