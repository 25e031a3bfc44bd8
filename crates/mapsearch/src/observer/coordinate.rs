//! Recognizing a typed coordinate pair.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Claim, Flow, SearchObserver, SearchParams};
use crate::geo::LatLon;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinateError {
    #[error("Text is not a coordinate pair")]
    NotCoordinates,
    #[error("Coordinates out of range: {lat}, {lon}")]
    OutOfRange { lat: f64, lon: f64 },
}

// `lat [N|S] <sep> lon [E|W]`, decimal point or comma, optional degree sign.
static COORDINATE_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*([+-]?\d{1,3}(?:[.,]\d+)?)\s*°?\s*([NSns])?\s*[,;\s]\s*([+-]?\d{1,3}(?:[.,]\d+)?)\s*°?\s*([EWew])?\s*$",
    )
    .expect("coordinate pattern is valid")
});

fn component(text: &str, hemisphere: Option<&str>, negative: &[&str]) -> f64 {
    // The pattern guarantees digits with at most one decimal separator.
    let value: f64 = text.replace(',', ".").parse().unwrap_or(f64::NAN);
    match hemisphere {
        Some(h) if negative.contains(&h) => -value.abs(),
        _ => value,
    }
}

/// Parse `text` as a latitude/longitude pair in decimal degrees.
///
/// Accepts `55.75, 37.61`, `55,75 37,61`, `55.75;37.61` and
/// `55.75°N 37.61°E`. Southern and western hemisphere letters negate.
pub fn parse_coordinates(text: &str) -> Result<LatLon, CoordinateError> {
    let captures = COORDINATE_PAIR
        .captures(text)
        .ok_or(CoordinateError::NotCoordinates)?;

    let lat = component(
        &captures[1],
        captures.get(2).map(|m| m.as_str()),
        &["S", "s"],
    );
    let lon = component(
        &captures[3],
        captures.get(4).map(|m| m.as_str()),
        &["W", "w"],
    );

    LatLon::new(lat, lon).ok_or(CoordinateError::OutOfRange { lat, lon })
}

/// Claims searches whose text is a coordinate pair.
#[derive(Debug, Default)]
pub struct CoordinateObserver;

impl CoordinateObserver {
    pub const NAME: &'static str = "coordinates";
}

#[async_trait]
impl SearchObserver for CoordinateObserver {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn observe(&self, params: &SearchParams, _cancel: &CancellationToken) -> Flow {
        match parse_coordinates(&params.text) {
            Ok(point) => Flow::Stop(Claim::Coordinate(point)),
            Err(e) => {
                debug!(text = %params.text, reason = %e, "Not a coordinate search");
                Flow::Next
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(text: &str) -> (f64, f64) {
        let point = parse_coordinates(text).unwrap();
        (point.lat, point.lon)
    }

    #[test]
    fn test_separators() {
        assert_eq!(parsed("55.75, 37.61"), (55.75, 37.61));
        assert_eq!(parsed("55.75 37.61"), (55.75, 37.61));
        assert_eq!(parsed("55.75;37.61"), (55.75, 37.61));
        assert_eq!(parsed("  55.75 ,37.61  "), (55.75, 37.61));
    }

    #[test]
    fn test_decimal_comma() {
        assert_eq!(parsed("55,75 37,61"), (55.75, 37.61));
    }

    #[test]
    fn test_signs_and_hemispheres() {
        assert_eq!(parsed("-33.86, 151.2"), (-33.86, 151.2));
        assert_eq!(parsed("33.86°S 151.2°E"), (-33.86, 151.2));
        assert_eq!(parsed("40.7 n, 74 w"), (40.7, -74.0));
        assert_eq!(parsed("10 20"), (10.0, 20.0));
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(
            parse_coordinates("95, 10"),
            Err(CoordinateError::OutOfRange {
                lat: 95.0,
                lon: 10.0
            })
        );
        assert!(matches!(
            parse_coordinates("10, 181"),
            Err(CoordinateError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_not_coordinates() {
        for text in ["Acme Corp", "55.75", "A-1 37", "55.75, 37.61, 12", "", "1234 5"] {
            assert_eq!(
                parse_coordinates(text),
                Err(CoordinateError::NotCoordinates),
                "{text:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_observer_claims_coordinates() {
        let observer = CoordinateObserver;
        let token = CancellationToken::new();

        let flow = observer
            .observe(&SearchParams::new("55.75, 37.61"), &token)
            .await;
        assert!(matches!(flow, Flow::Stop(Claim::Coordinate(p)) if p.lat == 55.75 && p.lon == 37.61));

        let flow = observer.observe(&SearchParams::new("Acme"), &token).await;
        assert!(matches!(flow, Flow::Next));
    }
}
