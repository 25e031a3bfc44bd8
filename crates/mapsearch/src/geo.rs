//! Geographic primitives shared by the query, highlight and session layers.
//!
//! Feature envelopes come back from the service in its native projection
//! (Web Mercator, EPSG:3857). The map viewport works in WGS84 latitude and
//! longitude, so [`BBox::to_geo_bounds`] is the single place where the two meet.

use std::{f64::consts::PI, fmt};

const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// A WGS84 position in decimal degrees.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    /// Returns `None` when either component is outside its valid range.
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon))
            .then_some(Self { lat, lon })
    }
}

impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.lat, self.lon)
    }
}

/// Axis-aligned envelope of a feature in Web Mercator metres.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Both corners finite and ordered. Degenerate (point) boxes are valid.
    pub fn is_valid(&self) -> bool {
        [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|v| v.is_finite())
            && self.xmin <= self.xmax
            && self.ymin <= self.ymax
    }

    pub fn to_geo_bounds(&self) -> GeoBounds {
        GeoBounds {
            south_west: mercator_to_lat_lon(self.xmin, self.ymin),
            north_east: mercator_to_lat_lon(self.xmax, self.ymax),
        }
    }

    /// `xmin,ymin,xmax,ymax`, the form the query endpoint accepts.
    pub fn to_param(&self) -> String {
        format!("{},{},{},{}", self.xmin, self.ymin, self.xmax, self.ymax)
    }
}

/// Geographic bounds the viewport can be fitted to.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub south_west: LatLon,
    pub north_east: LatLon,
}

impl GeoBounds {
    pub fn center(&self) -> LatLon {
        LatLon {
            lat: (self.south_west.lat + self.north_east.lat) / 2.0,
            lon: (self.south_west.lon + self.north_east.lon) / 2.0,
        }
    }

    pub fn contains(&self, point: LatLon) -> bool {
        (self.south_west.lat..=self.north_east.lat).contains(&point.lat)
            && (self.south_west.lon..=self.north_east.lon).contains(&point.lon)
    }
}

/// Inverse spherical Mercator projection.
pub fn mercator_to_lat_lon(x: f64, y: f64) -> LatLon {
    let lon = (x / EARTH_RADIUS_M).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - PI / 2.0).to_degrees();
    LatLon { lat, lon }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_origin_maps_to_null_island() {
        let p = mercator_to_lat_lon(0.0, 0.0);
        assert!(close(p.lat, 0.0));
        assert!(close(p.lon, 0.0));
    }

    #[test]
    fn test_known_point() {
        // Moscow, roughly 55.75N 37.61E
        let p = mercator_to_lat_lon(4_186_730.0, 7_510_000.0);
        assert!((p.lat - 55.75).abs() < 0.01, "lat was {}", p.lat);
        assert!((p.lon - 37.61).abs() < 0.01, "lon was {}", p.lon);
    }

    #[test]
    fn test_bbox_to_bounds_keeps_corner_order() {
        let bbox = BBox::new(-1_000.0, -2_000.0, 3_000.0, 4_000.0);
        let bounds = bbox.to_geo_bounds();

        assert!(bounds.south_west.lat < bounds.north_east.lat);
        assert!(bounds.south_west.lon < bounds.north_east.lon);
        assert!(bounds.contains(bounds.center()));
    }

    #[test]
    fn test_bbox_validity() {
        assert!(BBox::new(0.0, 0.0, 0.0, 0.0).is_valid());
        assert!(!BBox::new(1.0, 0.0, 0.0, 1.0).is_valid());
        assert!(!BBox::new(0.0, f64::NAN, 1.0, 1.0).is_valid());
    }

    #[test]
    fn test_lat_lon_range() {
        assert!(LatLon::new(55.75, 37.61).is_some());
        assert!(LatLon::new(90.0, -180.0).is_some());
        assert!(LatLon::new(90.5, 0.0).is_none());
        assert!(LatLon::new(0.0, 181.0).is_none());
    }

    #[test]
    fn test_bbox_param() {
        assert_eq!(BBox::new(1.0, 2.5, 3.0, 4.0).to_param(), "1,2.5,3,4");
    }
}
