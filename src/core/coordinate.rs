use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::core::distance::haversine_km;

/// WGS-84 longitude/latitude reference system
pub const WGS84_SRID: i32 = 4326;

pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

/// Errors raised while building or converting coordinates
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    InvalidRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("latitude and longitude must be supplied together")]
    Incomplete,

    #[error("unsupported SRID {0}, expected 4326")]
    UnsupportedSrid(i32),

    #[error("malformed geometry: {0}")]
    MalformedGeometry(String),
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64, CoordinateError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(CoordinateError::InvalidRange { field, value, min, max })
    }
}

/// A validated latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        Ok(Self {
            latitude: check_range("latitude", latitude, MIN_LATITUDE, MAX_LATITUDE)?,
            longitude: check_range("longitude", longitude, MIN_LONGITUDE, MAX_LONGITUDE)?,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Map into a geometry point. Note the axis order: x = longitude, y = latitude.
    pub fn derive_geometry(&self) -> GeometryPoint {
        GeometryPoint {
            point: geo::Point::new(self.longitude, self.latitude),
            srid: WGS84_SRID,
        }
    }

    /// Great-circle distance to another coordinate in kilometers
    #[inline]
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        haversine_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// A 2D point tagged with its spatial reference id.
///
/// Serialized as GeoJSON at the HTTP boundary and as EWKT
/// (`SRID=4326;POINT(lon lat)`) in storage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoJsonPoint", into = "GeoJsonPoint")]
pub struct GeometryPoint {
    point: geo::Point<f64>,
    srid: i32,
}

impl GeometryPoint {
    pub fn new(x: f64, y: f64, srid: i32) -> Self {
        Self {
            point: geo::Point::new(x, y),
            srid,
        }
    }

    pub fn x(&self) -> f64 {
        self.point.x()
    }

    pub fn y(&self) -> f64 {
        self.point.y()
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    pub fn as_geo(&self) -> geo::Point<f64> {
        self.point
    }

    /// Extract the scalar coordinate (y = latitude, x = longitude)
    pub fn sync_to_coordinate(&self) -> Result<Coordinate, CoordinateError> {
        if self.srid != WGS84_SRID {
            return Err(CoordinateError::UnsupportedSrid(self.srid));
        }
        Coordinate::new(self.point.y(), self.point.x())
    }

    pub fn to_ewkt(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GeometryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SRID={};POINT({} {})", self.srid, self.point.x(), self.point.y())
    }
}

impl FromStr for GeometryPoint {
    type Err = CoordinateError;

    /// Parse `POINT(x y)` with an optional `SRID=n;` prefix (defaults to 4326)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CoordinateError::MalformedGeometry(s.to_string());
        let trimmed = s.trim();

        let (srid, wkt) = match trimmed.split_once(';') {
            Some((prefix, rest)) => {
                let prefix = prefix.trim();
                let srid = prefix
                    .get(..5)
                    .filter(|tag| tag.eq_ignore_ascii_case("SRID="))
                    .and_then(|_| prefix.get(5..))
                    .and_then(|value| value.trim().parse::<i32>().ok())
                    .ok_or_else(malformed)?;
                (srid, rest.trim())
            }
            None => (WGS84_SRID, trimmed),
        };

        let body = wkt
            .get(..5)
            .filter(|tag| tag.eq_ignore_ascii_case("POINT"))
            .and_then(|_| wkt.get(5..))
            .map(str::trim)
            .and_then(|rest| rest.strip_prefix('('))
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(malformed)?;

        let mut parts = body.split_whitespace().map(str::parse::<f64>);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(Ok(x)), Some(Ok(y)), None) if x.is_finite() && y.is_finite() => {
                Ok(Self::new(x, y, srid))
            }
            _ => Err(malformed()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeoJsonPoint {
    #[serde(rename = "type")]
    kind: String,
    coordinates: [f64; 2],
}

impl TryFrom<GeoJsonPoint> for GeometryPoint {
    type Error = CoordinateError;

    fn try_from(value: GeoJsonPoint) -> Result<Self, Self::Error> {
        if value.kind != "Point" {
            return Err(CoordinateError::MalformedGeometry(format!(
                "expected GeoJSON type Point, got {}",
                value.kind
            )));
        }
        let [x, y] = value.coordinates;
        Ok(Self::new(x, y, WGS84_SRID))
    }
}

impl From<GeometryPoint> for GeoJsonPoint {
    fn from(value: GeometryPoint) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [value.x(), value.y()],
        }
    }
}

/// A coordinate together with its geometry.
///
/// Both halves are always derived from one another, so a stored location can
/// never carry a stale geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    coordinate: Coordinate,
    geometry: GeometryPoint,
}

impl Location {
    pub fn from_coordinate(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            geometry: coordinate.derive_geometry(),
        }
    }

    /// Back-fill the scalar coordinate from a geometry
    pub fn from_geometry(geometry: GeometryPoint) -> Result<Self, CoordinateError> {
        geometry.sync_to_coordinate().map(Self::from_coordinate)
    }

    /// Pick the sync direction for a write.
    ///
    /// Scalars win when both are present and the geometry is recomputed from
    /// them. A lone geometry back-fills the scalars.
    pub fn resolve(
        latitude: Option<f64>,
        longitude: Option<f64>,
        geometry: Option<GeometryPoint>,
    ) -> Result<Option<Self>, CoordinateError> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) => Coordinate::new(lat, lon).map(|c| Some(Self::from_coordinate(c))),
            (None, None) => geometry.map(Self::from_geometry).transpose(),
            _ => Err(CoordinateError::Incomplete),
        }
    }

    /// Rebuild from persisted columns, preferring the scalar pair
    pub fn from_stored(
        latitude: Option<f64>,
        longitude: Option<f64>,
        geometry: Option<&str>,
    ) -> Result<Option<Self>, CoordinateError> {
        let geometry = geometry.map(GeometryPoint::from_str).transpose()?;
        Self::resolve(latitude, longitude, geometry)
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub fn geometry(&self) -> GeometryPoint {
        self.geometry
    }

    pub fn latitude(&self) -> f64 {
        self.coordinate.latitude()
    }

    pub fn longitude(&self) -> f64 {
        self.coordinate.longitude()
    }
}
