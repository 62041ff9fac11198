use crate::models::BoundingBox;

/// Earth's mean radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Slack added to bounding boxes so points lying exactly on the radius survive
/// floating-point rounding in the pre-filter.
const BOX_PADDING_DEG: f64 = 1e-9;

/// Calculate the Haversine distance between two points in kilometers
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
///
/// # Returns
/// Distance in kilometers
#[inline]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Calculate a bounding box enclosing every point within `radius_km` of a center
///
/// Uses the angular radius on the sphere, so the box is exact rather than the
/// 111 km/degree rule of thumb. Longitudes may fall outside [-180, 180] when the
/// box crosses the antimeridian; see [`BoundingBox::split_at_antimeridian`].
/// When the circle reaches a pole the box spans every longitude.
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    let angular = radius_km / EARTH_RADIUS_KM;
    let lat_rad = lat.to_radians();

    let min_lat = (lat_rad - angular).to_degrees() - BOX_PADDING_DEG;
    let max_lat = (lat_rad + angular).to_degrees() + BOX_PADDING_DEG;

    if min_lat <= -90.0 || max_lat >= 90.0 {
        return BoundingBox {
            min_lat: min_lat.max(-90.0),
            max_lat: max_lat.min(90.0),
            min_lon: -180.0,
            max_lon: 180.0,
        };
    }

    let lon_delta = (angular.sin() / lat_rad.cos()).min(1.0).asin().to_degrees() + BOX_PADDING_DEG;

    BoundingBox {
        min_lat,
        max_lat,
        min_lon: lon - lon_delta,
        max_lon: lon + lon_delta,
    }
}

/// Check if a point is within a bounding box
#[inline]
pub fn is_within_bounding_box(
    lat: f64,
    lon: f64,
    bbox: &BoundingBox,
) -> bool {
    lat >= bbox.min_lat
        && lat <= bbox.max_lat
        && lon >= bbox.min_lon
        && lon <= bbox.max_lon
}
