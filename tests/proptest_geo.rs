//! Property-based tests for coordinates, geometry sync and distance.

use geopoints::core::coordinate::{Coordinate, GeometryPoint, Location};
use geopoints::core::distance::{calculate_bounding_box, haversine_km, is_within_bounding_box};
use geopoints::core::planner::{validate_radius, SearchError};
use proptest::prelude::*;

const TOLERANCE: f64 = 1e-9;

fn latitude() -> impl Strategy<Value = f64> {
    -90.0..=90.0f64
}

fn longitude() -> impl Strategy<Value = f64> {
    -180.0..=180.0f64
}

proptest! {
    /// Deriving a geometry and syncing back recovers the coordinate
    #[test]
    fn geometry_round_trip(lat in latitude(), lon in longitude()) {
        let coordinate = Coordinate::new(lat, lon).unwrap();
        let back = coordinate.derive_geometry().sync_to_coordinate().unwrap();

        prop_assert!((back.latitude() - lat).abs() < TOLERANCE);
        prop_assert!((back.longitude() - lon).abs() < TOLERANCE);
    }

    /// EWKT written for storage parses back to the same geometry
    #[test]
    fn ewkt_round_trip(lat in latitude(), lon in longitude()) {
        let geometry = Coordinate::new(lat, lon).unwrap().derive_geometry();
        let parsed: GeometryPoint = geometry.to_ewkt().parse().unwrap();

        prop_assert_eq!(parsed, geometry);
    }

    /// A resolved location always has its two halves in sync
    #[test]
    fn resolved_location_is_synced(lat in latitude(), lon in longitude()) {
        let location = Location::resolve(Some(lat), Some(lon), None).unwrap().unwrap();

        prop_assert_eq!(location.geometry().y(), location.latitude());
        prop_assert_eq!(location.geometry().x(), location.longitude());
    }

    #[test]
    fn out_of_range_latitude_rejected(lat in 90.0001..1000.0f64, lon in longitude()) {
        prop_assert!(Coordinate::new(lat, lon).is_err());
        prop_assert!(Coordinate::new(-lat, lon).is_err());
    }

    #[test]
    fn haversine_identity(lat in latitude(), lon in longitude()) {
        prop_assert_eq!(haversine_km(lat, lon, lat, lon), 0.0);
    }

    #[test]
    fn haversine_symmetric(
        lat1 in latitude(), lon1 in longitude(),
        lat2 in latitude(), lon2 in longitude(),
    ) {
        let forward = haversine_km(lat1, lon1, lat2, lon2);
        let backward = haversine_km(lat2, lon2, lat1, lon1);

        prop_assert!((forward - backward).abs() < 1e-6);
        prop_assert!(forward >= 0.0);
        // Half the circumference of a 6371 km sphere
        prop_assert!(forward <= 20015.1);
    }

    /// Every point within the radius lies in one part of the bounding box
    #[test]
    fn bounding_box_contains_radius(
        lat in -80.0..80.0f64, lon in longitude(),
        radius in 0.1..500.0f64,
        bearing in 0.0..360.0f64, fraction in 0.0..1.0f64,
    ) {
        // Destination point along a great circle
        let distance = radius * fraction;
        let angular = distance / 6371.0;
        let (lat_r, lon_r, brg) = (lat.to_radians(), lon.to_radians(), bearing.to_radians());
        let dest_lat = (lat_r.sin() * angular.cos() + lat_r.cos() * angular.sin() * brg.cos()).asin();
        let dest_lon = lon_r
            + (brg.sin() * angular.sin() * lat_r.cos()).atan2(angular.cos() - lat_r.sin() * dest_lat.sin());
        let dest_lat = dest_lat.to_degrees();
        let dest_lon = (dest_lon.to_degrees() + 540.0) % 360.0 - 180.0;

        let parts = calculate_bounding_box(lat, lon, radius).split_at_antimeridian();
        prop_assert!(parts.iter().any(|part| is_within_bounding_box(dest_lat, dest_lon, part)));
    }

    #[test]
    fn invalid_radius_rejected(radius in prop_oneof![-1000.0..=0.0f64, 1000.0001..1e6f64]) {
        prop_assert!(matches!(validate_radius(radius), Err(SearchError::InvalidParameter(_))));
    }

    #[test]
    fn valid_radius_accepted(radius in 0.0001..=1000.0f64) {
        prop_assert_eq!(validate_radius(radius).unwrap(), radius);
    }
}
