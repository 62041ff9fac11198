//! Geopoints - location-tagged points and messages with proximity search
//!
//! Users drop named points on the map and post messages on them. Both can be
//! searched by radius. Searches run on the store's spatial index when one is
//! available and fall back to a haversine scan otherwise.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{
    distance::haversine_km, Coordinate, GeometryPoint, Location, PointFacade, ProximityPlanner,
};
pub use crate::services::{MemoryStore, PointStore, PostgresStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let london = Coordinate::new(51.5074, -0.1278).unwrap();
        let location = Location::from_coordinate(london);
        assert_eq!(location.geometry().x(), -0.1278);
        assert_eq!(haversine_km(0.0, 0.0, 0.0, 0.0), 0.0);
    }
}
