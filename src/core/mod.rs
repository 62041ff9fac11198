// Core exports
pub mod coordinate;
pub mod distance;
pub mod facade;
pub mod planner;

pub use coordinate::{Coordinate, CoordinateError, GeometryPoint, Location};
pub use distance::{calculate_bounding_box, haversine_km, is_within_bounding_box};
pub use facade::{FacadeError, OwnershipPolicy, PointFacade};
pub use planner::{ProximityPlanner, ResultOrdering, SearchError, SearchResult};
