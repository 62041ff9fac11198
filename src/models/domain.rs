use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::coordinate::Location;

pub type PointId = i64;
pub type MessageId = i64;

/// The authenticated caller, supplied by the upstream gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal(Uuid);

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self(user_id)
    }

    pub fn user_id(&self) -> Uuid {
        self.0
    }
}

/// A named geographic point owned by a user
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: PointId,
    pub owner: Uuid,
    pub name: String,
    pub description: String,
    pub location: Option<Location>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a point; `owner` is stamped from the principal
#[derive(Debug, Clone, PartialEq)]
pub struct NewPoint {
    pub owner: Uuid,
    pub name: String,
    pub description: String,
    pub location: Option<Location>,
}

/// Partial update of a point. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<Location>,
}

impl PointChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.location.is_none()
    }

    pub fn apply_to(self, point: &mut Point) {
        if let Some(name) = self.name {
            point.name = name;
        }
        if let Some(description) = self.description {
            point.description = description;
        }
        if let Some(location) = self.location {
            point.location = Some(location);
        }
    }
}

/// A text message attached to a point
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub author: Uuid,
    pub point_id: PointId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub author: Uuid,
    pub point_id: PointId,
    pub content: String,
}

/// A message eagerly joined with its parent point
#[derive(Debug, Clone, PartialEq)]
pub struct MessageWithPoint {
    pub message: Message,
    pub point: Point,
}

/// An entity annotated with its distance from a search center
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<T> {
    pub item: T,
    pub distance_km: f64,
}

/// Entities the proximity planner can filter by location
pub trait Located {
    fn location(&self) -> Option<&Location>;

    /// Stable id used to break distance ties
    fn tie_breaker(&self) -> i64;
}

impl Located for Point {
    fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    fn tie_breaker(&self) -> i64 {
        self.id
    }
}

impl Located for MessageWithPoint {
    fn location(&self) -> Option<&Location> {
        self.point.location.as_ref()
    }

    fn tie_breaker(&self) -> i64 {
        self.message.id
    }
}

/// Filter for point listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointFilter {
    pub owner: Option<Uuid>,
    pub name_contains: Option<String>,
    pub located_only: bool,
}

impl PointFilter {
    /// Every point that carries a location
    pub fn located() -> Self {
        Self {
            located_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, point: &Point) -> bool {
        if self.located_only && point.location.is_none() {
            return false;
        }
        if self.owner.is_some_and(|owner| owner != point.owner) {
            return false;
        }
        if let Some(needle) = &self.name_contains {
            if !point.name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// Filter for message listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageFilter {
    pub point: Option<PointId>,
    pub author: Option<Uuid>,
    pub located_only: bool,
}

impl MessageFilter {
    pub fn located() -> Self {
        Self {
            located_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, message: &Message, point: &Point) -> bool {
        if self.located_only && point.location.is_none() {
            return false;
        }
        if self.point.is_some_and(|id| id != message.point_id) {
            return false;
        }
        if self.author.is_some_and(|author| author != message.author) {
            return false;
        }
        true
    }
}

/// Geospatial bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Split a box whose longitudes run past ±180 into boxes inside the valid range
    pub fn split_at_antimeridian(&self) -> Vec<BoundingBox> {
        if self.max_lon - self.min_lon >= 360.0 {
            return vec![BoundingBox {
                min_lon: -180.0,
                max_lon: 180.0,
                ..*self
            }];
        }
        if self.min_lon < -180.0 {
            return vec![
                BoundingBox {
                    min_lon: self.min_lon + 360.0,
                    max_lon: 180.0,
                    ..*self
                },
                BoundingBox {
                    min_lon: -180.0,
                    ..*self
                },
            ];
        }
        if self.max_lon > 180.0 {
            return vec![
                BoundingBox {
                    max_lon: 180.0,
                    ..*self
                },
                BoundingBox {
                    min_lon: -180.0,
                    max_lon: self.max_lon - 360.0,
                    ..*self
                },
            ];
        }
        vec![*self]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coordinate::Coordinate;

    fn point(id: PointId, name: &str, location: Option<Location>) -> Point {
        Point {
            id,
            owner: Uuid::nil(),
            name: name.to_string(),
            description: String::new(),
            location,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_point_filter() {
        let located = point(1, "Harbour Cafe", Some(Location::from_coordinate(Coordinate::new(1.0, 1.0).unwrap())));
        let bare = point(2, "Nowhere", None);

        assert!(PointFilter::located().matches(&located));
        assert!(!PointFilter::located().matches(&bare));

        let by_name = PointFilter {
            name_contains: Some("harbour".to_string()),
            ..PointFilter::default()
        };
        assert!(by_name.matches(&located));
        assert!(!by_name.matches(&bare));

        let by_owner = PointFilter {
            owner: Some(Uuid::new_v4()),
            ..PointFilter::default()
        };
        assert!(!by_owner.matches(&located));
    }

    #[test]
    fn test_point_changes_apply() {
        let mut target = point(1, "Old", None);
        let location = Location::from_coordinate(Coordinate::new(5.0, 6.0).unwrap());

        PointChanges {
            name: Some("New".to_string()),
            description: None,
            location: Some(location),
        }
        .apply_to(&mut target);

        assert_eq!(target.name, "New");
        assert_eq!(target.description, "");
        assert_eq!(target.location, Some(location));
        assert!(PointChanges::default().is_empty());
    }

    #[test]
    fn test_split_at_antimeridian() {
        let plain = BoundingBox { min_lat: 0.0, max_lat: 1.0, min_lon: 10.0, max_lon: 11.0 };
        assert_eq!(plain.split_at_antimeridian(), vec![plain]);

        let east = BoundingBox { min_lat: 0.0, max_lat: 1.0, min_lon: 179.0, max_lon: 181.0 };
        let parts = east.split_at_antimeridian();
        assert_eq!(parts.len(), 2);
        assert_eq!((parts[0].min_lon, parts[0].max_lon), (179.0, 180.0));
        assert_eq!((parts[1].min_lon, parts[1].max_lon), (-180.0, -179.0));

        let west = BoundingBox { min_lat: 0.0, max_lat: 1.0, min_lon: -181.0, max_lon: -179.0 };
        let parts = west.split_at_antimeridian();
        assert_eq!((parts[0].min_lon, parts[0].max_lon), (179.0, 180.0));
        assert_eq!((parts[1].min_lon, parts[1].max_lon), (-180.0, -179.0));
    }
}
