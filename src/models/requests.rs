use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use crate::core::coordinate::{Coordinate, GeometryPoint};
use crate::core::planner::SearchError;
use crate::models::domain::{MessageFilter, PointFilter, PointId};

/// Request to create a point
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePointRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    #[serde(default, alias = "lat")]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    #[serde(default, alias = "lon")]
    pub longitude: Option<f64>,
    /// GeoJSON point; back-fills latitude/longitude when those are absent
    #[serde(default)]
    pub location: Option<GeometryPoint>,
}

/// Partial update of a point
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePointRequest {
    #[validate(length(min = 1, max = 100))]
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    #[serde(default, alias = "lat")]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    #[serde(default, alias = "lon")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub location: Option<GeometryPoint>,
}

impl From<CreatePointRequest> for UpdatePointRequest {
    /// Full replacement: an omitted description is cleared
    fn from(value: CreatePointRequest) -> Self {
        Self {
            name: Some(value.name),
            description: Some(value.description.unwrap_or_default()),
            latitude: value.latitude,
            longitude: value.longitude,
            location: value.location,
        }
    }
}

/// Request to post a message on a point
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateMessageRequest {
    pub point: PointId,
    #[validate(length(min = 1))]
    pub content: String,
}

/// Query string for point listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointListQuery {
    pub owner: Option<Uuid>,
    pub name: Option<String>,
}

impl From<PointListQuery> for PointFilter {
    fn from(value: PointListQuery) -> Self {
        Self {
            owner: value.owner,
            name_contains: value.name.filter(|name| !name.is_empty()),
            located_only: false,
        }
    }
}

/// Query string for message listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageListQuery {
    pub point: Option<PointId>,
    pub author: Option<Uuid>,
}

impl From<MessageListQuery> for MessageFilter {
    fn from(value: MessageListQuery) -> Self {
        Self {
            point: value.point,
            author: value.author,
            located_only: false,
        }
    }
}

pub const MISSING_GEO_PARAMETERS: &str = "latitude, longitude, radius are required";
pub const INVALID_GEO_PARAMETERS: &str = "Invalid geo parameters";

/// Raw proximity-search parameters as they arrive on the query string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub radius: Option<String>,
}

impl SearchParams {
    /// Read `latitude`|`lat`, `longitude`|`lon` and `radius`; the long names win
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        let pick = |long: &str, short: Option<&str>| {
            query
                .get(long)
                .or_else(|| short.and_then(|key| query.get(key)))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            latitude: pick("latitude", Some("lat")),
            longitude: pick("longitude", Some("lon")),
            radius: pick("radius", None),
        }
    }

    /// Parse into a validated center and a raw radius.
    ///
    /// The radius range is checked by the planner itself.
    pub fn parse(&self) -> Result<(Coordinate, f64), SearchError> {
        let (Some(latitude), Some(longitude), Some(radius)) =
            (&self.latitude, &self.longitude, &self.radius)
        else {
            return Err(SearchError::MissingParameter(MISSING_GEO_PARAMETERS.to_string()));
        };

        let parse = |value: &str| {
            value
                .parse::<f64>()
                .ok()
                .filter(|number| number.is_finite())
                .ok_or_else(|| SearchError::InvalidParameter(INVALID_GEO_PARAMETERS.to_string()))
        };

        let latitude = parse(latitude)?;
        let longitude = parse(longitude)?;
        let radius = parse(radius)?;

        let center = Coordinate::new(latitude, longitude)
            .map_err(|e| SearchError::InvalidParameter(e.to_string()))?;

        Ok((center, radius))
    }
}
