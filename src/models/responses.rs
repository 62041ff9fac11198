use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::coordinate::GeometryPoint;
use crate::models::domain::{MessageId, MessageWithPoint, Point, PointId, Ranked};

/// Serialized point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointResponse {
    pub id: PointId,
    pub owner: Uuid,
    pub name: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: Option<GeometryPoint>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl From<Point> for PointResponse {
    fn from(point: Point) -> Self {
        Self {
            id: point.id,
            owner: point.owner,
            name: point.name,
            description: point.description,
            latitude: point.location.map(|l| l.latitude()),
            longitude: point.location.map(|l| l.longitude()),
            location: point.location.map(|l| l.geometry()),
            created_at: point.created_at,
            distance_km: None,
        }
    }
}

impl From<Ranked<Point>> for PointResponse {
    fn from(ranked: Ranked<Point>) -> Self {
        Self {
            distance_km: Some(ranked.distance_km),
            ..Self::from(ranked.item)
        }
    }
}

/// Serialized message; coordinates come from the parent point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: MessageId,
    pub author: Uuid,
    pub point: PointId,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl From<MessageWithPoint> for MessageResponse {
    fn from(value: MessageWithPoint) -> Self {
        let MessageWithPoint { message, point } = value;
        Self {
            id: message.id,
            author: message.author,
            point: message.point_id,
            content: message.content,
            created_at: message.created_at,
            latitude: point.location.map(|l| l.latitude()),
            longitude: point.location.map(|l| l.longitude()),
            distance_km: None,
        }
    }
}

impl From<Ranked<MessageWithPoint>> for MessageResponse {
    fn from(ranked: Ranked<MessageWithPoint>) -> Self {
        Self {
            distance_km: Some(ranked.distance_km),
            ..Self::from(ranked.item)
        }
    }
}

/// Result of deleting a point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePointResponse {
    pub id: PointId,
    pub messages_deleted: u64,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub spatial_index: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
