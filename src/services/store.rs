use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::core::coordinate::{Coordinate, CoordinateError};
use crate::models::{
    Message, MessageFilter, MessageId, MessageWithPoint, NewMessage, NewPoint, Point, PointChanges,
    PointFilter, PointId, Ranked,
};

/// Errors that can occur when interacting with a point store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The engine cannot run indexed distance queries. Recoverable by
    /// falling back to in-memory haversine filtering.
    #[error("Spatial queries unavailable: {0}")]
    SpatialUnavailable(String),

    #[error("Point {0} not found")]
    PointNotFound(PointId),

    #[error("Message {0} not found")]
    MessageNotFound(MessageId),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Stored row is inconsistent: {0}")]
    CorruptRow(#[from] CoordinateError),
}

/// Whether a store can answer distance queries from a spatial index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialSupport {
    Available,
    Unavailable,
}

impl SpatialSupport {
    pub fn is_available(self) -> bool {
        matches!(self, SpatialSupport::Available)
    }
}

/// Configured spatial capability of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialMode {
    /// Probe the engine at startup
    #[default]
    Auto,
    Enabled,
    Disabled,
}

/// Persistence facade for points and messages.
///
/// Implementations must be safe to share across request handlers. Every
/// location handed to a write is already synced (see
/// [`Location`](crate::core::coordinate::Location)), so stores persist the
/// scalar and geometry halves together.
#[async_trait]
pub trait PointStore: Send + Sync {
    /// Capability probe for the indexed proximity path
    fn spatial_support(&self) -> SpatialSupport;

    async fn create_point(&self, new: NewPoint) -> Result<Point, StoreError>;

    async fn get_point(&self, id: PointId) -> Result<Point, StoreError>;

    async fn update_point(&self, id: PointId, changes: PointChanges) -> Result<Point, StoreError>;

    /// Delete a point and, by cascade, its messages. Returns the number of
    /// messages removed.
    async fn delete_point(&self, id: PointId) -> Result<u64, StoreError>;

    async fn list_points(&self, filter: &PointFilter) -> Result<Vec<Point>, StoreError>;

    /// Points within `radius_km` of `center`, sorted ascending by distance
    /// then id. Fails with [`StoreError::SpatialUnavailable`] when the engine
    /// has no spatial support.
    async fn points_within(
        &self,
        center: &Coordinate,
        radius_km: f64,
    ) -> Result<Vec<Ranked<Point>>, StoreError>;

    /// Fails with [`StoreError::PointNotFound`] when the parent point does not
    /// exist; nothing is persisted in that case.
    async fn create_message(&self, new: NewMessage) -> Result<MessageWithPoint, StoreError>;

    async fn get_message(&self, id: MessageId) -> Result<MessageWithPoint, StoreError>;

    async fn delete_message(&self, id: MessageId) -> Result<Message, StoreError>;

    /// Messages joined with their parent point
    async fn list_messages(&self, filter: &MessageFilter)
        -> Result<Vec<MessageWithPoint>, StoreError>;

    /// Messages whose point lies within `radius_km`, sorted ascending by
    /// distance then message id
    async fn messages_within(
        &self,
        center: &Coordinate,
        radius_km: f64,
    ) -> Result<Vec<Ranked<MessageWithPoint>>, StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError>;
}

/// Sort ranked results by distance, breaking ties with the entity id
pub fn sort_by_distance<T: crate::models::Located>(ranked: &mut [Ranked<T>]) {
    ranked.sort_by(|a, b| {
        a.distance_km
            .total_cmp(&b.distance_km)
            .then_with(|| a.item.tie_breaker().cmp(&b.item.tie_breaker()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn ranked(id: PointId, distance_km: f64) -> Ranked<Point> {
        Ranked {
            item: Point {
                id,
                owner: Uuid::nil(),
                name: format!("p{}", id),
                description: String::new(),
                location: None,
                created_at: Utc::now(),
            },
            distance_km,
        }
    }

    #[test]
    fn test_sort_by_distance_breaks_ties_by_id() {
        let mut items = vec![ranked(3, 2.0), ranked(2, 1.0), ranked(1, 2.0)];
        sort_by_distance(&mut items);

        let ids: Vec<_> = items.iter().map(|r| r.item.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_spatial_mode_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: SpatialMode,
        }

        let parsed: Wrapper = serde_json::from_str(r#"{"mode":"disabled"}"#).unwrap();
        assert_eq!(parsed.mode, SpatialMode::Disabled);
        assert_eq!(SpatialMode::default(), SpatialMode::Auto);
    }
}
