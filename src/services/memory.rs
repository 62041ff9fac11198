use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rstar::{RTree, RTreeObject, AABB};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::core::coordinate::Coordinate;
use crate::core::distance::calculate_bounding_box;
use crate::models::{
    Message, MessageFilter, MessageId, MessageWithPoint, NewMessage, NewPoint, Point, PointChanges,
    PointFilter, PointId, Ranked,
};
use crate::services::store::{sort_by_distance, PointStore, SpatialMode, SpatialSupport, StoreError};

/// R-tree entry keyed by point id, x = longitude, y = latitude
#[derive(Debug, Clone, Copy, PartialEq)]
struct IndexedPoint {
    id: PointId,
    lon: f64,
    lat: f64,
}

impl IndexedPoint {
    fn of(point: &Point) -> Option<Self> {
        point.location.map(|location| Self {
            id: point.id,
            lon: location.longitude(),
            lat: location.latitude(),
        })
    }
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lon, self.lat])
    }
}

struct MemoryState {
    points: BTreeMap<PointId, Point>,
    messages: BTreeMap<MessageId, Message>,
    index: RTree<IndexedPoint>,
    last_point_id: PointId,
    last_message_id: MessageId,
    last_message_at: Option<DateTime<Utc>>,
}

impl MemoryState {
    fn new() -> Self {
        Self {
            points: BTreeMap::new(),
            messages: BTreeMap::new(),
            index: RTree::new(),
            last_point_id: 0,
            last_message_id: 0,
            last_message_at: None,
        }
    }

    fn index_point(&mut self, point: &Point) {
        if let Some(entry) = IndexedPoint::of(point) {
            self.index.insert(entry);
        }
    }

    fn unindex_point(&mut self, point: &Point) {
        if let Some(entry) = IndexedPoint::of(point) {
            self.index.remove(&entry);
        }
    }

    /// Creation timestamps are strictly increasing even when the clock is not
    fn next_message_time(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created_at = match self.last_message_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_message_at = Some(created_at);
        created_at
    }

    fn point(&self, id: PointId) -> Result<&Point, StoreError> {
        self.points.get(&id).ok_or(StoreError::PointNotFound(id))
    }

    fn joined(&self, message: &Message) -> Result<MessageWithPoint, StoreError> {
        Ok(MessageWithPoint {
            message: message.clone(),
            point: self.point(message.point_id)?.clone(),
        })
    }

    fn ranked_points(&self, center: &Coordinate, radius_km: f64) -> Vec<Ranked<Point>> {
        let bbox = calculate_bounding_box(center.latitude(), center.longitude(), radius_km);

        let mut ranked = Vec::new();
        for part in bbox.split_at_antimeridian() {
            let envelope = AABB::from_corners([part.min_lon, part.min_lat], [part.max_lon, part.max_lat]);
            for entry in self.index.locate_in_envelope(&envelope) {
                let Some(point) = self.points.get(&entry.id) else {
                    continue;
                };
                let Some(location) = point.location else {
                    continue;
                };
                let distance_km = center.distance_km(&location.coordinate());
                if distance_km <= radius_km {
                    ranked.push(Ranked {
                        item: point.clone(),
                        distance_km,
                    });
                }
            }
        }

        sort_by_distance(&mut ranked);
        ranked
    }
}

/// Process-local store.
///
/// With a spatial index the store answers proximity queries from an R-tree
/// pre-filtered by bounding box; without one it reports
/// [`SpatialSupport::Unavailable`] and callers fall back to scanning.
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    spatial: SpatialSupport,
}

impl MemoryStore {
    pub fn new(mode: SpatialMode) -> Self {
        let spatial = match mode {
            SpatialMode::Auto | SpatialMode::Enabled => SpatialSupport::Available,
            SpatialMode::Disabled => SpatialSupport::Unavailable,
        };

        tracing::info!("In-memory store initialized (spatial index: {:?})", spatial);

        Self {
            state: RwLock::new(MemoryState::new()),
            spatial,
        }
    }

    pub fn with_spatial_index() -> Self {
        Self::new(SpatialMode::Enabled)
    }

    pub fn without_spatial_index() -> Self {
        Self::new(SpatialMode::Disabled)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(SpatialMode::Auto)
    }
}

#[async_trait]
impl PointStore for MemoryStore {
    fn spatial_support(&self) -> SpatialSupport {
        self.spatial
    }

    async fn create_point(&self, new: NewPoint) -> Result<Point, StoreError> {
        let mut state = self.state.write().await;
        state.last_point_id += 1;

        let point = Point {
            id: state.last_point_id,
            owner: new.owner,
            name: new.name,
            description: new.description,
            location: new.location,
            created_at: Utc::now(),
        };

        state.index_point(&point);
        state.points.insert(point.id, point.clone());

        tracing::debug!("Created point {} for owner {}", point.id, point.owner);

        Ok(point)
    }

    async fn get_point(&self, id: PointId) -> Result<Point, StoreError> {
        let state = self.state.read().await;
        state.point(id).cloned()
    }

    async fn update_point(&self, id: PointId, changes: PointChanges) -> Result<Point, StoreError> {
        let mut state = self.state.write().await;
        let mut point = state.point(id)?.clone();

        state.unindex_point(&point);
        changes.apply_to(&mut point);
        state.index_point(&point);
        state.points.insert(id, point.clone());

        Ok(point)
    }

    async fn delete_point(&self, id: PointId) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let point = state.points.remove(&id).ok_or(StoreError::PointNotFound(id))?;
        state.unindex_point(&point);

        let before = state.messages.len();
        state.messages.retain(|_, message| message.point_id != id);
        let removed = (before - state.messages.len()) as u64;

        tracing::debug!("Deleted point {} and {} messages", id, removed);

        Ok(removed)
    }

    async fn list_points(&self, filter: &PointFilter) -> Result<Vec<Point>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .points
            .values()
            .filter(|point| filter.matches(point))
            .cloned()
            .collect())
    }

    async fn points_within(
        &self,
        center: &Coordinate,
        radius_km: f64,
    ) -> Result<Vec<Ranked<Point>>, StoreError> {
        if !self.spatial.is_available() {
            return Err(StoreError::SpatialUnavailable(
                "in-memory store running without a spatial index".to_string(),
            ));
        }

        let state = self.state.read().await;
        Ok(state.ranked_points(center, radius_km))
    }

    async fn create_message(&self, new: NewMessage) -> Result<MessageWithPoint, StoreError> {
        let mut state = self.state.write().await;
        let point = state.point(new.point_id)?.clone();

        state.last_message_id += 1;
        let message = Message {
            id: state.last_message_id,
            author: new.author,
            point_id: new.point_id,
            content: new.content,
            created_at: state.next_message_time(),
        };
        state.messages.insert(message.id, message.clone());

        Ok(MessageWithPoint { message, point })
    }

    async fn get_message(&self, id: MessageId) -> Result<MessageWithPoint, StoreError> {
        let state = self.state.read().await;
        let message = state.messages.get(&id).ok_or(StoreError::MessageNotFound(id))?;
        state.joined(message)
    }

    async fn delete_message(&self, id: MessageId) -> Result<Message, StoreError> {
        let mut state = self.state.write().await;
        state.messages.remove(&id).ok_or(StoreError::MessageNotFound(id))
    }

    async fn list_messages(
        &self,
        filter: &MessageFilter,
    ) -> Result<Vec<MessageWithPoint>, StoreError> {
        let state = self.state.read().await;
        let mut joined = Vec::new();
        for message in state.messages.values() {
            let point = state.point(message.point_id)?;
            if filter.matches(message, point) {
                joined.push(MessageWithPoint {
                    message: message.clone(),
                    point: point.clone(),
                });
            }
        }
        Ok(joined)
    }

    async fn messages_within(
        &self,
        center: &Coordinate,
        radius_km: f64,
    ) -> Result<Vec<Ranked<MessageWithPoint>>, StoreError> {
        if !self.spatial.is_available() {
            return Err(StoreError::SpatialUnavailable(
                "in-memory store running without a spatial index".to_string(),
            ));
        }

        let state = self.state.read().await;
        let nearby: HashMap<PointId, Ranked<Point>> = state
            .ranked_points(center, radius_km)
            .into_iter()
            .map(|ranked| (ranked.item.id, ranked))
            .collect();

        let mut ranked: Vec<Ranked<MessageWithPoint>> = state
            .messages
            .values()
            .filter_map(|message| {
                nearby.get(&message.point_id).map(|point| Ranked {
                    item: MessageWithPoint {
                        message: message.clone(),
                        point: point.item.clone(),
                    },
                    distance_km: point.distance_km,
                })
            })
            .collect();

        sort_by_distance(&mut ranked);
        Ok(ranked)
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}
