use thiserror::Error;

use crate::core::coordinate::Coordinate;
use crate::models::{Located, MessageFilter, MessageWithPoint, Point, PointFilter, Ranked};
use crate::services::store::{sort_by_distance, PointStore, StoreError};

/// Largest accepted search radius in kilometres
pub const MAX_RADIUS_KM: f64 = 1000.0;

pub const INVALID_RADIUS: &str = "radius must be greater than 0 and at most 1000 km";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0}")]
    MissingParameter(String),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Reject radii outside `(0, MAX_RADIUS_KM]`. NaN fails both comparisons.
pub fn validate_radius(radius_km: f64) -> Result<f64, SearchError> {
    if radius_km > 0.0 && radius_km <= MAX_RADIUS_KM {
        Ok(radius_km)
    } else {
        Err(SearchError::InvalidParameter(INVALID_RADIUS.to_string()))
    }
}

/// Ordering guarantee of a search result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOrdering {
    /// Ascending by distance, ties broken by id
    DistanceAscending,
    /// Store order; no distance ordering is promised
    Unordered,
}

impl ResultOrdering {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultOrdering::DistanceAscending => "distance",
            ResultOrdering::Unordered => "unordered",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult<T> {
    pub ordering: ResultOrdering,
    pub matches: Vec<Ranked<T>>,
}

impl<T: Located> SearchResult<T> {
    fn indexed(mut matches: Vec<Ranked<T>>) -> Self {
        sort_by_distance(&mut matches);
        Self {
            ordering: ResultOrdering::DistanceAscending,
            matches,
        }
    }

    fn unordered(matches: Vec<Ranked<T>>) -> Self {
        Self {
            ordering: ResultOrdering::Unordered,
            matches,
        }
    }
}

/// Keep candidates whose location lies within `radius_km` of `center`,
/// preserving input order. Candidates without a location are dropped.
pub fn filter_within_radius<T: Located>(
    candidates: Vec<T>,
    center: &Coordinate,
    radius_km: f64,
) -> Vec<Ranked<T>> {
    candidates
        .into_iter()
        .filter_map(|item| {
            let distance_km = center.distance_km(&item.location()?.coordinate());
            (distance_km <= radius_km).then_some(Ranked { item, distance_km })
        })
        .collect()
}

/// Chooses between the store's indexed proximity query and an in-memory
/// haversine scan.
///
/// The indexed path returns results sorted by distance. The fallback path
/// returns the same set in store order.
#[derive(Debug, Clone, Copy)]
pub struct ProximityPlanner {
    fallback_on_query_error: bool,
}

impl Default for ProximityPlanner {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ProximityPlanner {
    pub fn new(fallback_on_query_error: bool) -> Self {
        Self {
            fallback_on_query_error,
        }
    }

    pub async fn search_points(
        &self,
        store: &dyn PointStore,
        center: &Coordinate,
        radius_km: f64,
    ) -> Result<SearchResult<Point>, SearchError> {
        let radius_km = validate_radius(radius_km)?;

        if store.spatial_support().is_available() {
            match store.points_within(center, radius_km).await {
                Ok(matches) => {
                    tracing::debug!("Indexed point search returned {} matches", matches.len());
                    return Ok(SearchResult::indexed(matches));
                }
                Err(e) => self.recover(e)?,
            }
        }

        let candidates = store.list_points(&PointFilter::located()).await?;
        let matches = filter_within_radius(candidates, center, radius_km);
        tracing::debug!("Fallback point search returned {} matches", matches.len());

        Ok(SearchResult::unordered(matches))
    }

    pub async fn search_messages(
        &self,
        store: &dyn PointStore,
        center: &Coordinate,
        radius_km: f64,
    ) -> Result<SearchResult<MessageWithPoint>, SearchError> {
        let radius_km = validate_radius(radius_km)?;

        if store.spatial_support().is_available() {
            match store.messages_within(center, radius_km).await {
                Ok(matches) => {
                    tracing::debug!("Indexed message search returned {} matches", matches.len());
                    return Ok(SearchResult::indexed(matches));
                }
                Err(e) => self.recover(e)?,
            }
        }

        let candidates = store.list_messages(&MessageFilter::located()).await?;
        let matches = filter_within_radius(candidates, center, radius_km);
        tracing::debug!("Fallback message search returned {} matches", matches.len());

        Ok(SearchResult::unordered(matches))
    }

    /// Decide whether a failed indexed query may fall back to scanning
    fn recover(&self, error: StoreError) -> Result<(), SearchError> {
        match error {
            StoreError::SpatialUnavailable(reason) => {
                tracing::debug!("Spatial index unavailable, scanning instead: {}", reason);
                Ok(())
            }
            other if self.fallback_on_query_error => {
                tracing::warn!("Indexed proximity query failed, falling back: {}", other);
                Ok(())
            }
            other => Err(SearchError::Store(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coordinate::Location;
    use crate::models::{
        Message, MessageId, NewMessage, NewPoint, PointChanges, PointId,
    };
    use crate::services::memory::MemoryStore;
    use crate::services::store::SpatialSupport;
    use async_trait::async_trait;
    use uuid::Uuid;

    /// Store that claims an index but fails every indexed query
    struct BrokenIndex {
        inner: MemoryStore,
        list_fails: bool,
    }

    impl BrokenIndex {
        fn new() -> Self {
            Self {
                inner: MemoryStore::with_spatial_index(),
                list_fails: false,
            }
        }
    }

    fn broken() -> StoreError {
        StoreError::SqlxError(sqlx::Error::PoolTimedOut)
    }

    #[async_trait]
    impl PointStore for BrokenIndex {
        fn spatial_support(&self) -> SpatialSupport {
            SpatialSupport::Available
        }

        async fn create_point(&self, new: NewPoint) -> Result<Point, StoreError> {
            self.inner.create_point(new).await
        }

        async fn get_point(&self, id: PointId) -> Result<Point, StoreError> {
            self.inner.get_point(id).await
        }

        async fn update_point(&self, id: PointId, changes: PointChanges) -> Result<Point, StoreError> {
            self.inner.update_point(id, changes).await
        }

        async fn delete_point(&self, id: PointId) -> Result<u64, StoreError> {
            self.inner.delete_point(id).await
        }

        async fn list_points(&self, filter: &PointFilter) -> Result<Vec<Point>, StoreError> {
            if self.list_fails {
                return Err(broken());
            }
            self.inner.list_points(filter).await
        }

        async fn points_within(
            &self,
            _center: &Coordinate,
            _radius_km: f64,
        ) -> Result<Vec<Ranked<Point>>, StoreError> {
            Err(broken())
        }

        async fn create_message(&self, new: NewMessage) -> Result<MessageWithPoint, StoreError> {
            self.inner.create_message(new).await
        }

        async fn get_message(&self, id: MessageId) -> Result<MessageWithPoint, StoreError> {
            self.inner.get_message(id).await
        }

        async fn delete_message(&self, id: MessageId) -> Result<Message, StoreError> {
            self.inner.delete_message(id).await
        }

        async fn list_messages(
            &self,
            filter: &MessageFilter,
        ) -> Result<Vec<MessageWithPoint>, StoreError> {
            self.inner.list_messages(filter).await
        }

        async fn messages_within(
            &self,
            _center: &Coordinate,
            _radius_km: f64,
        ) -> Result<Vec<Ranked<MessageWithPoint>>, StoreError> {
            Err(broken())
        }

        async fn health_check(&self) -> Result<bool, StoreError> {
            Ok(true)
        }
    }

    fn coordinate(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    async fn seed(store: &dyn PointStore, coords: &[(f64, f64)]) -> Vec<Point> {
        let mut points = Vec::new();
        for (i, (lat, lon)) in coords.iter().enumerate() {
            let point = store
                .create_point(NewPoint {
                    owner: Uuid::new_v4(),
                    name: format!("p{}", i),
                    description: String::new(),
                    location: Some(Location::from_coordinate(coordinate(*lat, *lon))),
                })
                .await
                .unwrap();
            points.push(point);
        }
        points
    }

    #[test]
    fn test_validate_radius() {
        assert!(validate_radius(0.001).is_ok());
        assert!(validate_radius(MAX_RADIUS_KM).is_ok());

        for bad in [0.0, -1.0, 1000.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                validate_radius(bad),
                Err(SearchError::InvalidParameter(msg)) if msg == INVALID_RADIUS
            ));
        }
    }

    #[test]
    fn test_result_ordering_labels() {
        assert_eq!(ResultOrdering::DistanceAscending.as_str(), "distance");
        assert_eq!(ResultOrdering::Unordered.as_str(), "unordered");
    }

    #[tokio::test]
    async fn test_indexed_path_is_sorted() {
        let store = MemoryStore::with_spatial_index();
        seed(&store, &[(0.0, 0.2), (0.0, 0.0), (0.0, 0.1)]).await;

        let result = ProximityPlanner::default()
            .search_points(&store, &coordinate(0.0, 0.0), 50.0)
            .await
            .unwrap();

        assert_eq!(result.ordering, ResultOrdering::DistanceAscending);
        let distances: Vec<_> = result.matches.iter().map(|m| m.distance_km).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(distances[0], 0.0);
    }

    #[tokio::test]
    async fn test_fallback_without_index() {
        let store = MemoryStore::without_spatial_index();
        let points = seed(&store, &[(0.0, 0.0), (10.0, 10.0)]).await;

        let result = ProximityPlanner::default()
            .search_points(&store, &coordinate(0.0, 0.0), 5.0)
            .await
            .unwrap();

        assert_eq!(result.ordering, ResultOrdering::Unordered);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].item.id, points[0].id);
    }

    #[tokio::test]
    async fn test_fallback_after_query_error() {
        let store = BrokenIndex::new();
        seed(&store, &[(0.0, 0.0), (0.0, 0.01)]).await;

        let result = ProximityPlanner::new(true)
            .search_points(&store, &coordinate(0.0, 0.0), 5.0)
            .await
            .unwrap();

        assert_eq!(result.ordering, ResultOrdering::Unordered);
        assert_eq!(result.matches.len(), 2);
    }

    #[tokio::test]
    async fn test_query_error_propagates_when_fallback_disabled() {
        let store = BrokenIndex::new();

        let err = ProximityPlanner::new(false)
            .search_messages(&store, &coordinate(0.0, 0.0), 5.0)
            .await
            .unwrap_err();

        assert!(matches!(err, SearchError::Store(StoreError::SqlxError(_))));
    }

    #[tokio::test]
    async fn test_failed_fallback_fetch_is_store_error() {
        let store = BrokenIndex {
            list_fails: true,
            ..BrokenIndex::new()
        };

        let err = ProximityPlanner::default()
            .search_points(&store, &coordinate(0.0, 0.0), 5.0)
            .await
            .unwrap_err();

        assert!(matches!(err, SearchError::Store(_)));
    }

    #[tokio::test]
    async fn test_invalid_radius_checked_before_store() {
        let store = BrokenIndex {
            list_fails: true,
            ..BrokenIndex::new()
        };

        let err = ProximityPlanner::default()
            .search_points(&store, &coordinate(0.0, 0.0), 1001.0)
            .await
            .unwrap_err();

        assert!(matches!(err, SearchError::InvalidParameter(_)));
    }

    #[test]
    fn test_filter_within_radius_skips_unlocated() {
        let located = Point {
            id: 1,
            owner: Uuid::nil(),
            name: "here".to_string(),
            description: String::new(),
            location: Some(Location::from_coordinate(coordinate(0.0, 0.0))),
            created_at: chrono::Utc::now(),
        };
        let unlocated = Point {
            id: 2,
            location: None,
            ..located.clone()
        };

        let matches = filter_within_radius(vec![unlocated, located], &coordinate(0.0, 0.0), 1.0);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].item.id, 1);
    }
}
