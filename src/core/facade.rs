use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use validator::Validate;

use crate::core::coordinate::{Coordinate, CoordinateError, Location};
use crate::core::planner::{ProximityPlanner, SearchError, SearchResult};
use crate::models::{
    CreateMessageRequest, CreatePointRequest, Message, MessageFilter, MessageId, MessageWithPoint,
    NewMessage, NewPoint, Point, PointChanges, PointFilter, PointId, Principal, UpdatePointRequest,
};
use crate::services::store::{PointStore, SpatialSupport, StoreError};

/// Who may modify or delete an existing point or message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipPolicy {
    /// Any authenticated caller
    #[default]
    Unrestricted,
    /// Only the owner of a point or the author of a message
    OwnerOnly,
}

#[derive(Debug, Error)]
pub enum FacadeError {
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Search(#[from] SearchError),
}

/// Command/query entry point for points and messages.
///
/// Every write takes the caller explicitly and resolves the request's
/// location into a synced [`Location`] before it reaches the store.
#[derive(Clone)]
pub struct PointFacade {
    store: Arc<dyn PointStore>,
    planner: ProximityPlanner,
    ownership: OwnershipPolicy,
}

impl PointFacade {
    pub fn new(store: Arc<dyn PointStore>) -> Self {
        Self {
            store,
            planner: ProximityPlanner::default(),
            ownership: OwnershipPolicy::default(),
        }
    }

    pub fn with_planner(mut self, planner: ProximityPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_ownership(mut self, ownership: OwnershipPolicy) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn store(&self) -> &Arc<dyn PointStore> {
        &self.store
    }

    pub fn spatial_support(&self) -> SpatialSupport {
        self.store.spatial_support()
    }

    pub async fn health_check(&self) -> Result<bool, FacadeError> {
        Ok(self.store.health_check().await?)
    }

    pub async fn create_point(
        &self,
        principal: Principal,
        request: CreatePointRequest,
    ) -> Result<Point, FacadeError> {
        request.validate()?;
        let location = Location::resolve(request.latitude, request.longitude, request.location)?;

        let point = self
            .store
            .create_point(NewPoint {
                owner: principal.user_id(),
                name: request.name,
                description: request.description.unwrap_or_default(),
                location,
            })
            .await?;

        tracing::info!("Point {} created by {}", point.id, principal.user_id());
        Ok(point)
    }

    pub async fn get_point(&self, id: PointId) -> Result<Point, FacadeError> {
        Ok(self.store.get_point(id).await?)
    }

    pub async fn list_points(&self, filter: &PointFilter) -> Result<Vec<Point>, FacadeError> {
        Ok(self.store.list_points(filter).await?)
    }

    pub async fn update_point(
        &self,
        principal: Principal,
        id: PointId,
        request: UpdatePointRequest,
    ) -> Result<Point, FacadeError> {
        request.validate()?;
        let location = Location::resolve(request.latitude, request.longitude, request.location)?;

        let existing = self.store.get_point(id).await?;
        self.authorize(principal, existing.owner, "point", id)?;

        let changes = PointChanges {
            name: request.name,
            description: request.description,
            location,
        };

        Ok(self.store.update_point(id, changes).await?)
    }

    /// Delete a point and its messages, returning how many messages went with it
    pub async fn delete_point(&self, principal: Principal, id: PointId) -> Result<u64, FacadeError> {
        let existing = self.store.get_point(id).await?;
        self.authorize(principal, existing.owner, "point", id)?;

        let removed = self.store.delete_point(id).await?;
        tracing::info!(
            "Point {} deleted by {} ({} messages removed)",
            id,
            principal.user_id(),
            removed
        );
        Ok(removed)
    }

    pub async fn create_message(
        &self,
        principal: Principal,
        request: CreateMessageRequest,
    ) -> Result<MessageWithPoint, FacadeError> {
        request.validate()?;

        let created = self
            .store
            .create_message(NewMessage {
                author: principal.user_id(),
                point_id: request.point,
                content: request.content,
            })
            .await?;

        tracing::info!(
            "Message {} posted on point {} by {}",
            created.message.id,
            created.point.id,
            principal.user_id()
        );
        Ok(created)
    }

    pub async fn get_message(&self, id: MessageId) -> Result<MessageWithPoint, FacadeError> {
        Ok(self.store.get_message(id).await?)
    }

    pub async fn list_messages(
        &self,
        filter: &MessageFilter,
    ) -> Result<Vec<MessageWithPoint>, FacadeError> {
        Ok(self.store.list_messages(filter).await?)
    }

    pub async fn delete_message(
        &self,
        principal: Principal,
        id: MessageId,
    ) -> Result<Message, FacadeError> {
        if self.ownership == OwnershipPolicy::OwnerOnly {
            let existing = self.store.get_message(id).await?;
            self.authorize(principal, existing.message.author, "message", id)?;
        }

        Ok(self.store.delete_message(id).await?)
    }

    pub async fn search_points(
        &self,
        center: &Coordinate,
        radius_km: f64,
    ) -> Result<SearchResult<Point>, FacadeError> {
        Ok(self
            .planner
            .search_points(self.store.as_ref(), center, radius_km)
            .await?)
    }

    pub async fn search_messages(
        &self,
        center: &Coordinate,
        radius_km: f64,
    ) -> Result<SearchResult<MessageWithPoint>, FacadeError> {
        Ok(self
            .planner
            .search_messages(self.store.as_ref(), center, radius_km)
            .await?)
    }

    fn authorize(
        &self,
        principal: Principal,
        owner: uuid::Uuid,
        kind: &str,
        id: i64,
    ) -> Result<(), FacadeError> {
        match self.ownership {
            OwnershipPolicy::Unrestricted => Ok(()),
            OwnershipPolicy::OwnerOnly if principal.user_id() == owner => Ok(()),
            OwnershipPolicy::OwnerOnly => {
                tracing::warn!(
                    "User {} denied access to {} {}",
                    principal.user_id(),
                    kind,
                    id
                );
                Err(FacadeError::Forbidden(format!(
                    "Only the owner may modify {} {}",
                    kind, id
                )))
            }
        }
    }
}
