use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::core::facade::FacadeError;
use crate::core::planner::SearchError;
use crate::models::ErrorResponse;
use crate::services::store::StoreError;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Errors rendered at the HTTP boundary as [`ErrorResponse`] bodies
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    MissingParameter(String),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Logged in full, rendered with a generic message
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::MissingParameter(_) => "missing_parameter",
            ApiError::InvalidParameter(_) => "invalid_parameter",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingParameter(_) | ApiError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Internal(detail) => {
                tracing::error!("Request failed: {}", detail);
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        };

        let status = self.status_code();
        HttpResponse::build(status).json(ErrorResponse {
            error: self.error_code().to_string(),
            message,
            status_code: status.as_u16(),
        })
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::PointNotFound(_) | StoreError::MessageNotFound(_) => {
                ApiError::NotFound(error.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(error: SearchError) -> Self {
        match error {
            SearchError::MissingParameter(message) => ApiError::MissingParameter(message),
            SearchError::InvalidParameter(message) => ApiError::InvalidParameter(message),
            SearchError::Store(e) => e.into(),
        }
    }
}

impl From<FacadeError> for ApiError {
    fn from(error: FacadeError) -> Self {
        match error {
            FacadeError::Coordinate(e) => ApiError::InvalidParameter(e.to_string()),
            FacadeError::Validation(e) => ApiError::InvalidParameter(e.to_string()),
            FacadeError::Forbidden(message) => ApiError::Forbidden(message),
            FacadeError::Store(e) => e.into(),
            FacadeError::Search(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coordinate::CoordinateError;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::from(StoreError::PointNotFound(1)).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(FacadeError::Coordinate(CoordinateError::Incomplete)).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(FacadeError::Forbidden("no".to_string())).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(SearchError::Store(StoreError::SqlxError(sqlx::Error::PoolClosed)))
                .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn test_internal_message_redacted() {
        let response = ApiError::Internal("connection refused on 10.0.0.5".to_string()).error_response();
        let body = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(parsed.status_code, 500);
        assert_eq!(parsed.message, INTERNAL_MESSAGE);
        assert!(!parsed.message.contains("10.0.0.5"));
    }
}
