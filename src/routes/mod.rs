// Route exports
pub mod error;
pub mod messages;
pub mod points;
pub mod principal;

use actix_web::{error as actix_error, web, HttpRequest, HttpResponse};

use crate::core::facade::PointFacade;
use crate::models::HealthResponse;

pub use error::ApiError;
pub use principal::PrincipalConfig;

/// Response header naming the ordering guarantee of a search result
pub const RESULT_ORDERING_HEADER: &str = "X-Result-Ordering";

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub facade: PointFacade,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
        .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
        .service(
            web::scope("/api/v1")
                .route("/health", web::get().to(health_check))
                .configure(messages::configure)
                .configure(points::configure),
        );
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let healthy = match state.facade.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!("Store health check failed: {}", e);
            false
        }
    };

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        spatial_index: state.facade.spatial_support().is_available(),
        timestamp: chrono::Utc::now(),
    })
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(
    err: actix_error::JsonPayloadError,
    req: &HttpRequest,
) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    ApiError::InvalidParameter(format!("Invalid JSON: {}", err)).into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(
    err: actix_error::QueryPayloadError,
    req: &HttpRequest,
) -> actix_web::Error {
    tracing::info!("Query error on {}: {}", req.path(), err);
    ApiError::InvalidParameter(format!("Invalid query: {}", err)).into()
}
