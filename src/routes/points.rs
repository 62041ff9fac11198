use actix_web::{web, HttpResponse};
use std::collections::HashMap;

use crate::models::{
    CreatePointRequest, DeletePointResponse, PointId, PointListQuery, PointResponse, Principal,
    SearchParams, UpdatePointRequest,
};
use crate::routes::error::ApiError;
use crate::routes::{AppState, RESULT_ORDERING_HEADER};

/// Configure point routes. `/points/search` must precede `/points/{id}`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/points")
            .route(web::get().to(list_points))
            .route(web::post().to(create_point)),
    )
    .route("/points/search", web::get().to(search_points))
    .service(
        web::resource("/points/{id}")
            .route(web::get().to(get_point))
            .route(web::put().to(replace_point))
            .route(web::patch().to(update_point))
            .route(web::delete().to(delete_point)),
    );
}

/// GET /api/v1/points?owner={uuid}&name={text}
async fn list_points(
    state: web::Data<AppState>,
    query: web::Query<PointListQuery>,
) -> Result<HttpResponse, ApiError> {
    let points = state.facade.list_points(&query.into_inner().into()).await?;
    let body: Vec<PointResponse> = points.into_iter().map(PointResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// POST /api/v1/points
///
/// Request body:
/// ```json
/// {
///   "name": "string",
///   "description": "string",
///   "latitude": 0.0,
///   "longitude": 0.0
/// }
/// ```
/// A GeoJSON `location` may be sent instead of `latitude`/`longitude`.
async fn create_point(
    state: web::Data<AppState>,
    principal: Principal,
    req: web::Json<CreatePointRequest>,
) -> Result<HttpResponse, ApiError> {
    let point = state.facade.create_point(principal, req.into_inner()).await?;
    Ok(HttpResponse::Created().json(PointResponse::from(point)))
}

/// GET /api/v1/points/search?latitude={lat}&longitude={lon}&radius={km}
async fn search_points(
    state: web::Data<AppState>,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, ApiError> {
    let (center, radius_km) = SearchParams::from_query(&query).parse()?;

    let result = state.facade.search_points(&center, radius_km).await?;
    tracing::debug!(
        "Point search at ({}, {}) r={}km: {} matches ({})",
        center.latitude(),
        center.longitude(),
        radius_km,
        result.matches.len(),
        result.ordering.as_str()
    );

    let body: Vec<PointResponse> = result.matches.into_iter().map(PointResponse::from).collect();
    Ok(HttpResponse::Ok()
        .insert_header((RESULT_ORDERING_HEADER, result.ordering.as_str()))
        .json(body))
}

async fn get_point(
    state: web::Data<AppState>,
    path: web::Path<PointId>,
) -> Result<HttpResponse, ApiError> {
    let point = state.facade.get_point(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PointResponse::from(point)))
}

/// PUT replaces name and description; the location changes only when one is sent
async fn replace_point(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<PointId>,
    req: web::Json<CreatePointRequest>,
) -> Result<HttpResponse, ApiError> {
    let point = state
        .facade
        .update_point(principal, path.into_inner(), req.into_inner().into())
        .await?;
    Ok(HttpResponse::Ok().json(PointResponse::from(point)))
}

async fn update_point(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<PointId>,
    req: web::Json<UpdatePointRequest>,
) -> Result<HttpResponse, ApiError> {
    let point = state
        .facade
        .update_point(principal, path.into_inner(), req.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(PointResponse::from(point)))
}

/// DELETE /api/v1/points/{id}; messages on the point are deleted with it
async fn delete_point(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<PointId>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let messages_deleted = state.facade.delete_point(principal, id).await?;
    Ok(HttpResponse::Ok().json(DeletePointResponse {
        id,
        messages_deleted,
    }))
}
