use actix_web::{web, HttpResponse};
use std::collections::HashMap;

use crate::models::{
    CreateMessageRequest, MessageId, MessageListQuery, MessageResponse, Principal, SearchParams,
};
use crate::routes::error::ApiError;
use crate::routes::{AppState, RESULT_ORDERING_HEADER};

/// Configure message routes. Registered before the point routes so that
/// `/points/messages` is not taken for a point id.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/points/messages")
            .route(web::get().to(list_messages))
            .route(web::post().to(create_message)),
    )
    .route("/points/messages/search", web::get().to(search_messages))
    .service(
        web::resource("/points/messages/{id}")
            .route(web::get().to(get_message))
            .route(web::delete().to(delete_message)),
    );
}

/// GET /api/v1/points/messages?point={id}&author={uuid}
async fn list_messages(
    state: web::Data<AppState>,
    query: web::Query<MessageListQuery>,
) -> Result<HttpResponse, ApiError> {
    let messages = state.facade.list_messages(&query.into_inner().into()).await?;
    let body: Vec<MessageResponse> = messages.into_iter().map(MessageResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// POST /api/v1/points/messages
///
/// Request body:
/// ```json
/// {
///   "point": 1,
///   "content": "string"
/// }
/// ```
async fn create_message(
    state: web::Data<AppState>,
    principal: Principal,
    req: web::Json<CreateMessageRequest>,
) -> Result<HttpResponse, ApiError> {
    let created = state.facade.create_message(principal, req.into_inner()).await?;
    Ok(HttpResponse::Created().json(MessageResponse::from(created)))
}

/// GET /api/v1/points/messages/search?latitude={lat}&longitude={lon}&radius={km}
async fn search_messages(
    state: web::Data<AppState>,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, ApiError> {
    let (center, radius_km) = SearchParams::from_query(&query).parse()?;

    let result = state.facade.search_messages(&center, radius_km).await?;
    let ordering = result.ordering.as_str();

    let body: Vec<MessageResponse> = result.matches.into_iter().map(MessageResponse::from).collect();
    Ok(HttpResponse::Ok()
        .insert_header((RESULT_ORDERING_HEADER, ordering))
        .json(body))
}

async fn get_message(
    state: web::Data<AppState>,
    path: web::Path<MessageId>,
) -> Result<HttpResponse, ApiError> {
    let message = state.facade.get_message(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::from(message)))
}

async fn delete_message(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<MessageId>,
) -> Result<HttpResponse, ApiError> {
    let deleted = state.facade.delete_message(principal, path.into_inner()).await?;
    tracing::info!("Message {} deleted from point {}", deleted.id, deleted.point_id);
    Ok(HttpResponse::NoContent().finish())
}
