use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::models::Principal;
use crate::routes::error::ApiError;

pub const DEFAULT_PRINCIPAL_HEADER: &str = "X-Authenticated-User";

/// Name of the header the gateway uses to pass the caller's user id
#[derive(Debug, Clone)]
pub struct PrincipalConfig {
    pub header: String,
}

impl Default for PrincipalConfig {
    fn default() -> Self {
        Self {
            header: DEFAULT_PRINCIPAL_HEADER.to_string(),
        }
    }
}

fn principal_from_request(req: &HttpRequest) -> Result<Principal, ApiError> {
    let header = req
        .app_data::<web::Data<PrincipalConfig>>()
        .map(|config| config.header.as_str())
        .unwrap_or(DEFAULT_PRINCIPAL_HEADER);

    let value = req
        .headers()
        .get(header)
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", header)))?;

    value
        .to_str()
        .ok()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .map(Principal::new)
        .ok_or_else(|| ApiError::Unauthorized(format!("Malformed {} header", header)))
}

impl FromRequest for Principal {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(principal_from_request(req))
    }
}
