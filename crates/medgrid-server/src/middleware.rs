use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{HeaderMap, HeaderName, HeaderValue, Request, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use medgrid_api::ApiError;
use medgrid_auth::AuthContext;
use uuid::Uuid;

use crate::server::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

// Ensures each request has an X-Request-Id and mirrors it on the response.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);

    let req_id_value = match req.headers().get(&header_name) {
        Some(existing) => existing.clone(),
        None => {
            let generated = new_request_id();
            req.headers_mut().insert(header_name.clone(), generated.clone());
            generated
        }
    };

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

fn new_request_id() -> HeaderValue {
    HeaderValue::from_str(&Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let header = header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header"))?;
    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(ApiError::unauthorized("Invalid Authorization header format")),
    }
}

/// Any authenticated staff member.
#[derive(Debug, Clone)]
pub struct Staff(pub AuthContext);

impl FromRequestParts<AppState> for Staff {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?.ok_or_else(|| {
            tracing::debug!(path = %parts.uri.path(), "No Authorization header");
            ApiError::unauthorized("Authentication required")
        })?;
        let context = state.auth.authenticate(token)?;
        Ok(Staff(context))
    }
}

/// An authenticated staff member with the `admin` role.
#[derive(Debug, Clone)]
pub struct Admin(pub AuthContext);

impl FromRequestParts<AppState> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Staff(context) = <Staff as FromRequestParts<AppState>>::from_request_parts(parts, state).await?;
        if let Err(e) = context.require_admin() {
            tracing::warn!(user_id = %context.user_id, path = %parts.uri.path(), "admin route refused");
            return Err(e.into());
        }
        Ok(Admin(context))
    }
}
