use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use medgrid_auth::AuthError;
use medgrid_occupancy::OccupancyError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Stable machine-readable code such as `bed_unavailable`.
    pub code: String,
    pub message: String,
}

/// High-level API errors mapped to HTTP status codes and [`ErrorBody`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BedUnavailable(String),
    #[error("{0}")]
    NoActiveAdmission(String),
    #[error("{0}")]
    AlreadyAdmitted(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    /// The store is unreachable or contended; the client should retry.
    #[error("{0}")]
    StoreUnavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BedUnavailable(_)
            | ApiError::NoActiveAdmission(_)
            | ApiError::AlreadyAdmitted(_)
            | ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::BedUnavailable(_) => "bed_unavailable",
            ApiError::NoActiveAdmission(_) => "no_active_admission",
            ApiError::AlreadyAdmitted(_) => "already_admitted",
            ApiError::Conflict(_) => "conflict",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::StoreUnavailable(_) => "store_unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self.to_body())).into_response();
        if matches!(self, ApiError::StoreUnavailable(_)) {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

impl From<OccupancyError> for ApiError {
    fn from(err: OccupancyError) -> Self {
        let message = err.to_string();
        match err {
            OccupancyError::Validation(_) => ApiError::Validation(message),
            OccupancyError::NotFound { .. } => ApiError::NotFound(message),
            OccupancyError::BedUnavailable { .. } => ApiError::BedUnavailable(message),
            OccupancyError::NoActiveAdmission { .. } => ApiError::NoActiveAdmission(message),
            OccupancyError::AlreadyAdmitted { .. } => ApiError::AlreadyAdmitted(message),
            OccupancyError::Conflict(_) => ApiError::Conflict(message),
            OccupancyError::Transient(source) => {
                tracing::warn!(error = %source, "store unavailable");
                ApiError::StoreUnavailable("Storage temporarily unavailable, retry shortly".into())
            }
            OccupancyError::Internal(detail) => {
                tracing::error!(error = %detail, "occupancy operation failed");
                ApiError::internal("Internal server error")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::Validation(message) => ApiError::Validation(message),
            AuthError::EmailTaken { .. } => ApiError::Conflict(message),
            AuthError::Forbidden { message } => ApiError::Forbidden(message),
            AuthError::InvalidCredentials
            | AuthError::Unauthorized { .. }
            | AuthError::InvalidToken { .. }
            | AuthError::TokenExpired => ApiError::Unauthorized(message),
            AuthError::Storage(source) if source.is_transient() => {
                tracing::warn!(error = %source, "account store unavailable");
                ApiError::StoreUnavailable("Storage temporarily unavailable, retry shortly".into())
            }
            AuthError::Storage(source) => {
                tracing::error!(error = %source, "account store failed");
                ApiError::internal("Internal server error")
            }
            AuthError::Internal { message } => {
                tracing::error!(error = %message, "authentication failed internally");
                ApiError::internal("Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge("Request body too large".into());
        }
        ApiError::Validation(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(format!("Invalid query: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(format!("Invalid path: {}", rejection.body_text()))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// A JSON success response with an explicit status and extra headers.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub value: T,
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl<T> ApiResponse<T> {
    pub fn new(value: T, status: StatusCode) -> Self {
        Self {
            value,
            status,
            headers: Vec::new(),
        }
    }

    pub fn ok(value: T) -> Self {
        Self::new(value, StatusCode::OK)
    }

    pub fn created(value: T) -> Self {
        Self::new(value, StatusCode::CREATED)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.value)).into_response();
        for (name, value) in self.headers {
            response.headers_mut().insert(name, value);
        }
        response
    }
}
