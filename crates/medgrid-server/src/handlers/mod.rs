//! HTTP handlers for the `/api` routes.

pub mod auth;
pub mod beds;
pub mod billing;
pub mod departments;
pub mod health;
pub mod patients;

use std::future::Future;

use axum::extract::{FromRequest, FromRequestParts, Query};
use medgrid_api::ApiError;

/// JSON body whose rejections render as `validation_error`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// Query string whose rejections render as `validation_error`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

/// Runs an operation on its own task so that its commit finishes even if the
/// client goes away and the handler future is dropped.
pub(crate) async fn run_to_completion<F, T, E>(operation: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    match tokio::spawn(operation).await {
        Ok(result) => result.map_err(Into::into),
        Err(e) => {
            tracing::error!(error = %e, "occupancy task aborted");
            Err(ApiError::internal("Internal server error"))
        }
    }
}
