use axum::extract::State;
use medgrid_api::{ApiResponse, ApiResult};
use medgrid_auth::{AuthSession, Credentials};
use medgrid_core::{NewUser, UserProfile};

use super::AppJson;
use crate::middleware::Staff;
use crate::server::AppState;

pub async fn register(
    State(state): State<AppState>,
    AppJson(draft): AppJson<NewUser>,
) -> ApiResult<ApiResponse<AuthSession>> {
    let session = state.auth.register(draft).await?;
    Ok(ApiResponse::created(session))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(credentials): AppJson<Credentials>,
) -> ApiResult<ApiResponse<AuthSession>> {
    Ok(ApiResponse::ok(state.auth.login(credentials).await?))
}

pub async fn me(
    State(state): State<AppState>,
    Staff(context): Staff,
) -> ApiResult<ApiResponse<UserProfile>> {
    Ok(ApiResponse::ok(state.auth.me(&context).await?))
}
