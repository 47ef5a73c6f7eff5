use axum::extract::{Path, State};
use medgrid_api::{ApiResponse, ApiResult};
use medgrid_core::Bill;
use medgrid_occupancy::BillStatusUpdate;
use serde::Deserialize;

use super::{AppJson, AppQuery, run_to_completion};
use crate::middleware::Staff;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BillQuery {
    pub patient: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    _staff: Staff,
    AppQuery(query): AppQuery<BillQuery>,
) -> ApiResult<ApiResponse<Vec<Bill>>> {
    let bills = state.billing.list_bills(query.patient.as_deref()).await?;
    Ok(ApiResponse::ok(bills))
}

pub async fn get(
    State(state): State<AppState>,
    _staff: Staff,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Bill>> {
    Ok(ApiResponse::ok(state.billing.get_bill(&id).await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    _staff: Staff,
    Path(id): Path<String>,
    AppJson(update): AppJson<BillStatusUpdate>,
) -> ApiResult<ApiResponse<Bill>> {
    let status = update.into_status()?;
    let billing = state.billing.clone();
    let bill = run_to_completion(async move { billing.update_status(&id, status).await }).await?;
    Ok(ApiResponse::ok(bill))
}
