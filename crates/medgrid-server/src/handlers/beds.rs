use axum::extract::{Path, State};
use medgrid_api::{ApiResponse, ApiResult};
use medgrid_core::{Bed, BedStatus, NewBed};
use medgrid_occupancy::BedStatusUpdate;
use serde::Deserialize;

use super::{AppJson, AppQuery, run_to_completion};
use crate::middleware::{Admin, Staff};
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BedQuery {
    pub department: Option<String>,
    pub status: Option<BedStatus>,
}

pub async fn list(
    State(state): State<AppState>,
    _staff: Staff,
    AppQuery(query): AppQuery<BedQuery>,
) -> ApiResult<ApiResponse<Vec<Bed>>> {
    let beds = state
        .ward
        .list_beds(query.department.as_deref(), query.status)
        .await?;
    Ok(ApiResponse::ok(beds))
}

pub async fn create(
    State(state): State<AppState>,
    _admin: Admin,
    AppJson(draft): AppJson<NewBed>,
) -> ApiResult<ApiResponse<Bed>> {
    let ward = state.ward.clone();
    let bed = run_to_completion(async move { ward.create_bed(draft).await }).await?;
    Ok(ApiResponse::created(bed))
}

/// Moves a bed in or out of maintenance.
pub async fn update_status(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<String>,
    AppJson(update): AppJson<BedStatusUpdate>,
) -> ApiResult<ApiResponse<Bed>> {
    let status = update.into_status()?;
    let occupancy = state.occupancy.clone();
    let bed =
        run_to_completion(async move { occupancy.set_bed_status(&id, status).await }).await?;
    Ok(ApiResponse::ok(bed))
}
