use axum::extract::{Path, State};
use medgrid_api::{ApiResponse, ApiResult};
use medgrid_core::{Bed, BedStatus, Department, NewDepartment};
use serde::Deserialize;

use super::{AppJson, AppQuery};
use crate::middleware::{Admin, Staff};
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DepartmentQuery {
    pub hospital: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BedStatusQuery {
    pub status: Option<BedStatus>,
}

pub async fn list(
    State(state): State<AppState>,
    _staff: Staff,
    AppQuery(query): AppQuery<DepartmentQuery>,
) -> ApiResult<ApiResponse<Vec<Department>>> {
    let departments = state.ward.list_departments(query.hospital.as_deref()).await?;
    Ok(ApiResponse::ok(departments))
}

pub async fn create(
    State(state): State<AppState>,
    _admin: Admin,
    AppJson(draft): AppJson<NewDepartment>,
) -> ApiResult<ApiResponse<Department>> {
    Ok(ApiResponse::created(state.ward.create_department(draft).await?))
}

pub async fn get(
    State(state): State<AppState>,
    _staff: Staff,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Department>> {
    Ok(ApiResponse::ok(state.ward.get_department(&id).await?))
}

/// Beds of one department, optionally narrowed to a status.
pub async fn beds(
    State(state): State<AppState>,
    _staff: Staff,
    Path(id): Path<String>,
    AppQuery(query): AppQuery<BedStatusQuery>,
) -> ApiResult<ApiResponse<Vec<Bed>>> {
    let beds = state.occupancy.available_beds(&id, query.status).await?;
    Ok(ApiResponse::ok(beds))
}
