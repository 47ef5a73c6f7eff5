use axum::extract::{Path, State};
use medgrid_api::{ApiResponse, ApiResult};
use medgrid_core::Patient;
use medgrid_occupancy::{AdmitRequest, TransferRequest};
use serde::Deserialize;

use super::{AppJson, AppQuery, run_to_completion};
use crate::middleware::Staff;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatientQuery {
    /// `true` lists only currently admitted patients.
    pub admitted: Option<bool>,
}

pub async fn admit(
    State(state): State<AppState>,
    Staff(staff): Staff,
    AppJson(request): AppJson<AdmitRequest>,
) -> ApiResult<ApiResponse<Patient>> {
    let occupancy = state.occupancy.clone();
    let patient = run_to_completion(async move { occupancy.admit(request).await }).await?;
    tracing::debug!(patient_id = %patient.id, user_id = %staff.user_id, "admission recorded");
    Ok(ApiResponse::created(patient))
}

pub async fn list(
    State(state): State<AppState>,
    _staff: Staff,
    AppQuery(query): AppQuery<PatientQuery>,
) -> ApiResult<ApiResponse<Vec<Patient>>> {
    let patients = state
        .occupancy
        .list_patients(query.admitted.unwrap_or(false))
        .await?;
    Ok(ApiResponse::ok(patients))
}

pub async fn get(
    State(state): State<AppState>,
    _staff: Staff,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Patient>> {
    Ok(ApiResponse::ok(state.occupancy.get_patient(&id).await?))
}

pub async fn discharge(
    State(state): State<AppState>,
    _staff: Staff,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Patient>> {
    let occupancy = state.occupancy.clone();
    let patient = run_to_completion(async move { occupancy.discharge(&id).await }).await?;
    Ok(ApiResponse::ok(patient))
}

pub async fn transfer(
    State(state): State<AppState>,
    _staff: Staff,
    Path(id): Path<String>,
    AppJson(request): AppJson<TransferRequest>,
) -> ApiResult<ApiResponse<Patient>> {
    let occupancy = state.occupancy.clone();
    let patient =
        run_to_completion(async move { occupancy.transfer(&id, request).await }).await?;
    Ok(ApiResponse::ok(patient))
}
