use axum::Json;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
}

/// Liveness check; needs no authentication.
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "OK",
        message: "MedGrid API is running",
        timestamp: medgrid_core::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
    })
}
