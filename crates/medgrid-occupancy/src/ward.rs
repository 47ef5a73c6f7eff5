//! Department and bed setup.

use std::sync::Arc;

use medgrid_core::{Bed, BedStatus, Department, NewBed, NewDepartment, now_utc};
use medgrid_notifications::Publisher;
use medgrid_storage::{Collection, Condition, DynStorage, Filter, StorageError, WriteBatch};
use tracing::info;

use crate::error::{OccupancyError, Result};
use crate::records::{self, encode};

#[derive(Clone)]
pub struct WardService {
    storage: DynStorage,
    publisher: Arc<dyn Publisher>,
    default_hospital_id: String,
}

impl WardService {
    pub fn new(
        storage: DynStorage,
        publisher: Arc<dyn Publisher>,
        default_hospital_id: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            publisher,
            default_hospital_id: default_hospital_id.into(),
        }
    }

    pub fn default_hospital_id(&self) -> &str {
        &self.default_hospital_id
    }

    pub async fn create_department(&self, draft: NewDepartment) -> Result<Department> {
        let department = draft.into_department(&self.default_hospital_id, now_utc())?;

        let clash = Filter::new()
            .eq("/hospitalId", department.hospital_id.as_str())
            .eq("/name", department.name.as_str());
        if !self.storage.list(Collection::Departments, &clash).await?.is_empty() {
            return Err(OccupancyError::Conflict(format!(
                "department '{}' already exists in hospital {}",
                department.name, department.hospital_id
            )));
        }

        self.storage
            .create(Collection::Departments, encode(&department)?)
            .await?;
        info!(department_id = %department.id, hospital_id = %department.hospital_id, "department created");
        Ok(department)
    }

    pub async fn get_department(&self, id: &str) -> Result<Department> {
        Ok(
            records::require(self.storage.as_ref(), Collection::Departments, "department", id)
                .await?
                .record,
        )
    }

    /// Departments ordered by name, optionally for one hospital only.
    pub async fn list_departments(&self, hospital_id: Option<&str>) -> Result<Vec<Department>> {
        let filter = match hospital_id {
            Some(hospital_id) => Filter::new().eq("/hospitalId", hospital_id),
            None => Filter::new(),
        };
        let mut departments: Vec<Department> =
            records::list(self.storage.as_ref(), Collection::Departments, &filter).await?;
        departments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(departments)
    }

    /// Adds a bed to an existing department. Bed numbers are unique per
    /// department.
    pub async fn create_bed(&self, draft: NewBed) -> Result<Bed> {
        let bed = draft.into_bed(now_utc())?;
        let department = self.get_department(&bed.department_id).await?;

        let clash = Filter::new()
            .eq(Bed::DEPARTMENT_POINTER, bed.department_id.as_str())
            .eq("/bedNumber", bed.bed_number.as_str());
        if !self.storage.list(Collection::Beds, &clash).await?.is_empty() {
            return Err(OccupancyError::Conflict(format!(
                "bed number {} already exists in department {}",
                bed.bed_number, department.name
            )));
        }

        let batch = WriteBatch::new()
            .check(Collection::Departments, &department.id, [Condition::Exists])
            .create(Collection::Beds, encode(&bed)?);
        let written = match self.storage.commit(batch).await {
            Ok(written) => written,
            Err(StorageError::NotFound { .. } | StorageError::PreconditionFailed { .. }) => {
                return Err(OccupancyError::not_found("department", &department.id));
            }
            Err(e) => return Err(e.into()),
        };

        info!(bed_id = %bed.id, department_id = %department.id, bed_number = %bed.bed_number, "bed created");
        self.publisher
            .publish(&department.hospital_id, records::bed_events(&written, &[&bed]));
        Ok(bed)
    }

    /// Beds across departments with optional department and status filters,
    /// ordered by department then bed number.
    pub async fn list_beds(
        &self,
        department_id: Option<&str>,
        status: Option<BedStatus>,
    ) -> Result<Vec<Bed>> {
        let mut filter = Filter::new();
        if let Some(department_id) = department_id {
            filter = filter.eq(Bed::DEPARTMENT_POINTER, department_id);
        }
        if let Some(status) = status {
            filter = filter.eq(Bed::STATUS_POINTER, status.as_str());
        }
        let mut beds: Vec<Bed> =
            records::list(self.storage.as_ref(), Collection::Beds, &filter).await?;
        beds.sort_by(|a, b| {
            a.department_id
                .cmp(&b.department_id)
                .then_with(|| a.bed_number.cmp(&b.bed_number))
        });
        Ok(beds)
    }
}
