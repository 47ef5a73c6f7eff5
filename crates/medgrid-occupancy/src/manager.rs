//! The occupancy manager: the only code that moves a bed between available
//! and occupied, or a patient between admitted and discharged.
//!
//! Every transition is a single [`WriteBatch`] whose conditions pin the
//! versions (and, for beds, the status or occupant) that the decision was
//! based on. A batch that loses a race is rejected by the store as a whole;
//! the manager then re-reads and re-decides, so a bed taken in the meantime
//! surfaces as [`OccupancyError::BedUnavailable`] rather than a double
//! booking.
//!
//! Everything an event needs is resolved before the commit, so events go
//! out without awaiting anything after it. Each event carries the version
//! the commit gave its bed; the hub uses it to discard events that arrive
//! after a newer commit on the same bed was already published.

use std::sync::Arc;

use medgrid_core::{
    AdmissionDetails, Bed, BedStatus, Bill, Department, OccupancyEvent, Patient, now_utc,
};
use medgrid_notifications::Publisher;
use medgrid_storage::{Collection, Condition, DynStorage, Filter, StoredDocument, WriteBatch};
use tracing::{debug, info, warn};

use crate::error::{OccupancyError, Result};
use crate::records::{self, MAX_ATTEMPTS, Versioned, bed_events, decode, encode, lost_race};
use crate::requests::{AdmitRequest, AdmittedPatient, TransferRequest};

#[derive(Clone)]
pub struct OccupancyManager {
    storage: DynStorage,
    publisher: Arc<dyn Publisher>,
}

impl std::fmt::Debug for OccupancyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OccupancyManager")
            .field("backend", &self.storage.backend_name())
            .finish()
    }
}

fn bed_is_free() -> Condition {
    Condition::field_equals(Bed::STATUS_POINTER, BedStatus::Available.as_str())
}

fn bed_held_by(patient_id: &str) -> Condition {
    Condition::field_equals(Bed::PATIENT_POINTER, patient_id)
}

impl OccupancyManager {
    pub fn new(storage: DynStorage, publisher: Arc<dyn Publisher>) -> Self {
        Self { storage, publisher }
    }

    async fn department(&self, id: &str) -> Result<Versioned<Department>> {
        records::require(self.storage.as_ref(), Collection::Departments, "department", id).await
    }

    async fn bed(&self, id: &str) -> Result<Versioned<Bed>> {
        records::require(self.storage.as_ref(), Collection::Beds, "bed", id).await
    }

    async fn patient(&self, id: &str) -> Result<Versioned<Patient>> {
        records::require(self.storage.as_ref(), Collection::Patients, "patient", id).await
    }

    /// Hospital scope of a department, for publishing. A missing department
    /// is logged and yields no scope; the transition itself still proceeds.
    async fn hospital_of(&self, department_id: &str) -> Option<String> {
        match self.department(department_id).await {
            Ok(dept) => Some(dept.record.hospital_id),
            Err(e) => {
                warn!(department_id, error = %e, "cannot resolve hospital for occupancy event");
                None
            }
        }
    }

    fn publish(&self, hospital_id: &str, events: Vec<OccupancyEvent>) {
        if events.is_empty() {
            return;
        }
        let delivered = self.publisher.publish(hospital_id, events);
        debug!(hospital_id, delivered, "occupancy change published");
    }

    /// Admits a patient into a bed.
    ///
    /// The bed must belong to the department and be `available` at the moment
    /// of commit. The patient record (new or existing), the bed's back-reference
    /// and the admission's bill are written together or not at all.
    pub async fn admit(&self, request: AdmitRequest) -> Result<Patient> {
        let now = now_utc();
        let admit = request.validate(now)?;
        let department = self.department(&admit.department_id).await?;
        let mut bed = self.bed(&admit.bed_id).await?;
        if bed.record.department_id != department.record.id {
            return Err(OccupancyError::validation(format!(
                "bed {} does not belong to department {}",
                bed.record.id, department.record.id
            )));
        }

        for attempt in 1..=MAX_ATTEMPTS {
            if !bed.record.is_available() {
                return Err(OccupancyError::bed_unavailable(
                    &bed.record.id,
                    format!("status is {}", bed.record.status),
                ));
            }

            let (mut patient, patient_version) = match &admit.patient {
                AdmittedPatient::New(patient) => (patient.clone(), None),
                AdmittedPatient::Existing(id) => {
                    let existing = self.patient(id).await?;
                    (existing.record, Some(existing.version))
                }
            };
            if patient.is_admitted() {
                return Err(OccupancyError::AlreadyAdmitted {
                    patient_id: patient.id,
                });
            }

            let bill = Bill::open(&patient.id, admit.bill_status, now);
            patient.admit(
                AdmissionDetails {
                    department_id: department.record.id.clone(),
                    bed_id: bed.record.id.clone(),
                    reason: admit.reason.clone(),
                    bill_id: bill.id.clone(),
                    bill_status: bill.status,
                },
                now,
            )?;
            let occupied = bed.record.occupied_by(&patient.id, now);

            let mut batch = WriteBatch::new()
                .check(Collection::Departments, &department.record.id, [Condition::Exists])
                .update(
                    Collection::Beds,
                    &bed.record.id,
                    encode(&occupied)?,
                    [Condition::VersionIs(bed.version), bed_is_free()],
                );
            batch = match patient_version {
                None => batch.create(Collection::Patients, encode(&patient)?),
                Some(version) => batch.update(
                    Collection::Patients,
                    &patient.id,
                    encode(&patient)?,
                    [Condition::VersionIs(version)],
                ),
            };
            batch = batch.create(Collection::Bills, encode(&bill)?);

            match self.storage.commit(batch).await {
                Ok(written) => {
                    self.publish(
                        &department.record.hospital_id,
                        bed_events(&written, &[&occupied]),
                    );
                    info!(
                        patient_id = %patient.id,
                        bed_id = %occupied.id,
                        department_id = %department.record.id,
                        "patient admitted"
                    );
                    return Ok(patient);
                }
                Err(e) if lost_race(&e) => {
                    debug!(attempt, bed_id = %bed.record.id, error = %e, "admission lost a race, re-reading");
                    bed = self.bed(&admit.bed_id).await?;
                    self.department(&admit.department_id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(records::exhausted("admit"))
    }

    /// Ends the patient's active admission and frees its bed.
    pub async fn discharge(&self, patient_id: &str) -> Result<Patient> {
        for attempt in 1..=MAX_ATTEMPTS {
            let now = now_utc();
            let Versioned {
                record: mut patient,
                version,
            } = self.patient(patient_id).await?;
            let Some(admission) = patient.active_admission() else {
                return Err(OccupancyError::no_active_admission(patient_id));
            };
            let bed = self.bed(&admission.bed_id).await?;
            let hospital_id = self.hospital_of(&bed.record.department_id).await;
            patient.discharge(now);

            let mut batch = WriteBatch::new().update(
                Collection::Patients,
                patient_id,
                encode(&patient)?,
                [Condition::VersionIs(version)],
            );
            let freed = if bed.record.is_occupied_by(patient_id) {
                let freed = bed.record.released(now);
                batch = batch.update(
                    Collection::Beds,
                    &freed.id,
                    encode(&freed)?,
                    [Condition::VersionIs(bed.version), bed_held_by(patient_id)],
                );
                Some(freed)
            } else {
                warn!(
                    patient_id,
                    bed_id = %bed.record.id,
                    "active admission points at a bed it does not hold; closing admission only"
                );
                batch = batch.check(
                    Collection::Beds,
                    &bed.record.id,
                    [Condition::VersionIs(bed.version)],
                );
                None
            };

            match self.storage.commit(batch).await {
                Ok(written) => {
                    if let Some(freed) = &freed
                        && let Some(hospital_id) = &hospital_id
                    {
                        self.publish(hospital_id, bed_events(&written, &[freed]));
                    }
                    info!(patient_id, bed_id = %bed.record.id, "patient discharged");
                    return Ok(patient);
                }
                Err(e) if lost_race(&e) => {
                    debug!(attempt, patient_id, error = %e, "discharge lost a race, re-reading");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(records::exhausted("discharge"))
    }

    /// Moves the patient's active admission to another bed.
    ///
    /// The old bed is freed, the new bed occupied and the admission updated in
    /// one commit; the admission keeps its start time. Transferring to the bed
    /// the patient already holds is a no-op.
    pub async fn transfer(&self, patient_id: &str, request: TransferRequest) -> Result<Patient> {
        let (department_id, bed_id) = request.validate()?;

        for attempt in 1..=MAX_ATTEMPTS {
            let now = now_utc();
            let Versioned {
                record: mut patient,
                version,
            } = self.patient(patient_id).await?;
            let Some(admission) = patient.active_admission() else {
                return Err(OccupancyError::no_active_admission(patient_id));
            };
            let old_bed_id = admission.bed_id.clone();

            let new_department = self.department(&department_id).await?;
            let new_bed = self.bed(&bed_id).await?;
            if new_bed.record.department_id != new_department.record.id {
                return Err(OccupancyError::validation(format!(
                    "bed {} does not belong to department {}",
                    new_bed.record.id, new_department.record.id
                )));
            }
            if old_bed_id == new_bed.record.id {
                debug!(patient_id, bed_id = %old_bed_id, "transfer to current bed, nothing to do");
                return Ok(patient);
            }
            if !new_bed.record.is_available() {
                return Err(OccupancyError::bed_unavailable(
                    &new_bed.record.id,
                    format!("status is {}", new_bed.record.status),
                ));
            }

            let old_bed = self.bed(&old_bed_id).await?;
            let from_hospital = if old_bed.record.department_id == new_department.record.id {
                Some(new_department.record.hospital_id.clone())
            } else {
                self.hospital_of(&old_bed.record.department_id).await
            };
            patient.transfer(&new_department.record.id, &new_bed.record.id, now);
            let occupied = new_bed.record.occupied_by(patient_id, now);

            let mut batch = WriteBatch::new()
                .check(
                    Collection::Departments,
                    &new_department.record.id,
                    [Condition::Exists],
                )
                .update(
                    Collection::Patients,
                    patient_id,
                    encode(&patient)?,
                    [Condition::VersionIs(version)],
                );
            let freed = if old_bed.record.is_occupied_by(patient_id) {
                let freed = old_bed.record.released(now);
                batch = batch.update(
                    Collection::Beds,
                    &freed.id,
                    encode(&freed)?,
                    [Condition::VersionIs(old_bed.version), bed_held_by(patient_id)],
                );
                Some(freed)
            } else {
                warn!(
                    patient_id,
                    bed_id = %old_bed.record.id,
                    "active admission points at a bed it does not hold; not freeing it"
                );
                batch = batch.check(
                    Collection::Beds,
                    &old_bed.record.id,
                    [Condition::VersionIs(old_bed.version)],
                );
                None
            };
            batch = batch.update(
                Collection::Beds,
                &occupied.id,
                encode(&occupied)?,
                [Condition::VersionIs(new_bed.version), bed_is_free()],
            );

            match self.storage.commit(batch).await {
                Ok(written) => {
                    self.publish_transfer(
                        &written,
                        freed.as_ref().zip(from_hospital.as_deref()),
                        &occupied,
                        &new_department.record.hospital_id,
                    );
                    info!(
                        patient_id,
                        from_bed = %old_bed.record.id,
                        to_bed = %occupied.id,
                        "patient transferred"
                    );
                    return Ok(patient);
                }
                Err(e) if lost_race(&e) => {
                    debug!(attempt, patient_id, error = %e, "transfer lost a race, re-reading");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(records::exhausted("transfer"))
    }

    /// Freed event first, then occupied. Within one hospital both go out in a
    /// single publish so no other event lands between them.
    fn publish_transfer(
        &self,
        written: &[StoredDocument],
        freed: Option<(&Bed, &str)>,
        occupied: &Bed,
        to_hospital: &str,
    ) {
        match freed {
            Some((freed, from_hospital)) if from_hospital == to_hospital => {
                self.publish(to_hospital, bed_events(written, &[freed, occupied]));
            }
            Some((freed, from_hospital)) => {
                self.publish(from_hospital, bed_events(written, &[freed]));
                self.publish(to_hospital, bed_events(written, &[occupied]));
            }
            None => self.publish(to_hospital, bed_events(written, &[occupied])),
        }
    }

    /// Beds of a department, optionally narrowed to one status, read from the
    /// latest committed state. Ordered by bed number.
    pub async fn available_beds(
        &self,
        department_id: &str,
        status: Option<BedStatus>,
    ) -> Result<Vec<Bed>> {
        self.department(department_id).await?;
        let mut filter = Filter::new().eq(Bed::DEPARTMENT_POINTER, department_id);
        if let Some(status) = status {
            filter = filter.eq(Bed::STATUS_POINTER, status.as_str());
        }
        let mut beds: Vec<Bed> =
            records::list(self.storage.as_ref(), Collection::Beds, &filter).await?;
        beds.sort_by(|a, b| a.bed_number.cmp(&b.bed_number));
        Ok(beds)
    }

    /// Moves a free bed into or out of maintenance. Occupancy is only ever
    /// changed by admission, discharge and transfer.
    pub async fn set_bed_status(&self, bed_id: &str, status: BedStatus) -> Result<Bed> {
        if status == BedStatus::Occupied {
            return Err(OccupancyError::validation(
                "beds become occupied only through admission or transfer",
            ));
        }

        for attempt in 1..=MAX_ATTEMPTS {
            let bed = self.bed(bed_id).await?;
            if bed.record.status == BedStatus::Occupied {
                return Err(OccupancyError::bed_unavailable(
                    bed_id,
                    "bed is occupied; discharge or transfer the patient first",
                ));
            }
            if bed.record.status == status {
                return Ok(bed.record);
            }

            let hospital_id = self.hospital_of(&bed.record.department_id).await;
            let updated = bed.record.with_status(status, now_utc());
            let batch = WriteBatch::new().update(
                Collection::Beds,
                bed_id,
                encode(&updated)?,
                [
                    Condition::VersionIs(bed.version),
                    Condition::field_equals(Bed::STATUS_POINTER, bed.record.status.as_str()),
                ],
            );
            match self.storage.commit(batch).await {
                Ok(written) => {
                    if let Some(hospital_id) = &hospital_id {
                        self.publish(hospital_id, bed_events(&written, &[&updated]));
                    }
                    info!(bed_id, status = %status, "bed status changed");
                    return Ok(updated);
                }
                Err(e) if lost_race(&e) => {
                    debug!(attempt, bed_id, error = %e, "bed status change lost a race, re-reading");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(records::exhausted("set bed status"))
    }

    pub async fn get_patient(&self, patient_id: &str) -> Result<Patient> {
        Ok(self.patient(patient_id).await?.record)
    }

    /// All patients, or only those with an active admission.
    pub async fn list_patients(&self, admitted_only: bool) -> Result<Vec<Patient>> {
        let docs = self.storage.list(Collection::Patients, &Filter::new()).await?;
        let mut patients = Vec::with_capacity(docs.len());
        for doc in &docs {
            let patient: Patient = decode(doc)?;
            if !admitted_only || patient.is_admitted() {
                patients.push(patient);
            }
        }
        Ok(patients)
    }

    /// Current state of one bed.
    pub async fn get_bed(&self, bed_id: &str) -> Result<Bed> {
        Ok(self.bed(bed_id).await?.record)
    }
}
