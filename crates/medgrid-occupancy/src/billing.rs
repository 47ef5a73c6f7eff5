//! Bill status lifecycle.

use medgrid_core::{Bill, BillStatus, Patient, now_utc};
use medgrid_storage::{Collection, Condition, DynStorage, Filter, WriteBatch};
use tracing::{debug, info};

use crate::error::Result;
use crate::records::{self, MAX_ATTEMPTS, encode, lost_race};

#[derive(Clone)]
pub struct BillingService {
    storage: DynStorage,
}

impl BillingService {
    pub fn new(storage: DynStorage) -> Self {
        Self { storage }
    }

    pub async fn get_bill(&self, id: &str) -> Result<Bill> {
        Ok(records::require(self.storage.as_ref(), Collection::Bills, "bill", id)
            .await?
            .record)
    }

    /// Bills, newest first, optionally for one patient.
    pub async fn list_bills(&self, patient_id: Option<&str>) -> Result<Vec<Bill>> {
        let filter = match patient_id {
            Some(patient_id) => Filter::new().eq("/patientId", patient_id),
            None => Filter::new(),
        };
        let mut bills: Vec<Bill> =
            records::list(self.storage.as_ref(), Collection::Bills, &filter).await?;
        bills.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bills)
    }

    /// Moves a bill along its lifecycle and mirrors the new status onto the
    /// admission that opened it, in one commit.
    pub async fn update_status(&self, bill_id: &str, status: BillStatus) -> Result<Bill> {
        for attempt in 1..=MAX_ATTEMPTS {
            let now = now_utc();
            let mut bill =
                records::require::<Bill>(self.storage.as_ref(), Collection::Bills, "bill", bill_id)
                    .await?;
            if !bill.record.transition(status, now)? {
                return Ok(bill.record);
            }

            let mut batch = WriteBatch::new().update(
                Collection::Bills,
                bill_id,
                encode(&bill.record)?,
                [Condition::VersionIs(bill.version)],
            );
            let patient = records::load::<Patient>(
                self.storage.as_ref(),
                Collection::Patients,
                &bill.record.patient_id,
            )
            .await?;
            if let Some(mut patient) = patient
                && patient.record.set_bill_status(bill_id, status)
            {
                batch = batch.update(
                    Collection::Patients,
                    &patient.record.id,
                    encode(&patient.record)?,
                    [Condition::VersionIs(patient.version)],
                );
            }

            match self.storage.commit(batch).await {
                Ok(_) => {
                    info!(bill_id, status = %status, "bill status updated");
                    return Ok(bill.record);
                }
                Err(e) if lost_race(&e) => {
                    debug!(attempt, bill_id, error = %e, "bill update lost a race, re-reading");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(records::exhausted("update bill status"))
    }
}

impl std::fmt::Debug for BillingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingService").finish_non_exhaustive()
    }
}

