#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use medgrid_core::{Bed, BedStatus, NewBed, NewDepartment, OccupancyEvent, Patient, PatientDraft};
use medgrid_db_memory::InMemoryStorage;
use medgrid_notifications::Publisher;
use medgrid_occupancy::{AdmitRequest, BillingService, OccupancyManager, WardService};
use medgrid_storage::{Collection, DocumentStorage, DynStorage, Filter};
use serde_json::json;

/// Publisher that remembers everything it was handed.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, Vec<OccupancyEvent>)>>,
}

impl RecordingPublisher {
    pub fn take(&self) -> Vec<(String, Vec<OccupancyEvent>)> {
        std::mem::take(&mut *self.published.lock().unwrap())
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, hospital_id: &str, events: Vec<OccupancyEvent>) -> usize {
        self.published
            .lock()
            .unwrap()
            .push((hospital_id.to_string(), events));
        1
    }
}

pub struct Ward {
    pub storage: DynStorage,
    pub events: Arc<RecordingPublisher>,
    pub manager: OccupancyManager,
    pub ward: WardService,
    pub billing: BillingService,
    /// department name -> id
    pub departments: HashMap<&'static str, String>,
    /// bed number -> id
    pub beds: HashMap<&'static str, String>,
}

impl Ward {
    pub fn dept(&self, name: &str) -> &str {
        &self.departments[name]
    }

    pub fn bed(&self, number: &str) -> &str {
        &self.beds[number]
    }

    pub async fn bed_state(&self, number: &str) -> Bed {
        self.manager.get_bed(self.bed(number)).await.unwrap()
    }

    pub fn admit_new(&self, n: usize, dept: &str, bed: &str) -> AdmitRequest {
        AdmitRequest::new_patient(draft(n), self.dept(dept), self.bed(bed), "observation")
    }
}

pub fn draft(n: usize) -> PatientDraft {
    serde_json::from_value(json!({
        "firstName": format!("Patient{n}"),
        "lastName": "Test",
        "dateOfBirth": "1980-01-31",
        "gender": "other",
        "contactNumber": format!("555-{n:04}"),
        "emergencyContact": {
            "name": "Next Of Kin",
            "relationship": "sibling",
            "contactNumber": "555-9999"
        }
    }))
    .unwrap()
}

/// Hospital `h1` with department `icu` (beds 1, 2) and `ward` (beds 3, 4).
pub async fn ward() -> Ward {
    ward_on(Arc::new(InMemoryStorage::new())).await
}

pub async fn ward_on(storage: DynStorage) -> Ward {
    let events = Arc::new(RecordingPublisher::default());
    let publisher: Arc<dyn Publisher> = events.clone();
    build_ward(storage, events, publisher).await
}

/// Like [`ward`], but occupancy events go to `publisher` instead of being
/// recorded.
pub async fn ward_publishing_to(publisher: Arc<dyn Publisher>) -> Ward {
    let storage: DynStorage = Arc::new(InMemoryStorage::new());
    build_ward(storage, Arc::default(), publisher).await
}

async fn build_ward(
    storage: DynStorage,
    events: Arc<RecordingPublisher>,
    publisher: Arc<dyn Publisher>,
) -> Ward {
    let manager = OccupancyManager::new(storage.clone(), publisher.clone());
    let ward_service = WardService::new(storage.clone(), publisher, "h1");
    let billing = BillingService::new(storage.clone());

    let mut departments = HashMap::new();
    let mut beds = HashMap::new();
    for (name, numbers) in [("icu", ["1", "2"]), ("ward", ["3", "4"])] {
        let dept = ward_service
            .create_department(NewDepartment {
                name: name.to_string(),
                ..NewDepartment::default()
            })
            .await
            .unwrap();
        for number in numbers {
            let bed = ward_service
                .create_bed(NewBed {
                    department_id: dept.id.clone(),
                    bed_number: number.to_string(),
                    status: None,
                })
                .await
                .unwrap();
            beds.insert(number, bed.id);
        }
        departments.insert(name, dept.id);
    }
    events.take();

    Ward {
        storage,
        events,
        manager,
        ward: ward_service,
        billing,
        departments,
        beds,
    }
}

/// Checks the bed/admission invariants over the whole store.
pub async fn assert_consistent(storage: &dyn DocumentStorage) {
    let beds: Vec<Bed> = storage
        .list(Collection::Beds, &Filter::new())
        .await
        .unwrap()
        .iter()
        .map(|d| d.decode().unwrap())
        .collect();
    let patients: Vec<Patient> = storage
        .list(Collection::Patients, &Filter::new())
        .await
        .unwrap()
        .iter()
        .map(|d| d.decode().unwrap())
        .collect();

    let mut holders: HashMap<&str, &str> = HashMap::new();
    for patient in &patients {
        let active: Vec<_> = patient.admissions.iter().filter(|a| a.is_active()).collect();
        assert!(active.len() <= 1, "patient {} has {} active admissions", patient.id, active.len());
        if let Some(admission) = patient.active_admission() {
            if let Some(other) = holders.insert(admission.bed_id.as_str(), patient.id.as_str()) {
                panic!("bed {} claimed by {} and {}", admission.bed_id, other, patient.id);
            }
        }
    }

    for bed in &beds {
        assert!(bed.is_consistent(), "bed {} inconsistent: {:?}", bed.id, bed);
        match holders.get(bed.id.as_str()) {
            Some(patient_id) => assert!(
                bed.is_occupied_by(patient_id),
                "bed {} should be held by {}",
                bed.id,
                patient_id
            ),
            None => assert_ne!(bed.status, BedStatus::Occupied, "bed {} occupied by nobody", bed.id),
        }
    }
}
