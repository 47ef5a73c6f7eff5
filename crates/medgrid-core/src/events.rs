use serde::{Deserialize, Serialize};

use crate::model::{Bed, BedStatus};

pub const OCCUPANCY_CHANGED: &str = "occupancy-changed";

/// Pushed to dashboards whenever a bed changes status or occupant.
///
/// Serialized as
/// `{"type":"occupancy-changed","bedId":..,"departmentId":..,"status":..,"patientId":..|null,"version":..}`.
///
/// `version` is the bed's store version after the commit that produced the
/// event. It grows with every commit touching the bed, so a consumer keeps
/// the event with the highest version as the bed's current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "occupancy-changed", rename_all = "camelCase")]
pub struct OccupancyEvent {
    pub bed_id: String,
    pub department_id: String,
    pub status: BedStatus,
    pub patient_id: Option<String>,
    pub version: u64,
}

impl OccupancyEvent {
    /// Snapshot of a bed's occupancy as committed at `version`.
    pub fn from_bed(bed: &Bed, version: u64) -> Self {
        Self {
            bed_id: bed.id.clone(),
            department_id: bed.department_id.clone(),
            status: bed.status,
            patient_id: bed.current_patient_id.clone(),
            version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_wire_shape() {
        let event = OccupancyEvent {
            bed_id: "b1".into(),
            department_id: "d1".into(),
            status: BedStatus::Available,
            patient_id: None,
            version: 7,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "occupancy-changed",
                "bedId": "b1",
                "departmentId": "d1",
                "status": "available",
                "patientId": null,
                "version": 7
            })
        );
    }

    #[test]
    fn rejects_other_event_types() {
        let raw = json!({
            "type": "bed-deleted",
            "bedId": "b1",
            "departmentId": "d1",
            "status": "available",
            "patientId": null,
            "version": 1
        });
        assert!(serde_json::from_value::<OccupancyEvent>(raw).is_err());
    }
}
