use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Result;
use crate::id::{generate_id, validate_id};
use crate::validation::{FieldErrors, non_blank};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Department {
    pub id: String,
    pub hospital_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Payload for creating a department. `hospitalId` falls back to the
/// deployment's default hospital when omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewDepartment {
    #[serde(default)]
    pub hospital_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub floor: Option<String>,
}

impl NewDepartment {
    pub fn into_department(self, default_hospital_id: &str, now: OffsetDateTime) -> Result<Department> {
        let mut errors = FieldErrors::new();
        errors.require("name", &self.name);
        let hospital_id =
            non_blank(self.hospital_id.as_deref()).unwrap_or_else(|| default_hospital_id.to_string());
        if let Err(e) = validate_id(&hospital_id) {
            errors.invalid("hospitalId", e.to_string());
        }
        errors.into_result()?;

        Ok(Department {
            id: generate_id(),
            hospital_id,
            name: self.name.trim().to_string(),
            description: non_blank(self.description.as_deref()),
            floor: non_blank(self.floor.as_deref()),
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now_utc;
    use serde_json::json;

    #[test]
    fn builds_department_with_default_hospital() {
        let draft: NewDepartment = serde_json::from_value(json!({"name": " ICU "})).unwrap();
        let dept = draft.into_department("general", now_utc()).unwrap();
        assert_eq!(dept.name, "ICU");
        assert_eq!(dept.hospital_id, "general");
    }

    #[test]
    fn rejects_blank_name_and_unknown_fields() {
        let draft = NewDepartment::default();
        assert!(draft.into_department("general", now_utc()).is_err());

        let raw = json!({"name": "ICU", "capacity": 12});
        assert!(serde_json::from_value::<NewDepartment>(raw).is_err());
    }
}
