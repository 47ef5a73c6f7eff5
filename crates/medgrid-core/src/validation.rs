use crate::error::{CoreError, Result};

/// Collects every missing or malformed field of an input payload so the
/// caller can fix them all in one round trip.
#[derive(Debug, Default)]
pub struct FieldErrors {
    missing: Vec<&'static str>,
    invalid: Vec<String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `field` as missing when `value` is blank.
    pub fn require(&mut self, field: &'static str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.missing.push(field);
            false
        } else {
            true
        }
    }

    pub fn require_some<T>(&mut self, field: &'static str, value: Option<&T>) -> bool {
        if value.is_none() {
            self.missing.push(field);
            false
        } else {
            true
        }
    }

    pub fn invalid(&mut self, field: &str, reason: impl AsRef<str>) {
        self.invalid.push(format!("{field} ({})", reason.as_ref()));
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let mut parts = Vec::with_capacity(2);
        if !self.missing.is_empty() {
            parts.push(format!("missing required fields: {}", self.missing.join(", ")));
        }
        if !self.invalid.is_empty() {
            parts.push(format!("invalid fields: {}", self.invalid.join(", ")));
        }
        Err(CoreError::validation(parts.join("; ")))
    }
}

/// Trims and returns the value, or `None` when blank.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collector_is_ok() {
        let mut errors = FieldErrors::new();
        assert!(errors.require("name", "Ward A"));
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn reports_all_fields_at_once() {
        let mut errors = FieldErrors::new();
        errors.require("firstName", "");
        errors.require("lastName", "   ");
        errors.invalid("gender", "expected male, female or other");
        let message = errors.into_result().unwrap_err().to_string();
        assert!(message.contains("firstName, lastName"));
        assert!(message.contains("gender (expected male, female or other)"));
    }

    #[test]
    fn non_blank_trims() {
        assert_eq!(non_blank(Some("  icu ")), Some("icu".to_string()));
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(None), None);
    }
}
