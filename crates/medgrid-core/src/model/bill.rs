use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{CoreError, Result};
use crate::id::generate_id;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    #[default]
    Draft,
    Generated,
    Sent,
    Paid,
    Cancelled,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Generated => "generated",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }

    /// draft -> generated -> sent -> paid, and any open bill may be
    /// cancelled. Staying in the same status is always allowed.
    pub fn can_transition_to(&self, next: BillStatus) -> bool {
        use BillStatus::*;
        if *self == next {
            return true;
        }
        match (self, next) {
            (Paid | Cancelled, _) => false,
            (_, Cancelled) => true,
            (Draft, Generated) | (Generated, Sent) | (Sent, Paid) => true,
            _ => false,
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "generated" => Ok(Self::Generated),
            "sent" => Ok(Self::Sent),
            "paid" => Ok(Self::Paid),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CoreError::validation(format!("unknown bill status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Bill {
    pub id: String,
    pub patient_id: String,
    pub status: BillStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Bill {
    pub fn open(patient_id: &str, status: BillStatus, now: OffsetDateTime) -> Self {
        Self {
            id: generate_id(),
            patient_id: patient_id.to_string(),
            status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a lifecycle transition. Returns `false` for a same-status no-op.
    pub fn transition(&mut self, next: BillStatus, now: OffsetDateTime) -> Result<bool> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::invalid_transition(self.status, next));
        }
        if self.status == next {
            return Ok(false);
        }
        self.status = next;
        self.updated_at = now;
        Ok(true)
    }
}
