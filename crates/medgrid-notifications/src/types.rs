use medgrid_core::OccupancyEvent;
use serde::{Deserialize, Serialize};

use crate::error::NotificationError;

/// Events from one publish call, delivered to a session as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub hospital_id: String,
    pub events: Vec<OccupancyEvent>,
}

/// Frames a dashboard sends over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinHospital {
        hospital_id: String,
        #[serde(default)]
        department_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    LeaveHospital { hospital_id: String },
    Ping,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, NotificationError> {
        serde_json::from_str(text).map_err(|e| NotificationError::InvalidMessage(e.to_string()))
    }
}

/// Control frames the server sends besides occupancy events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Joined {
        hospital_id: String,
        department_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Left { hospital_id: String },
    Pong,
    Error { message: String },
}
