//! Team registration model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Review status of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(value: &str) -> RegistrationStatus {
        match value {
            "approved" => RegistrationStatus::Approved,
            "rejected" => RegistrationStatus::Rejected,
            _ => RegistrationStatus::Pending,
        }
    }
}

/// A teammate listed on a registration (the registrant is not included)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teammate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// One team's registration for an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    /// Team registration number (`HACK...`), assigned at commit time.
    pub registration_number: String,
    /// Snapshot of the registrant's participant number. The superseded
    /// unique index from schema v1 is defined on this column.
    pub user_number: String,
    pub team_size: u32,
    pub teammates: Vec<Teammate>,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
}

impl Registration {
    pub fn new(
        event_id: Uuid,
        user_id: Uuid,
        user_number: String,
        team_size: u32,
        teammates: Vec<Teammate>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            user_id,
            registration_number: String::new(),
            user_number,
            team_size,
            teammates,
            status: RegistrationStatus::Pending,
            registered_at: Utc::now(),
        }
    }
}
