//! Event model
//!
//! Minimal record for the hackathon a team registers against. The full
//! event lifecycle (approval, scheduling, judging) lives elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(name: String, starts_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            starts_at,
            created_at: Utc::now(),
        }
    }
}
