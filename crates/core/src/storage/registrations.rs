//! Team registration storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_teammates, parse_uuid, unique_violation, OptionalExt};
use crate::error::Result;
use crate::models::{Registration, RegistrationStatus};

/// Outcome of inserting a registration row, with uniqueness rejections
/// classified by the index that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationCommit {
    Stored,
    /// The `HACK...` candidate collided (`registrations.registration_number`).
    NumberTaken,
    /// The superseded per-participant index rejected the row
    /// (`registrations.user_number`). Repairable by reissuing the
    /// participant's number.
    LegacyUserNumberTaken,
    /// The compound (event, user) index fired: this participant already
    /// holds a registration for the event. Not repairable.
    AlreadyRegistered,
}

pub struct RegistrationStore<'a> {
    conn: &'a Connection,
}

const REG_COLUMNS: &str = "id, event_id, user_id, registration_number, user_number, \
     team_size, teammates_json, status, registered_at";

fn map_registration(row: &Row<'_>) -> std::result::Result<Registration, rusqlite::Error> {
    Ok(Registration {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        event_id: parse_uuid(&row.get::<_, String>(1)?)?,
        user_id: parse_uuid(&row.get::<_, String>(2)?)?,
        registration_number: row.get(3)?,
        user_number: row.get(4)?,
        team_size: row.get(5)?,
        teammates: parse_teammates(&row.get::<_, String>(6)?)?,
        status: RegistrationStatus::from_str(&row.get::<_, String>(7)?),
        registered_at: parse_datetime(&row.get::<_, String>(8)?)?,
    })
}

impl<'a> RegistrationStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a registration row, classifying uniqueness rejections.
    #[instrument(skip(self, reg), fields(event_id = %reg.event_id, user_id = %reg.user_id))]
    pub fn try_create(&self, reg: &Registration) -> Result<RegistrationCommit> {
        debug_assert!(
            !reg.registration_number.is_empty(),
            "registration committed without a number"
        );

        let teammates_json = serde_json::to_string(&reg.teammates)?;
        let result = self.conn.execute(
            "INSERT INTO registrations (id, event_id, user_id, registration_number, user_number, team_size, teammates_json, status, registered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                reg.id.to_string(),
                reg.event_id.to_string(),
                reg.user_id.to_string(),
                reg.registration_number,
                reg.user_number,
                reg.team_size,
                teammates_json,
                reg.status.as_str(),
                reg.registered_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(RegistrationCommit::Stored),
            Err(e) => match unique_violation(&e) {
                Some("registrations.registration_number") => Ok(RegistrationCommit::NumberTaken),
                Some("registrations.user_number") => Ok(RegistrationCommit::LegacyUserNumberTaken),
                Some("registrations.event_id, registrations.user_id") => {
                    Ok(RegistrationCommit::AlreadyRegistered)
                }
                _ => Err(e.into()),
            },
        }
    }

    /// Find registration by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Registration>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REG_COLUMNS} FROM registrations WHERE id = ?1"
        ))?;

        let reg = stmt
            .query_row(params![id.to_string()], map_registration)
            .optional()?;

        Ok(reg)
    }

    /// The registration a participant holds for an event, if any
    #[instrument(skip(self))]
    pub fn find_by_event_and_user(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REG_COLUMNS} FROM registrations WHERE event_id = ?1 AND user_id = ?2"
        ))?;

        let reg = stmt
            .query_row(
                params![event_id.to_string(), user_id.to_string()],
                map_registration,
            )
            .optional()?;

        Ok(reg)
    }

    /// List registrations for an event
    pub fn list_for_event(&self, event_id: Uuid) -> Result<Vec<Registration>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REG_COLUMNS} FROM registrations WHERE event_id = ?1 ORDER BY registered_at"
        ))?;

        let regs = stmt
            .query_map(params![event_id.to_string()], map_registration)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(regs)
    }

    /// Update review status
    pub fn update_status(&self, id: Uuid, status: RegistrationStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE registrations SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.to_string()],
        )?;
        Ok(())
    }
}
