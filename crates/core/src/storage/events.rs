//! Event storage operations

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::Event;

pub struct EventStore<'a> {
    conn: &'a Connection,
}

impl<'a> EventStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new event
    #[instrument(skip(self, event), fields(name = %event.name))]
    pub fn create(&self, event: &Event) -> Result<()> {
        self.conn.execute(
            "INSERT INTO events (id, name, starts_at, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                event.id.to_string(),
                event.name,
                event.starts_at.to_rfc3339(),
                event.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find event by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Event>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, starts_at, created_at FROM events WHERE id = ?1")?;

        let event = stmt
            .query_row(params![id.to_string()], |row| {
                Ok(Event {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    name: row.get(1)?,
                    starts_at: parse_datetime(&row.get::<_, String>(2)?)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?)?,
                })
            })
            .optional()?;

        Ok(event)
    }

    /// List all events, newest first
    pub fn list(&self) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, starts_at, created_at FROM events ORDER BY created_at DESC",
        )?;

        let events = stmt
            .query_map([], |row| {
                Ok(Event {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    name: row.get(1)?,
                    starts_at: parse_datetime(&row.get::<_, String>(2)?)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use chrono::Utc;

    #[test]
    fn test_create_and_list() {
        let db = Database::open_in_memory().unwrap();
        let events = db.events();

        let event = Event::new("Spring Jam".to_string(), Utc::now());
        events.create(&event).unwrap();

        let found = events.find_by_id(event.id).unwrap().unwrap();
        assert_eq!(found.name, "Spring Jam");
        assert_eq!(events.list().unwrap().len(), 1);
    }
}
