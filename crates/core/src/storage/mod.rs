//! SQLite storage layer for Hackreg

mod events;
mod migrations;
mod numbers;
mod parse;
mod registrations;
mod users;

use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;

use crate::error::Result;

pub use events::EventStore;
pub use migrations::LEGACY_USER_NUMBER_INDEX;
pub use registrations::{RegistrationCommit, RegistrationStore};
pub use users::{UserCommit, UserStore};

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get user store
    pub fn users(&self) -> UserStore<'_> {
        UserStore::new(&self.conn)
    }

    /// Get event store
    pub fn events(&self) -> EventStore<'_> {
        EventStore::new(&self.conn)
    }

    /// Get registration store
    pub fn registrations(&self) -> RegistrationStore<'_> {
        RegistrationStore::new(&self.conn)
    }

    /// Whether the superseded per-participant unique index is still present
    pub fn has_legacy_user_number_index(&self) -> Result<bool> {
        migrations::has_index(&self.conn, migrations::LEGACY_USER_NUMBER_INDEX)
    }

    /// Drop the superseded index; returns true if it was present
    pub fn drop_legacy_user_number_index(&self) -> Result<bool> {
        migrations::drop_legacy_user_number_index(&self.conn)
    }
}
