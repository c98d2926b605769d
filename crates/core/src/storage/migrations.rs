//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// Name of the superseded unique index on `registrations.user_number`.
///
/// Schema v1 deduplicated registrations by participant number, which breaks
/// as soon as one participant registers for a second event. v3 introduced the
/// compound index on (event_id, user_id) but deployed databases still carry
/// this one until the fix-indexes maintenance operation drops it.
pub const LEGACY_USER_NUMBER_INDEX: &str = "idx_registrations_user_number";

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Accounts
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                phone TEXT,
                role TEXT NOT NULL DEFAULT 'participant',
                approved INTEGER NOT NULL DEFAULT 0,
                registration_number TEXT,
                created_at TEXT NOT NULL
            );

            -- Participant numbers are unique when present; legacy rows
            -- without one carry NULL until backfilled.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_users_registration_number
                ON users(registration_number);

            -- Sessions
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Events teams register against
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                starts_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            -- Team registrations
            CREATE TABLE IF NOT EXISTS registrations (
                id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                registration_number TEXT NOT NULL,
                user_number TEXT NOT NULL,
                team_size INTEGER NOT NULL,
                teammates_json TEXT NOT NULL DEFAULT '[]',
                status TEXT NOT NULL DEFAULT 'pending',
                registered_at TEXT NOT NULL,
                FOREIGN KEY (event_id) REFERENCES events(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_registrations_number
                ON registrations(registration_number);

            -- v1 deduplicated by participant number. Superseded by the
            -- compound index in v3; dropped by the fix-indexes maintenance
            -- operation, not by a migration.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_registrations_user_number
                ON registrations(user_number);
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes for query performance",
        sql: r#"
            -- Session indexes
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

            -- Registration lookups by event
            CREATE INDEX IF NOT EXISTS idx_registrations_event ON registrations(event_id);
            CREATE INDEX IF NOT EXISTS idx_registrations_user ON registrations(user_id);
        "#,
    },
    Migration {
        version: 3,
        description: "One registration per participant per event",
        sql: r#"
            -- The intended duplicate check: a participant holds at most one
            -- registration per event.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_registrations_event_user
                ON registrations(event_id, user_id);
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .unwrap_or(None);
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    init_migrations_table(conn)?;

    let current_version = get_current_version(conn)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            conn.execute_batch(migration.sql)?;
            record_migration(conn, migration)?;

            info!(version = migration.version, "Migration complete");
        }
    }

    let new_version = get_current_version(conn)?;
    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}

/// Check whether a named index exists
pub fn has_index(conn: &Connection, name: &str) -> Result<bool> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
        rusqlite::params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Drop the superseded per-participant unique index on registrations.
///
/// Returns true if the index was present and dropped.
pub fn drop_legacy_user_number_index(conn: &Connection) -> Result<bool> {
    if !has_index(conn, LEGACY_USER_NUMBER_INDEX)? {
        return Ok(false);
    }
    conn.execute_batch(&format!("DROP INDEX {LEGACY_USER_NUMBER_INDEX}"))?;
    info!(index = LEGACY_USER_NUMBER_INDEX, "Dropped superseded index");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Get the latest migration version (test helper)
    fn latest_version() -> u32 {
        MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
    }

    #[test]
    fn test_migrations_run() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run twice
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_migrations_sequential() {
        // Verify migrations are numbered sequentially
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(
                migration.version as usize,
                i + 1,
                "Migration {} should have version {}",
                migration.description,
                i + 1
            );
        }
    }

    #[test]
    fn test_legacy_index_present_after_migrate() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        assert!(has_index(&conn, LEGACY_USER_NUMBER_INDEX).unwrap());
        assert!(has_index(&conn, "idx_registrations_event_user").unwrap());
    }

    #[test]
    fn test_drop_legacy_index() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        assert!(drop_legacy_user_number_index(&conn).unwrap());
        assert!(!has_index(&conn, LEGACY_USER_NUMBER_INDEX).unwrap());

        // Second drop is a no-op
        assert!(!drop_legacy_user_number_index(&conn).unwrap());
    }
}
