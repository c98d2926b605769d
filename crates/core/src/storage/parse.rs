//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values and classification of
//! unique-constraint failures.

use chrono::{DateTime, Utc};
use rusqlite::Error as SqlError;
use uuid::Uuid;

use crate::models::Teammate;

/// Parse a UUID from a database string column
pub fn parse_uuid(s: &str) -> Result<Uuid, SqlError> {
    Uuid::parse_str(s).map_err(|e| {
        SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Parse a teammate list from its JSON column
pub fn parse_teammates(s: &str) -> Result<Vec<Teammate>, SqlError> {
    serde_json::from_str(s).map_err(|e| {
        SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// The column list of a violated UNIQUE constraint, if `err` is one.
///
/// SQLite reports these as `UNIQUE constraint failed: <table.col[, ...]>`;
/// the suffix identifies which index rejected the write.
pub fn unique_violation(err: &SqlError) -> Option<&str> {
    const PREFIX: &str = "UNIQUE constraint failed: ";
    match err {
        SqlError::SqliteFailure(inner, Some(message))
            if inner.code == rusqlite::ErrorCode::ConstraintViolation
                && message.starts_with(PREFIX) =>
        {
            Some(&message[PREFIX.len()..])
        }
        _ => None,
    }
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_unique_violation_reports_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT UNIQUE)").unwrap();
        conn.execute("INSERT INTO t (v) VALUES ('x')", []).unwrap();

        let err = conn
            .execute("INSERT INTO t (v) VALUES ('x')", [])
            .unwrap_err();
        assert_eq!(unique_violation(&err), Some("t.v"));
    }

    #[test]
    fn test_unique_violation_ignores_other_errors() {
        let err = SqlError::QueryReturnedNoRows;
        assert_eq!(unique_violation(&err), None);
    }
}
