//! Claimed-number lookups backing the allocator's advisory pre-check

use rusqlite::{params, Connection};

use crate::allocator::{ClaimCheck, Namespace};
use crate::error::Result;
use crate::storage::Database;

pub(crate) fn number_claimed(conn: &Connection, namespace: Namespace, value: &str) -> Result<bool> {
    let sql = match namespace {
        Namespace::UserNumber => "SELECT COUNT(*) FROM users WHERE registration_number = ?1",
        Namespace::TeamRegistration => {
            "SELECT COUNT(*) FROM registrations WHERE registration_number = ?1"
        }
    };

    let count: u32 = conn.query_row(sql, params![value], |row| row.get(0))?;
    Ok(count > 0)
}

impl ClaimCheck for Database {
    fn is_claimed(&self, namespace: Namespace, value: &str) -> Result<bool> {
        number_claimed(self.connection(), namespace, value)
    }
}
