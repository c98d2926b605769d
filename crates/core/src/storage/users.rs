//! User storage operations

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_uuid, unique_violation, OptionalExt};
use crate::error::Result;
use crate::models::{Role, Session, User};

/// Outcome of writing a user row, with unique-constraint failures classified
/// by the index that rejected the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommit {
    Stored,
    /// `users.email` is already taken.
    EmailTaken,
    /// `users.registration_number` is already claimed.
    NumberTaken,
}

pub struct UserStore<'a> {
    conn: &'a Connection,
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, phone, role, approved, registration_number, created_at";

fn map_user(row: &Row<'_>) -> std::result::Result<User, rusqlite::Error> {
    Ok(User {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        phone: row.get(4)?,
        role: Role::from_str(&row.get::<_, String>(5)?),
        approved: row.get::<_, i32>(6)? != 0,
        registration_number: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?)?,
    })
}

impl<'a> UserStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a new user, classifying uniqueness rejections.
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub fn try_create(&self, user: &User) -> Result<UserCommit> {
        let result = self.conn.execute(
            "INSERT INTO users (id, name, email, password_hash, phone, role, approved, registration_number, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.password_hash,
                user.phone,
                user.role.as_str(),
                user.approved as i32,
                user.registration_number,
                user.created_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(UserCommit::Stored),
            Err(e) => match unique_violation(&e) {
                Some("users.email") => Ok(UserCommit::EmailTaken),
                Some("users.registration_number") => Ok(UserCommit::NumberTaken),
                _ => Err(e.into()),
            },
        }
    }

    /// Find user by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;

        let user = stmt
            .query_row(params![id.to_string()], map_user)
            .optional()?;

        Ok(user)
    }

    /// Find user by email
    #[instrument(skip(self))]
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))?;

        let user = stmt.query_row(params![email], map_user).optional()?;

        Ok(user)
    }

    /// Overwrite a user's participant number, classifying collisions.
    #[instrument(skip(self))]
    pub fn assign_number(&self, user_id: Uuid, number: &str) -> Result<UserCommit> {
        let result = self.conn.execute(
            "UPDATE users SET registration_number = ?1 WHERE id = ?2",
            params![number, user_id.to_string()],
        );

        match result {
            Ok(_) => Ok(UserCommit::Stored),
            Err(e) => match unique_violation(&e) {
                Some("users.registration_number") => Ok(UserCommit::NumberTaken),
                _ => Err(e.into()),
            },
        }
    }

    /// Users with a missing or empty participant number (backfill candidates)
    pub fn list_missing_number(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE registration_number IS NULL OR registration_number = ''
             ORDER BY created_at"
        ))?;

        let users = stmt
            .query_map([], map_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Update approval flag
    pub fn set_approved(&self, user_id: Uuid, approved: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET approved = ?1 WHERE id = ?2",
            params![approved as i32, user_id.to_string()],
        )?;
        Ok(())
    }

    /// Replace the stored password hash
    pub fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, user_id.to_string()],
        )?;
        Ok(())
    }

    /// Create a session
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub fn create_session(&self, session: &Session) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id.to_string(),
                session.user_id.to_string(),
                session.created_at.to_rfc3339(),
                session.expires_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find valid session
    #[instrument(skip(self))]
    pub fn find_valid_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = ?1 AND expires_at > ?2",
        )?;

        let now = Utc::now().to_rfc3339();
        let session = stmt
            .query_row(params![session_id.to_string(), now], |row| {
                Ok(Session {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    user_id: parse_uuid(&row.get::<_, String>(1)?)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?)?,
                    expires_at: parse_datetime(&row.get::<_, String>(3)?)?,
                })
            })
            .optional()?;

        Ok(session)
    }

    /// Delete session
    pub fn delete_session(&self, session_id: Uuid) -> Result<()> {
        self.conn.execute(
            "DELETE FROM sessions WHERE id = ?1",
            params![session_id.to_string()],
        )?;
        Ok(())
    }

    /// Clean up expired sessions
    pub fn cleanup_expired_sessions(&self) -> Result<u64> {
        let count = self.conn.execute(
            "DELETE FROM sessions WHERE expires_at < ?1",
            params![Utc::now().to_rfc3339()],
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::storage::Database;

    fn make_user(email: &str, number: Option<&str>) -> User {
        let mut user = User::new(
            "Test User".to_string(),
            email.to_string(),
            "hash".to_string(),
            Role::Participant,
            None,
        );
        user.registration_number = number.map(str::to_string);
        user
    }

    #[test]
    fn test_create_and_find() {
        let db = Database::open_in_memory().unwrap();
        let users = db.users();

        let user = make_user("a@x.com", Some("USR17000000000000001"));
        assert_eq!(users.try_create(&user).unwrap(), UserCommit::Stored);

        let found = users.find_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.number(), Some("USR17000000000000001"));
        assert_eq!(found.role, Role::Participant);
        assert!(!found.approved);
    }

    #[test]
    fn test_duplicate_email_classified() {
        let db = Database::open_in_memory().unwrap();
        let users = db.users();

        users
            .try_create(&make_user("a@x.com", Some("USR17000000000000001")))
            .unwrap();
        let outcome = users
            .try_create(&make_user("a@x.com", Some("USR17000000000000002")))
            .unwrap();
        assert_eq!(outcome, UserCommit::EmailTaken);
    }

    #[test]
    fn test_duplicate_number_classified() {
        let db = Database::open_in_memory().unwrap();
        let users = db.users();

        users
            .try_create(&make_user("a@x.com", Some("USR17000000000000001")))
            .unwrap();
        let outcome = users
            .try_create(&make_user("b@x.com", Some("USR17000000000000001")))
            .unwrap();
        assert_eq!(outcome, UserCommit::NumberTaken);
    }

    #[test]
    fn test_missing_numbers_do_not_collide() {
        let db = Database::open_in_memory().unwrap();
        let users = db.users();

        // Two legacy rows without a number coexist (NULLs are distinct).
        users.try_create(&make_user("a@x.com", None)).unwrap();
        users.try_create(&make_user("b@x.com", None)).unwrap();

        let missing = users.list_missing_number().unwrap();
        assert_eq!(missing.len(), 2);
    }

    #[test]
    fn test_assign_number_collision() {
        let db = Database::open_in_memory().unwrap();
        let users = db.users();

        users
            .try_create(&make_user("a@x.com", Some("USR17000000000000001")))
            .unwrap();
        let legacy = make_user("b@x.com", None);
        users.try_create(&legacy).unwrap();

        let outcome = users
            .assign_number(legacy.id, "USR17000000000000001")
            .unwrap();
        assert_eq!(outcome, UserCommit::NumberTaken);

        let outcome = users
            .assign_number(legacy.id, "USR17000000000000002")
            .unwrap();
        assert_eq!(outcome, UserCommit::Stored);
        assert!(users.list_missing_number().unwrap().is_empty());
    }

    #[test]
    fn test_sessions() {
        let db = Database::open_in_memory().unwrap();
        let users = db.users();

        let user = make_user("a@x.com", Some("USR17000000000000001"));
        users.try_create(&user).unwrap();

        let session = Session::new(user.id, 24);
        users.create_session(&session).unwrap();

        let found = users.find_valid_session(session.id).unwrap().unwrap();
        assert_eq!(found.user_id, user.id);

        users.delete_session(session.id).unwrap();
        assert!(users.find_valid_session(session.id).unwrap().is_none());
    }
}
