//! Account signup and login

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::allocator::{Commit, IdentifierAllocator, Namespace};
use crate::error::{Error, Result};
use crate::models::{Role, Session, User};
use crate::storage::{Database, UserCommit};

const SESSION_HOURS: i64 = 24 * 7;
const MIN_PASSWORD_LEN: usize = 6;

/// Input for account creation
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub phone: Option<String>,
}

/// Successful signup or login: the account always carries its participant
/// number, and a fresh session.
#[derive(Debug, Clone)]
pub struct SignupOutcome {
    pub user: User,
    pub session: Session,
}

pub struct SignupWorkflow<'a> {
    db: &'a Database,
    allocator: IdentifierAllocator,
}

impl<'a> SignupWorkflow<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            allocator: IdentifierAllocator::new(),
        }
    }

    pub fn with_allocator(db: &'a Database, allocator: IdentifierAllocator) -> Self {
        Self { db, allocator }
    }

    /// Create an account. The participant number is allocated as part of the
    /// same insert that creates the row, so an aborted signup claims nothing.
    #[instrument(skip(self, account), fields(email = %account.email))]
    pub fn signup(&self, account: NewAccount) -> Result<SignupOutcome> {
        validate(&account)?;

        let users = self.db.users();
        if users.find_by_email(&account.email)?.is_some() {
            return Err(Error::Validation(
                "an account with this email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&account.password)?;
        let mut user = User::new(
            account.name,
            account.email,
            password_hash,
            account.role.unwrap_or(Role::Participant),
            account.phone,
        );

        self.allocator
            .allocate(Namespace::UserNumber, self.db, |candidate| {
                user.registration_number = Some(candidate.to_string());
                match users.try_create(&user)? {
                    UserCommit::Stored => Ok(Commit::Stored),
                    UserCommit::NumberTaken => Ok(Commit::ValueTaken),
                    // The pre-check above is racy; a concurrent signup can
                    // still win the email.
                    UserCommit::EmailTaken => Err(Error::Validation(
                        "an account with this email already exists".to_string(),
                    )),
                }
            })?;

        let session = Session::new(user.id, SESSION_HOURS);
        users.create_session(&session)?;

        info!(user_id = %user.id, "account created");
        Ok(SignupOutcome { user, session })
    }

    /// Verify credentials and open a session.
    #[instrument(skip(self, password))]
    pub fn login(&self, email: &str, password: &str) -> Result<SignupOutcome> {
        let users = self.db.users();
        let user = users
            .find_by_email(email)?
            .ok_or_else(|| Error::Authentication("invalid credentials".to_string()))?;

        verify_password(password, &user.password_hash)?;

        let session = Session::new(user.id, SESSION_HOURS);
        users.create_session(&session)?;

        Ok(SignupOutcome { user, session })
    }

    /// Change a password after verifying the current one.
    #[instrument(skip(self, current_password, new_password))]
    pub fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let users = self.db.users();
        let user = users
            .find_by_id(user_id)?
            .ok_or_else(|| Error::NotFound("user".to_string()))?;

        verify_password(current_password, &user.password_hash)?;

        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(Error::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let hash = hash_password(new_password)?;
        users.update_password_hash(user_id, &hash)?;
        Ok(())
    }
}

fn validate(account: &NewAccount) -> Result<()> {
    if account.name.trim().is_empty() {
        return Err(Error::Validation("name is required".to_string()));
    }
    if !plausible_email(&account.email) {
        return Err(Error::Validation("invalid email address".to_string()));
    }
    if account.password.len() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Shape check only: one `@` with a dotted, non-empty domain.
fn plausible_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        _ => false,
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, stored_hash: &str) -> Result<()> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|_| Error::Authentication("stored password hash is invalid".to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| Error::Authentication("invalid credentials".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::ClaimCheck;

    fn make_workflow(db: &Database) -> SignupWorkflow<'_> {
        SignupWorkflow::with_allocator(db, IdentifierAllocator::without_pause())
    }

    fn account(email: &str) -> NewAccount {
        NewAccount {
            name: "Priya".to_string(),
            email: email.to_string(),
            password: "hunter22".to_string(),
            role: None,
            phone: None,
        }
    }

    #[test]
    fn test_signup_assigns_number_and_session() {
        let db = Database::open_in_memory().unwrap();
        let workflow = make_workflow(&db);

        let outcome = workflow.signup(account("p@x.com")).unwrap();
        let number = outcome.user.number().expect("number assigned");
        assert!(number.starts_with("USR"));
        assert!(outcome.session.is_valid());
        assert_eq!(outcome.user.role, Role::Participant);

        // The number is claimed in its namespace.
        assert!(db.is_claimed(Namespace::UserNumber, number).unwrap());
    }

    #[test]
    fn test_signup_duplicate_email_rejected() {
        let db = Database::open_in_memory().unwrap();
        let workflow = make_workflow(&db);

        workflow.signup(account("p@x.com")).unwrap();
        let err = workflow.signup(account("p@x.com")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_signup_validation() {
        let db = Database::open_in_memory().unwrap();
        let workflow = make_workflow(&db);

        let mut bad = account("p@x.com");
        bad.password = "short".to_string();
        assert!(matches!(
            workflow.signup(bad),
            Err(Error::Validation(_))
        ));

        for email in ["", "no-at.example.com", "two@@x.com", "p@nodot", "p@.com"] {
            assert!(
                matches!(workflow.signup(account(email)), Err(Error::Validation(_))),
                "email {email:?} should be rejected"
            );
        }

        // Nothing was claimed by the failed attempts.
        assert!(db.users().list_missing_number().unwrap().is_empty());
        assert!(db.users().find_by_email("p@x.com").unwrap().is_none());
    }

    #[test]
    fn test_login_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let workflow = make_workflow(&db);

        let created = workflow.signup(account("p@x.com")).unwrap();
        let logged_in = workflow.login("p@x.com", "hunter22").unwrap();
        assert_eq!(logged_in.user.id, created.user.id);

        assert!(matches!(
            workflow.login("p@x.com", "wrong-password"),
            Err(Error::Authentication(_))
        ));
        assert!(matches!(
            workflow.login("nobody@x.com", "hunter22"),
            Err(Error::Authentication(_))
        ));
    }

    #[test]
    fn test_change_password() {
        let db = Database::open_in_memory().unwrap();
        let workflow = make_workflow(&db);

        let created = workflow.signup(account("p@x.com")).unwrap();
        workflow
            .change_password(created.user.id, "hunter22", "correcthorse")
            .unwrap();

        assert!(workflow.login("p@x.com", "hunter22").is_err());
        assert!(workflow.login("p@x.com", "correcthorse").is_ok());
    }
}
