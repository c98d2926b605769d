//! Team registration for an event
//!
//! Commits a registration row with a fresh `HACK...` number. When the
//! superseded unique index on the participant number is still present in the
//! database (see `LEGACY_USER_NUMBER_INDEX`), a second registration by the
//! same participant trips it; the repair path reissues the participant's
//! `USR...` number and re-attempts the commit, bounded by
//! [`REPAIR_ATTEMPTS`](crate::allocator::REPAIR_ATTEMPTS).

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::allocator::{Commit, IdentifierAllocator, Namespace, INITIAL_ATTEMPTS, REPAIR_ATTEMPTS};
use crate::error::{Error, Result};
use crate::invariants::assert_registration_invariants;
use crate::models::{Registration, Teammate, User};
use crate::storage::{Database, RegistrationCommit, UserCommit};

/// Input for registering a team
#[derive(Debug, Clone)]
pub struct TeamSignup {
    pub event_id: Uuid,
    pub team_size: u32,
    pub teammates: Vec<Teammate>,
}

pub struct RegistrationWorkflow<'a> {
    db: &'a Database,
    allocator: IdentifierAllocator,
}

impl<'a> RegistrationWorkflow<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            allocator: IdentifierAllocator::new(),
        }
    }

    pub fn with_allocator(db: &'a Database, allocator: IdentifierAllocator) -> Self {
        Self { db, allocator }
    }

    /// Register `user_id` for an event.
    ///
    /// Fails with [`Error::AlreadyRegistered`] when the participant already
    /// holds a registration for this event; that rejection never changes the
    /// participant's number.
    #[instrument(skip(self, signup), fields(event_id = %signup.event_id))]
    pub fn register(&self, user_id: Uuid, signup: TeamSignup) -> Result<Registration> {
        validate(&signup)?;

        self.db
            .events()
            .find_by_id(signup.event_id)?
            .ok_or_else(|| Error::NotFound("event".to_string()))?;

        let user = self
            .db
            .users()
            .find_by_id(user_id)?
            .ok_or_else(|| Error::NotFound("user".to_string()))?;

        // Business-rule duplicate check, independent of number allocation.
        if self
            .db
            .registrations()
            .find_by_event_and_user(signup.event_id, user_id)?
            .is_some()
        {
            return Err(Error::AlreadyRegistered);
        }

        let mut user_number = match user.number() {
            Some(n) => n.to_string(),
            None => self.backfill_user_number(&user)?,
        };

        let mut registration = Registration::new(
            signup.event_id,
            user_id,
            user_number.clone(),
            signup.team_size,
            signup.teammates,
        );

        // Outer loop handles legacy-index conflicts; the inner allocation
        // retries only HACK-number collisions.
        for repair in 0..=REPAIR_ATTEMPTS {
            registration.user_number = user_number.clone();
            let regs = self.db.registrations();
            let result = self
                .allocator
                .allocate(Namespace::TeamRegistration, self.db, |candidate| {
                    registration.registration_number = candidate.to_string();
                    match regs.try_create(&registration)? {
                        RegistrationCommit::Stored => Ok(Commit::Stored),
                        RegistrationCommit::NumberTaken => Ok(Commit::ValueTaken),
                        RegistrationCommit::LegacyUserNumberTaken => {
                            Err(Error::LegacyNumberConflict)
                        }
                        RegistrationCommit::AlreadyRegistered => Err(Error::AlreadyRegistered),
                    }
                });

            match result {
                Ok(_) => {
                    assert_registration_invariants(&registration);
                    info!(
                        registration_id = %registration.id,
                        number = %registration.registration_number,
                        "team registered"
                    );
                    return Ok(registration);
                }
                Err(Error::LegacyNumberConflict) => {
                    if repair == REPAIR_ATTEMPTS {
                        return Err(Error::ExhaustedAttempts {
                            namespace: Namespace::UserNumber,
                            attempts: REPAIR_ATTEMPTS,
                        });
                    }
                    warn!(
                        user_id = %user_id,
                        repair = repair + 1,
                        "superseded index rejected registration; reissuing participant number"
                    );
                    user_number = self.reissue_user_number(&user)?;
                }
                Err(e) => return Err(e),
            }
        }

        unreachable!("repair loop returns within the bound");
    }

    /// Allocate a first participant number for an account that predates
    /// allocation. A fresh assignment gets the full initial attempt budget.
    pub(crate) fn backfill_user_number(&self, user: &User) -> Result<String> {
        self.assign_user_number(user, INITIAL_ATTEMPTS)
    }

    /// Replace a participant number that the superseded index rejected.
    /// Runs inside the repair loop, so it gets the tighter repair budget.
    fn reissue_user_number(&self, user: &User) -> Result<String> {
        self.assign_user_number(user, REPAIR_ATTEMPTS)
    }

    fn assign_user_number(&self, user: &User, bound: u32) -> Result<String> {
        let users = self.db.users();
        self.allocator
            .allocate_bounded(Namespace::UserNumber, bound, self.db, |candidate| {
                match users.assign_number(user.id, candidate)? {
                    UserCommit::Stored => Ok(Commit::Stored),
                    UserCommit::NumberTaken => Ok(Commit::ValueTaken),
                    UserCommit::EmailTaken => unreachable!("assign_number does not touch email"),
                }
            })
    }
}

fn validate(signup: &TeamSignup) -> Result<()> {
    if signup.team_size < 1 {
        return Err(Error::Validation("team size must be at least 1".to_string()));
    }
    if signup.teammates.len() as u32 >= signup.team_size {
        return Err(Error::Validation(
            "teammates must fit within the team size, excluding the registrant".to_string(),
        ));
    }
    if signup.teammates.iter().any(|t| t.name.trim().is_empty()) {
        return Err(Error::Validation("teammate names are required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, RegistrationStatus, Role};
    use crate::workflow::{NewAccount, SignupWorkflow};
    use chrono::Utc;

    fn make_workflow(db: &Database) -> RegistrationWorkflow<'_> {
        RegistrationWorkflow::with_allocator(db, IdentifierAllocator::without_pause())
    }

    fn seed_account(db: &Database, email: &str) -> User {
        SignupWorkflow::new(db)
            .signup(NewAccount {
                name: "Priya".to_string(),
                email: email.to_string(),
                password: "hunter22".to_string(),
                role: Some(Role::Participant),
                phone: None,
            })
            .unwrap()
            .user
    }

    fn seed_event(db: &Database, name: &str) -> Event {
        let event = Event::new(name.to_string(), Utc::now());
        db.events().create(&event).unwrap();
        event
    }

    fn team_of_two(event_id: Uuid) -> TeamSignup {
        TeamSignup {
            event_id,
            team_size: 2,
            teammates: vec![Teammate {
                name: "A".to_string(),
                email: Some("a@x.com".to_string()),
            }],
        }
    }

    #[test]
    fn test_register_end_to_end() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_account(&db, "p@x.com");
        let event = seed_event(&db, "Jam");
        let workflow = make_workflow(&db);

        let registration = workflow.register(user.id, team_of_two(event.id)).unwrap();
        assert!(registration.registration_number.starts_with("HACK"));
        assert_eq!(registration.status, RegistrationStatus::Pending);
        assert_eq!(registration.user_number, user.number().unwrap());

        // A second attempt for the same event is a business-rule rejection,
        // and the participant's number is untouched by it.
        let err = workflow
            .register(user.id, team_of_two(event.id))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyRegistered));

        let reloaded = db.users().find_by_id(user.id).unwrap().unwrap();
        assert_eq!(reloaded.number(), user.number());
    }

    #[test]
    fn test_register_backfills_missing_user_number() {
        let db = Database::open_in_memory().unwrap();
        let event = seed_event(&db, "Jam");

        // Legacy account created before allocation existed.
        let legacy = User::new(
            "Old Timer".to_string(),
            "old@x.com".to_string(),
            "hash".to_string(),
            Role::Participant,
            None,
        );
        db.users().try_create(&legacy).unwrap();

        let workflow = make_workflow(&db);
        let registration = workflow.register(legacy.id, team_of_two(event.id)).unwrap();

        let reloaded = db.users().find_by_id(legacy.id).unwrap().unwrap();
        let number = reloaded.number().expect("backfilled");
        assert!(number.starts_with("USR"));
        assert_eq!(registration.user_number, number);
    }

    #[test]
    fn test_legacy_index_repair_reissues_number() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.has_legacy_user_number_index().unwrap());

        let user = seed_account(&db, "p@x.com");
        let original_number = user.number().unwrap().to_string();
        let event_a = seed_event(&db, "Jam A");
        let event_b = seed_event(&db, "Jam B");
        let workflow = make_workflow(&db);

        workflow.register(user.id, team_of_two(event_a.id)).unwrap();

        // The second event trips the superseded index on user_number; the
        // repair path reissues the participant number and retries.
        let second = workflow.register(user.id, team_of_two(event_b.id)).unwrap();

        let reloaded = db.users().find_by_id(user.id).unwrap().unwrap();
        let new_number = reloaded.number().unwrap();
        assert_ne!(new_number, original_number);
        assert_eq!(second.user_number, new_number);
        assert_eq!(second.status, RegistrationStatus::Pending);
    }

    #[test]
    fn test_no_repair_needed_after_index_fix() {
        let db = Database::open_in_memory().unwrap();
        db.drop_legacy_user_number_index().unwrap();

        let user = seed_account(&db, "p@x.com");
        let original_number = user.number().unwrap().to_string();
        let event_a = seed_event(&db, "Jam A");
        let event_b = seed_event(&db, "Jam B");
        let workflow = make_workflow(&db);

        workflow.register(user.id, team_of_two(event_a.id)).unwrap();
        workflow.register(user.id, team_of_two(event_b.id)).unwrap();

        // With only the compound index in place, both registrations keep the
        // same participant number.
        let reloaded = db.users().find_by_id(user.id).unwrap().unwrap();
        assert_eq!(reloaded.number().unwrap(), original_number);
    }

    #[test]
    fn test_user_number_budget_flows_from_caller() {
        let db = Database::open_in_memory().unwrap();
        let workflow = make_workflow(&db);

        let legacy = User::new(
            "Old Timer".to_string(),
            "old@x.com".to_string(),
            "hash".to_string(),
            Role::Participant,
            None,
        );
        db.users().try_create(&legacy).unwrap();

        // Exhaustion reports the caller's budget; a zero budget gives up
        // before trying any candidate.
        let err = workflow.assign_user_number(&legacy, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::ExhaustedAttempts {
                namespace: Namespace::UserNumber,
                attempts: 0,
            }
        ));

        // A first-time assignment runs under the full initial bound, not
        // the tighter repair bound.
        assert!(INITIAL_ATTEMPTS > REPAIR_ATTEMPTS);
        let number = workflow.backfill_user_number(&legacy).unwrap();
        assert!(number.starts_with("USR"));
    }

    #[test]
    fn test_validation() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_account(&db, "p@x.com");
        let event = seed_event(&db, "Jam");
        let workflow = make_workflow(&db);

        let zero = TeamSignup {
            event_id: event.id,
            team_size: 0,
            teammates: vec![],
        };
        assert!(matches!(
            workflow.register(user.id, zero),
            Err(Error::Validation(_))
        ));

        let overfull = TeamSignup {
            event_id: event.id,
            team_size: 1,
            teammates: vec![Teammate {
                name: "A".to_string(),
                email: None,
            }],
        };
        assert!(matches!(
            workflow.register(user.id, overfull),
            Err(Error::Validation(_))
        ));

        let unknown_event = workflow.register(user.id, team_of_two(Uuid::new_v4()));
        assert!(matches!(unknown_event, Err(Error::NotFound(_))));

        // Aborted attempts claimed no team number.
        assert_eq!(db.registrations().list_for_event(event.id).unwrap().len(), 0);
    }
}
