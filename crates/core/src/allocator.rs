//! Registration number allocation
//!
//! Produces collision-free human-readable numbers (`USR...` for accounts,
//! `HACK...` for team registrations) and commits them through a caller-supplied
//! write capability. The storage layer's unique index is the sole source of
//! truth for uniqueness; the pre-check against [`ClaimCheck`] only reduces the
//! expected number of commit-time collisions.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};

/// Attempt bound for initial allocation.
pub const INITIAL_ATTEMPTS: u32 = 10;

/// Attempt bound for the save-time-collision repair path.
pub const REPAIR_ATTEMPTS: u32 = 5;

/// An independent uniqueness domain for registration numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Account numbers (`USR` prefix), unique across all user rows.
    UserNumber,
    /// Team registration numbers (`HACK` prefix), unique across all
    /// registration rows.
    TeamRegistration,
}

impl Namespace {
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::UserNumber => "USR",
            Namespace::TeamRegistration => "HACK",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::UserNumber => write!(f, "participant"),
            Namespace::TeamRegistration => write!(f, "team registration"),
        }
    }
}

/// Outcome of one commit attempt, reported by the owner-write capability.
///
/// Any failure other than a uniqueness collision on the candidate value must
/// be returned as `Err` instead; the allocator propagates it unchanged and
/// does not retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// The candidate was durably written to the owner record.
    Stored,
    /// The candidate value is already claimed in this namespace.
    ValueTaken,
}

/// Advisory lookup of already-claimed values in a namespace.
///
/// Implementations query the unique column directly. The check is racy under
/// concurrent allocation; correctness comes from the unique constraint hit at
/// commit time.
pub trait ClaimCheck {
    fn is_claimed(&self, namespace: Namespace, value: &str) -> Result<bool>;
}

/// Allocates registration numbers with bounded retry on collision.
pub struct IdentifierAllocator {
    retry_pause: Duration,
}

impl Default for IdentifierAllocator {
    fn default() -> Self {
        Self {
            retry_pause: Duration::from_millis(2),
        }
    }
}

impl IdentifierAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable the pause between retries (for tests).
    pub fn without_pause() -> Self {
        Self {
            retry_pause: Duration::ZERO,
        }
    }

    /// Allocate a number in `namespace` with the initial attempt bound.
    ///
    /// `commit` persists the candidate against the owner record and reports
    /// whether the value was stored or already taken. It must be safe to call
    /// again with a new candidate: a failed attempt may not leave partial
    /// state behind beyond the number field itself.
    pub fn allocate<F>(
        &self,
        namespace: Namespace,
        claims: &dyn ClaimCheck,
        commit: F,
    ) -> Result<String>
    where
        F: FnMut(&str) -> Result<Commit>,
    {
        self.allocate_bounded(namespace, INITIAL_ATTEMPTS, claims, commit)
    }

    /// Allocate with an explicit attempt bound (the repair path uses
    /// [`REPAIR_ATTEMPTS`]).
    #[instrument(skip(self, claims, commit))]
    pub fn allocate_bounded<F>(
        &self,
        namespace: Namespace,
        bound: u32,
        claims: &dyn ClaimCheck,
        mut commit: F,
    ) -> Result<String>
    where
        F: FnMut(&str) -> Result<Commit>,
    {
        for attempt in 1..=bound {
            let candidate = self.candidate(namespace);

            // Advisory pre-check; skips a doomed commit but guarantees nothing.
            if claims.is_claimed(namespace, &candidate)? {
                debug!(attempt, %candidate, "candidate already claimed, retrying");
                self.pause();
                continue;
            }

            match commit(&candidate)? {
                Commit::Stored => {
                    debug!(attempt, %candidate, "number committed");
                    return Ok(candidate);
                }
                Commit::ValueTaken => {
                    debug!(attempt, %candidate, "candidate collided at commit time");
                    self.pause();
                }
            }
        }

        warn!(%namespace, bound, "allocation attempts exhausted");
        Err(Error::ExhaustedAttempts {
            namespace,
            attempts: bound,
        })
    }

    /// Candidate format: `<PREFIX><unix-millis><4-digit random>`.
    fn candidate(&self, namespace: Namespace) -> String {
        let millis = Utc::now().timestamp_millis();
        let random: u32 = rand::thread_rng().gen_range(0..10_000);
        format!("{}{}{:04}", namespace.prefix(), millis, random)
    }

    fn pause(&self) {
        if !self.retry_pause.is_zero() {
            std::thread::sleep(self.retry_pause);
        }
    }
}
