//! Administrative repair operations
//!
//! Backfills participant numbers on accounts that predate allocation and
//! removes the superseded unique index left behind by the v1 schema.

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::User;
use crate::storage::Database;
use crate::workflow::RegistrationWorkflow;

/// One account the backfill could not repair
#[derive(Debug, Clone)]
pub struct RepairFailure {
    pub user_id: Uuid,
    pub email: String,
    pub reason: String,
}

/// Result of a backfill scan
#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    pub scanned: usize,
    pub repaired: usize,
    pub failures: Vec<RepairFailure>,
}

/// Result of the index repair
#[derive(Debug, Clone, Copy)]
pub struct IndexRepair {
    pub dropped_legacy_index: bool,
}

pub struct Maintenance<'a> {
    db: &'a Database,
}

impl<'a> Maintenance<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Assign participant numbers to every account missing one.
    ///
    /// Per-account failures are collected in the report; the scan continues
    /// past them.
    #[instrument(skip(self))]
    pub fn backfill_user_numbers(&self) -> Result<RepairReport> {
        let missing = self.db.users().list_missing_number()?;
        let workflow = RegistrationWorkflow::new(self.db);

        let mut report = RepairReport {
            scanned: missing.len(),
            ..Default::default()
        };

        for user in missing {
            match workflow.backfill_user_number(&user) {
                Ok(number) => {
                    info!(user_id = %user.id, %number, "backfilled participant number");
                    report.repaired += 1;
                }
                Err(e) => {
                    warn!(user_id = %user.id, error = %e, "backfill failed for account");
                    report.failures.push(RepairFailure {
                        user_id: user.id,
                        email: user.email.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            scanned = report.scanned,
            repaired = report.repaired,
            failed = report.failures.len(),
            "backfill complete"
        );
        Ok(report)
    }

    /// Drop the superseded per-participant unique index if present.
    #[instrument(skip(self))]
    pub fn repair_indexes(&self) -> Result<IndexRepair> {
        let dropped = self.db.drop_legacy_user_number_index()?;
        Ok(IndexRepair {
            dropped_legacy_index: dropped,
        })
    }

    /// Whether the database still needs the index repair
    pub fn legacy_index_present(&self) -> Result<bool> {
        self.db.has_legacy_user_number_index()
    }

    /// Mark the account with this email as approved.
    #[instrument(skip(self))]
    pub fn approve_account(&self, email: &str) -> Result<User> {
        let users = self.db.users();
        let user = users
            .find_by_email(email)?
            .ok_or_else(|| Error::NotFound("user".to_string()))?;
        users.set_approved(user.id, true)?;

        info!(user_id = %user.id, "account approved");
        users
            .find_by_id(user.id)?
            .ok_or_else(|| Error::NotFound("user".to_string()))
    }

    /// Delete expired sessions, returning how many were removed.
    #[instrument(skip(self))]
    pub fn prune_sessions(&self) -> Result<u64> {
        let removed = self.db.users().cleanup_expired_sessions()?;
        info!(removed, "expired sessions pruned");
        Ok(removed)
    }
}
