//! Hackreg Core Library
//!
//! Models, SQLite storage, registration-number allocation, and the
//! registration workflows for the Hackreg platform.

pub mod allocator;
pub mod error;
pub mod invariants;
pub mod models;
pub mod storage;
pub mod workflow;

pub use allocator::{
    ClaimCheck, Commit, IdentifierAllocator, Namespace, INITIAL_ATTEMPTS, REPAIR_ATTEMPTS,
};
pub use error::{Error, Result};
pub use models::*;
pub use storage::{
    Database, EventStore, RegistrationCommit, RegistrationStore, UserCommit, UserStore,
    LEGACY_USER_NUMBER_INDEX,
};
pub use workflow::{
    IndexRepair, Maintenance, NewAccount, RegistrationWorkflow, RepairFailure, RepairReport,
    SignupOutcome, SignupWorkflow, TeamSignup,
};
