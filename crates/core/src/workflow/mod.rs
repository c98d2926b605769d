//! Registration workflows
//!
//! Library-level operations an HTTP layer would call: account signup and
//! login, team registration with the legacy-index repair path, and the
//! administrative maintenance operations.

mod maintenance;
mod register;
mod signup;

pub use maintenance::{IndexRepair, Maintenance, RepairFailure, RepairReport};
pub use register::{RegistrationWorkflow, TeamSignup};
pub use signup::{NewAccount, SignupOutcome, SignupWorkflow};
