//! Domain models

mod event;
mod registration;
mod user;

pub use event::Event;
pub use registration::{Registration, RegistrationStatus, Teammate};
pub use user::{Role, Session, User};
