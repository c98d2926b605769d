//! Error types for Hackreg Core

use thiserror::Error;

use crate::allocator::Namespace;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Could not allocate a unique {namespace} number after {attempts} attempts")]
    ExhaustedAttempts { namespace: Namespace, attempts: u32 },

    #[error("Already registered for this event")]
    AlreadyRegistered,

    #[error("Registration commit hit the superseded unique index on the participant number")]
    LegacyNumberConflict,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
