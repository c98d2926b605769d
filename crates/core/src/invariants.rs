//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use uuid::Uuid;

use crate::allocator::Namespace;
use crate::models::{Registration, User};

/// A well-formed number: namespace prefix followed by digits only.
pub fn number_is_well_formed(value: &str, namespace: Namespace) -> bool {
    let prefix = namespace.prefix();
    match value.strip_prefix(prefix) {
        Some(digits) => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Validate that a committed registration is internally consistent
pub fn assert_registration_invariants(reg: &Registration) {
    debug_assert!(
        reg.event_id != Uuid::nil(),
        "Registration {} has nil event_id",
        reg.id
    );

    debug_assert!(
        reg.user_id != Uuid::nil(),
        "Registration {} has nil user_id",
        reg.id
    );

    debug_assert!(
        number_is_well_formed(&reg.registration_number, Namespace::TeamRegistration),
        "Registration {} has malformed number {:?}",
        reg.id,
        reg.registration_number
    );

    debug_assert!(
        number_is_well_formed(&reg.user_number, Namespace::UserNumber),
        "Registration {} carries malformed participant number {:?}",
        reg.id,
        reg.user_number
    );

    debug_assert!(
        reg.team_size as usize > reg.teammates.len(),
        "Registration {} team size {} cannot hold {} teammates plus the registrant",
        reg.id,
        reg.team_size,
        reg.teammates.len()
    );
}

/// Validate that a user's participant number, when present, is in the
/// correct namespace
pub fn assert_user_number_invariants(user: &User) {
    if let Some(number) = user.number() {
        debug_assert!(
            number_is_well_formed(number, Namespace::UserNumber),
            "User {} has malformed participant number {:?}",
            user.id,
            number
        );
    }
}
