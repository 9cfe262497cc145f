//! Field and cross-field validity checks.
//!
//! Predicates are pure and are evaluated on demand against whatever values
//! a record currently holds, so an edited but unsaved record reports its
//! edited state. The `validate_*` functions turn the same predicates into
//! `InvalidData` errors for the store's write paths.

use crate::error::{CoreError, CoreResult};
use crate::model::{Family, UserProfile};

fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}

/// A family name must contain a non-whitespace character.
#[must_use]
pub fn is_name_valid(name: &str) -> bool {
    is_present(name)
}

/// A family join code must contain a non-whitespace character.
#[must_use]
pub fn is_code_valid(code: &str) -> bool {
    is_present(code)
}

/// A display name must contain a non-whitespace character.
#[must_use]
pub fn is_display_name_valid(display_name: &str) -> bool {
    is_present(display_name)
}

/// The credential-derived user key must contain a non-whitespace character.
#[must_use]
pub fn is_apple_user_id_hash_valid(hash: &str) -> bool {
    is_present(hash)
}

/// Checks every field of a family.
pub fn validate_family(family: &Family) -> CoreResult<()> {
    if !is_name_valid(&family.name) {
        return Err(CoreError::invalid_data("family name cannot be empty"));
    }
    if !is_code_valid(&family.code) {
        return Err(CoreError::invalid_data("family code cannot be empty"));
    }
    Ok(())
}

/// Checks every field of a user profile.
pub fn validate_user_profile(user: &UserProfile) -> CoreResult<()> {
    if !is_display_name_valid(&user.display_name) {
        return Err(CoreError::invalid_data("display name cannot be empty"));
    }
    if !is_apple_user_id_hash_valid(&user.apple_user_id_hash) {
        return Err(CoreError::invalid_data("apple user id hash cannot be empty"));
    }
    Ok(())
}

/// Lookup keys are checked before touching the store.
pub(crate) fn require_lookup_key(what: &str, key: &str) -> CoreResult<()> {
    if key.is_empty() {
        return Err(CoreError::invalid_data(format!("{what} cannot be empty")));
    }
    Ok(())
}
