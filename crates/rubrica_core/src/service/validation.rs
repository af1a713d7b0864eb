//! Input rules for contact fields.
//!
//! # Invariants
//! - Names: letters (including Latin-1 accented letters), apostrophes,
//!   hyphens and whitespace; at least one character.
//! - Phones: optional leading `+` followed by ASCII digits only.
//! - Ages fit in `u32` and are never negative.

use crate::error::{ContactError, ContactResult};
use once_cell::sync::Lazy;
use regex::Regex;

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-zÀ-ÖØ-öø-ÿ'\-\s]+$").expect("valid name regex"));
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9]+$").expect("valid phone regex"));

const NAME_RULE: &str = "first and last name may only contain letters, spaces, apostrophes or hyphens";

pub fn is_valid_name(value: &str) -> bool {
    NAME_RE.is_match(value)
}

pub fn is_valid_phone(value: &str) -> bool {
    PHONE_RE.is_match(value)
}

/// Checks a first/last name pair; both must pass.
pub fn check_name_pair(first_name: &str, last_name: &str) -> ContactResult<()> {
    if is_valid_name(first_name) && is_valid_name(last_name) {
        Ok(())
    } else {
        Err(ContactError::InvalidEntry(NAME_RULE.to_string()))
    }
}

pub fn check_phone(phone: &str) -> ContactResult<()> {
    if is_valid_phone(phone) {
        Ok(())
    } else {
        Err(ContactError::InvalidPhone(phone.to_string()))
    }
}

/// Converts a caller-supplied age, rejecting negatives and overflow.
pub fn check_age(age: i64) -> ContactResult<u32> {
    u32::try_from(age).map_err(|_| {
        ContactError::InvalidEntry(format!("age must be between 0 and {}, got {age}", u32::MAX))
    })
}

/// Parses the age column of a delimited line.
pub fn parse_age_column(text: &str) -> ContactResult<i64> {
    text.parse::<i32>()
        .map(i64::from)
        .map_err(|_| ContactError::InvalidEntry(format!("age must be a number, got `{text}`")))
}

/// Parses an age edit; negative and non-numeric input share one message.
pub fn parse_age_update(text: &str) -> ContactResult<u32> {
    text.parse::<i64>()
        .ok()
        .and_then(|age| u32::try_from(age).ok())
        .ok_or_else(|| {
            ContactError::InvalidEntry(format!(
                "age must be a non-negative number, got `{text}`"
            ))
        })
}
