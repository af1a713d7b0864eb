//! Line format and file naming for the file backend.
//!
//! Record line: `first;last;address;phone;age` followed by the platform line
//! separator, UTF-8.
//!
//! # Invariants
//! - Embedded `\r`/`\n` in text fields are written as spaces.
//! - The `;` delimiter is not escaped: a field containing `;` does not
//!   survive a round trip, and the damaged line is skipped on read.
//! - File names only contain `[A-Za-z0-9._-]`.

use crate::model::contact::Contact;
use once_cell::sync::Lazy;
use regex::Regex;

pub const FIELD_SEPARATOR: &str = ";";
pub const RECORD_FILE_EXTENSION: &str = ".txt";

#[cfg(windows)]
pub const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_SEPARATOR: &str = "\n";

static FIELD_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*;\s*").expect("valid field separator regex"));
static UNSAFE_PATH_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid path sanitizer regex"));

/// Serializes a contact to one record line, without line separator.
pub fn encode_line(contact: &Contact) -> String {
    [
        single_line(&contact.first_name),
        single_line(&contact.last_name),
        single_line(&contact.address),
        single_line(&contact.phone),
        contact.age.to_string(),
    ]
    .join(FIELD_SEPARATOR)
}

/// Parses one record line; returns `None` for malformed input.
pub fn decode_line(line: &str) -> Option<Contact> {
    let parts: Vec<&str> = FIELD_SPLIT_RE.split(line).collect();
    if parts.len() != 5 {
        return None;
    }
    let age = parts[4].trim().parse::<u32>().ok()?;
    Some(Contact::new(parts[0], parts[1], parts[2], parts[3], age))
}

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_for_path(value: &str) -> String {
    UNSAFE_PATH_CHARS_RE.replace_all(value, "_").into_owned()
}

/// Per-contact file name: `first-last-phone.txt`, each part sanitized.
pub fn record_file_name(contact: &Contact) -> String {
    format!(
        "{}-{}-{}{RECORD_FILE_EXTENSION}",
        sanitize_for_path(&contact.first_name),
        sanitize_for_path(&contact.last_name),
        sanitize_for_path(&contact.phone)
    )
}

/// Suffix shared by every file name written for `phone`.
pub fn phone_file_suffix(phone: &str) -> String {
    format!("-{}{RECORD_FILE_EXTENSION}", sanitize_for_path(phone))
}

/// Prefix shared by every file name written for a first/last name pair.
pub fn name_file_prefix(first_name: &str, last_name: &str) -> String {
    format!(
        "{}-{}-",
        sanitize_for_path(first_name),
        sanitize_for_path(last_name)
    )
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}
