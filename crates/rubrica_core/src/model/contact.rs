//! Contact domain model.
//!
//! # Responsibility
//! - Define the value carried for every directory entry.
//! - Provide the closed set of editable fields and their typed updates.
//!
//! # Invariants
//! - `phone` is the only identity key: equality and hashing ignore every
//!   other field.
//! - Lookups by identity take the phone as `&str` (`ContactSet::get`,
//!   `ContactSet::position`, `ContactSet::contains_phone`); no key-only
//!   `Contact` is built for them.
//! - No validation happens here; the directory service owns input rules.
//! - Name ordering (`cmp_by_name`) is intentionally not `Ord`, because it is
//!   not consistent with phone-based equality.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// One directory entry, identified by its phone number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    /// Identity key. Two contacts with the same phone are the same entity.
    pub phone: String,
    pub age: u32,
}

impl Contact {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        address: impl Into<String>,
        phone: impl Into<String>,
        age: u32,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            address: address.into(),
            phone: phone.into(),
            age,
        }
    }

    /// Returns `"<first> <last>"` for listings.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Alphabetical ordering on the concatenation of first and last name.
    pub fn cmp_by_name(&self, other: &Self) -> Ordering {
        let left = self.first_name.chars().chain(self.last_name.chars());
        let right = other.first_name.chars().chain(other.last_name.chars());
        left.cmp(right)
    }

    /// Compares every field, not only the identity key.
    pub fn same_fields(&self, other: &Self) -> bool {
        self.first_name == other.first_name
            && self.last_name == other.last_name
            && self.address == other.address
            && self.phone == other.phone
            && self.age == other.age
    }

    /// Reads one field as text.
    pub fn field_value(&self, field: ContactField) -> String {
        match field {
            ContactField::FirstName => self.first_name.clone(),
            ContactField::LastName => self.last_name.clone(),
            ContactField::Address => self.address.clone(),
            ContactField::Phone => self.phone.clone(),
            ContactField::Age => self.age.to_string(),
        }
    }

    /// Applies one typed field update in place.
    pub fn apply(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::FirstName(value) => self.first_name = value,
            FieldUpdate::LastName(value) => self.last_name = value,
            FieldUpdate::Address(value) => self.address = value,
            FieldUpdate::Phone(value) => self.phone = value,
            FieldUpdate::Age(value) => self.age = value,
        }
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.phone == other.phone
    }
}

impl Eq for Contact {}

impl Hash for Contact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.phone.hash(state);
    }
}

impl Display for Contact {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}; {}; {}; {}; {}}}",
            self.first_name, self.last_name, self.address, self.phone, self.age
        )
    }
}

/// Closed set of field names accepted by `ContactDirectory::modify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    FirstName,
    LastName,
    Address,
    Phone,
    Age,
}

impl ContactField {
    pub const ALL: [ContactField; 5] = [
        ContactField::FirstName,
        ContactField::LastName,
        ContactField::Address,
        ContactField::Phone,
        ContactField::Age,
    ];

    /// Canonical tag used in messages and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Address => "address",
            Self::Phone => "phone",
            Self::Age => "age",
        }
    }

    /// Resolves a field tag.
    ///
    /// Accepts the canonical tags plus the legacy tags written by earlier
    /// front ends (`nome`, `cognome`, `indirizzo`, `telefono`, `eta`).
    /// Matching is exact and case-sensitive.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "first_name" | "nome" => Some(Self::FirstName),
            "last_name" | "cognome" => Some(Self::LastName),
            "address" | "indirizzo" => Some(Self::Address),
            "phone" | "telefono" => Some(Self::Phone),
            "age" | "eta" => Some(Self::Age),
            _ => None,
        }
    }
}

impl Display for ContactField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated new value for exactly one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    FirstName(String),
    LastName(String),
    Address(String),
    Phone(String),
    Age(u32),
}

impl FieldUpdate {
    pub fn field(&self) -> ContactField {
        match self {
            Self::FirstName(_) => ContactField::FirstName,
            Self::LastName(_) => ContactField::LastName,
            Self::Address(_) => ContactField::Address,
            Self::Phone(_) => ContactField::Phone,
            Self::Age(_) => ContactField::Age,
        }
    }
}
