//! Contact domain model.
//!
//! # Responsibility
//! - Define the contact value and the in-memory collection that owns it.
//!
//! # Invariants
//! - Contacts are identified by phone number only.
//! - A `ContactSet` never holds two contacts with the same phone number.

pub mod contact;
pub mod contact_set;
