//! In-memory contact collection.
//!
//! # Invariants
//! - No two stored contacts share a phone number.
//! - Insertion order is preserved; sorting is a read-side concern.

use crate::error::{ContactError, ContactResult};
use crate::model::contact::Contact;

/// Ordered contact collection with phone-number uniqueness.
#[derive(Debug, Clone, Default)]
pub struct ContactSet {
    contacts: Vec<Contact>,
}

impl ContactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from a hydrated list, keeping the first contact seen for
    /// each phone number.
    ///
    /// Returns the set and the number of discarded duplicates.
    pub fn from_contacts(contacts: Vec<Contact>) -> (Self, usize) {
        let mut set = Self::new();
        let mut discarded = 0;
        for contact in contacts {
            if set.add(contact).is_err() {
                discarded += 1;
            }
        }
        (set, discarded)
    }

    /// Appends a contact unless its phone number is already present.
    pub fn add(&mut self, contact: Contact) -> ContactResult<()> {
        if self.contains(&contact) {
            return Err(ContactError::DuplicateIdentifier {
                phone: contact.phone,
                blocked_modification: false,
            });
        }
        self.contacts.push(contact);
        Ok(())
    }

    /// Identity-based membership test.
    pub fn contains(&self, contact: &Contact) -> bool {
        self.contains_phone(&contact.phone)
    }

    pub fn contains_phone(&self, phone: &str) -> bool {
        self.position(phone).is_some()
    }

    pub fn position(&self, phone: &str) -> Option<usize> {
        self.contacts.iter().position(|contact| contact.phone == phone)
    }

    pub fn get(&self, phone: &str) -> Option<&Contact> {
        self.contacts.iter().find(|contact| contact.phone == phone)
    }

    pub fn get_mut(&mut self, phone: &str) -> Option<&mut Contact> {
        self.contacts
            .iter_mut()
            .find(|contact| contact.phone == phone)
    }

    pub fn remove(&mut self, phone: &str) -> Option<Contact> {
        self.position(phone)
            .map(|index| self.contacts.remove(index))
    }

    /// Live backing sequence. Callers outside the directory receive copies.
    pub fn as_slice(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}
