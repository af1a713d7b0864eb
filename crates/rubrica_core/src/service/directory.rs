//! Contact directory orchestration.
//!
//! # Responsibility
//! - Validate input, keep the in-memory contact set and write every change
//!   through to the configured store.
//! - Expose sorted snapshots; never hand out the live backing sequence.
//!
//! # Invariants
//! - The set is hydrated exactly once, in the constructor.
//! - Every public operation runs under one per-directory lock covering
//!   validation, set mutation and the store call, so two concurrent inserts
//!   can never both pass the duplicate check.
//! - A failed store write leaves the in-memory change in place; the next
//!   `flush` reconciles the store with the set.

use crate::config::LoadedConfig;
use crate::error::{ContactError, ContactResult};
use crate::model::contact::{Contact, ContactField, FieldUpdate};
use crate::model::contact_set::ContactSet;
use crate::service::validation::{
    check_age, check_name_pair, check_phone, parse_age_column, parse_age_update,
};
use crate::store::line_codec::FIELD_SEPARATOR;
use crate::store::session::SessionStore;
use crate::store::{normalize_identity, open_store, BoxedContactStore, ContactStore};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const DELIMITED_FIELD_COUNT: usize = 5;

struct DirectoryState<S> {
    contacts: ContactSet,
    store: S,
}

/// One caller's contact directory over a storage backend.
pub struct ContactDirectory<S: ContactStore> {
    identity: Option<String>,
    state: Mutex<DirectoryState<S>>,
}

impl<S: ContactStore> ContactDirectory<S> {
    /// Hydrates a directory from `store`.
    ///
    /// Stored rows sharing a phone with an earlier row are dropped with a
    /// warning; the first occurrence wins.
    ///
    /// # Errors
    /// - Whatever `store.list()` reports.
    pub fn new(mut store: S, identity: Option<&str>) -> ContactResult<Self> {
        let stored = store.list()?;
        let (contacts, discarded) = ContactSet::from_contacts(stored);
        if discarded > 0 {
            warn!(
                "event=directory_hydrate module=directory status=partial discarded={discarded}"
            );
        }
        info!(
            "event=directory_hydrate module=directory status=ok count={}",
            contacts.len()
        );

        Ok(Self {
            identity: normalize_identity(identity),
            state: Mutex::new(DirectoryState { contacts, store }),
        })
    }

    /// Caller identity bound to this directory, if any.
    pub fn current_user(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Validates and inserts a new contact, then persists it.
    ///
    /// # Errors
    /// - `InvalidEntry` for a negative age or names outside the name alphabet.
    /// - `EmptyField` when any text field is empty.
    /// - `InvalidPhone` when the phone is malformed.
    /// - `DuplicateIdentifier` when the phone is already taken.
    /// - Store failures after the set has accepted the contact.
    pub fn insert(
        &self,
        first_name: &str,
        last_name: &str,
        address: &str,
        phone: &str,
        age: i64,
    ) -> ContactResult<()> {
        let mut state = self.lock();
        let result = insert_locked(&mut state, first_name, last_name, address, phone, age);
        log_outcome("contact_insert", &result);
        result
    }

    /// Inserts from a `first;last;address;phone;age` line.
    ///
    /// Trailing empty segments are ignored before the field count check.
    /// Fields are passed on untrimmed.
    pub fn insert_delimited(&self, line: &str) -> ContactResult<()> {
        let (fields, age) = match split_delimited(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(
                    "event=contact_import module=directory status=rejected kind={}",
                    error_kind(&err)
                );
                return Err(err);
            }
        };
        self.insert(fields[0], fields[1], fields[2], fields[3], age)
    }

    /// Changes one field of the contact owning `phone` and persists it.
    ///
    /// Returns the updated contact.
    ///
    /// # Errors
    /// - `InvalidEntry` for an empty value, an unknown field name, a bad age
    ///   or an invalid resulting name pair.
    /// - `NotFound` when no contact owns `phone`.
    /// - `InvalidPhone` / `DuplicateIdentifier` for a bad or taken new phone.
    pub fn modify(&self, phone: &str, field: &str, value: &str) -> ContactResult<Contact> {
        let mut state = self.lock();
        let result = modify_locked(&mut state, phone, field, value);
        log_outcome("contact_modify", &result);
        result
    }

    /// Sorted snapshot of every contact, ordered by first then last name.
    pub fn list(&self) -> Vec<Contact> {
        let state = self.lock();
        let mut snapshot = state.contacts.as_slice().to_vec();
        snapshot.sort_by(Contact::cmp_by_name);
        snapshot
    }

    /// Copy of the contact owning `phone`.
    pub fn get(&self, phone: &str) -> Option<Contact> {
        self.lock().contacts.get(phone).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().contacts.is_empty()
    }

    /// Deletes the contact owning `phone` from the store, then from the set.
    ///
    /// # Errors
    /// - `NotFound` when no contact owns `phone`; the store is not called.
    /// - Store failures, in which case the set is left unchanged.
    pub fn remove(&self, phone: &str) -> ContactResult<bool> {
        let mut state = self.lock();
        let result = remove_locked(&mut state, phone);
        log_outcome("contact_remove", &result);
        result
    }

    /// Reconciles the store with the in-memory set. Safe to repeat.
    pub fn flush(&self) -> ContactResult<()> {
        let mut guard = self.lock();
        let DirectoryState { contacts, store } = &mut *guard;
        store.save_all(contacts.as_slice())?;
        info!(
            "event=directory_flush module=directory status=ok count={}",
            contacts.len()
        );
        Ok(())
    }

    /// Flushes and releases the directory.
    pub fn close(self) -> ContactResult<()> {
        self.flush()
    }

    fn lock(&self) -> MutexGuard<'_, DirectoryState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builds the configured backend for `identity` and hydrates a directory.
pub fn open_directory(
    config: &LoadedConfig,
    identity: Option<&str>,
    sessions: Arc<dyn SessionStore>,
) -> ContactResult<ContactDirectory<BoxedContactStore>> {
    let store = open_store(config, identity, sessions)?;
    ContactDirectory::new(store, identity)
}

fn split_delimited(line: &str) -> ContactResult<([&str; 4], i64)> {
    let mut fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    while fields.last().is_some_and(|field| field.is_empty()) {
        fields.pop();
    }
    match fields.as_slice() {
        [first_name, last_name, address, phone, age] => Ok((
            [*first_name, *last_name, *address, *phone],
            parse_age_column(age)?,
        )),
        _ => Err(ContactError::InvalidEntry(format!(
            "expected {DELIMITED_FIELD_COUNT} `{FIELD_SEPARATOR}`-separated fields, got {}",
            fields.len()
        ))),
    }
}

fn insert_locked<S: ContactStore>(
    state: &mut DirectoryState<S>,
    first_name: &str,
    last_name: &str,
    address: &str,
    phone: &str,
    age: i64,
) -> ContactResult<()> {
    let age = check_age(age)?;
    if [first_name, last_name, address, phone]
        .iter()
        .any(|field| field.is_empty())
    {
        return Err(ContactError::EmptyField);
    }
    check_name_pair(first_name, last_name)?;
    check_phone(phone)?;

    let contact = Contact::new(first_name, last_name, address, phone, age);
    state.contacts.add(contact.clone())?;
    state.store.save_one(&contact)
}

fn modify_locked<S: ContactStore>(
    state: &mut DirectoryState<S>,
    phone: &str,
    field: &str,
    value: &str,
) -> ContactResult<Contact> {
    if value.is_empty() {
        return Err(ContactError::InvalidEntry(
            "the new value cannot be empty".to_string(),
        ));
    }
    let current = state
        .contacts
        .get(phone)
        .cloned()
        .ok_or_else(|| ContactError::NotFound(phone.to_string()))?;
    let field = ContactField::parse(field).ok_or_else(|| {
        ContactError::InvalidEntry(format!(
            "unknown field `{field}`; expected one of first_name, last_name, address, phone, age"
        ))
    })?;

    let update = match field {
        ContactField::Age => FieldUpdate::Age(parse_age_update(value)?),
        ContactField::Phone => {
            check_phone(value)?;
            if value != current.phone && state.contacts.contains_phone(value) {
                return Err(ContactError::DuplicateIdentifier {
                    phone: value.to_string(),
                    blocked_modification: true,
                });
            }
            FieldUpdate::Phone(value.to_string())
        }
        ContactField::FirstName => {
            check_name_pair(value, &current.last_name)?;
            FieldUpdate::FirstName(value.to_string())
        }
        ContactField::LastName => {
            check_name_pair(&current.first_name, value)?;
            FieldUpdate::LastName(value.to_string())
        }
        ContactField::Address => FieldUpdate::Address(value.to_string()),
    };

    let updated = match state.contacts.get_mut(phone) {
        Some(contact) => {
            contact.apply(update);
            contact.clone()
        }
        None => return Err(ContactError::NotFound(phone.to_string())),
    };
    state.store.modify(&updated, phone)?;
    Ok(updated)
}

fn remove_locked<S: ContactStore>(
    state: &mut DirectoryState<S>,
    phone: &str,
) -> ContactResult<bool> {
    let contact = state
        .contacts
        .get(phone)
        .cloned()
        .ok_or_else(|| ContactError::NotFound(phone.to_string()))?;
    state.store.remove(&contact)?;
    Ok(state.contacts.remove(phone).is_some())
}

fn log_outcome<T>(event: &str, result: &ContactResult<T>) {
    match result {
        Ok(_) => debug!("event={event} module=directory status=ok"),
        Err(ContactError::BackendFailure(_)) => {
            warn!("event={event} module=directory status=error kind=backend")
        }
        Err(err) => debug!(
            "event={event} module=directory status=rejected kind={}",
            error_kind(err)
        ),
    }
}

fn error_kind(err: &ContactError) -> &'static str {
    match err {
        ContactError::InvalidEntry(_) => "invalid_entry",
        ContactError::EmptyField => "empty_field",
        ContactError::InvalidPhone(_) => "invalid_phone",
        ContactError::InvalidAddress(_) => "invalid_address",
        ContactError::DuplicateIdentifier { .. } => "duplicate",
        ContactError::NotFound(_) => "not_found",
        ContactError::InvalidSession(_) => "invalid_session",
        ContactError::BackendFailure(_) => "backend",
    }
}

#[cfg(test)]
mod tests {
    use super::ContactDirectory;
    use crate::error::{ContactError, ContactResult};
    use crate::model::contact::Contact;
    use crate::store::ContactStore;

    #[derive(Default)]
    struct MemoryStore {
        rows: Vec<Contact>,
    }

    impl ContactStore for MemoryStore {
        fn list(&mut self) -> ContactResult<Vec<Contact>> {
            Ok(self.rows.clone())
        }

        fn save_all(&mut self, contacts: &[Contact]) -> ContactResult<()> {
            self.rows = contacts.to_vec();
            Ok(())
        }

        fn save_one(&mut self, contact: &Contact) -> ContactResult<()> {
            self.rows.retain(|row| row.phone != contact.phone);
            self.rows.push(contact.clone());
            Ok(())
        }

        fn remove(&mut self, contact: &Contact) -> ContactResult<()> {
            self.rows.retain(|row| row.phone != contact.phone);
            Ok(())
        }

        fn modify(&mut self, contact: &Contact, old_phone: &str) -> ContactResult<()> {
            self.rows.retain(|row| row.phone != old_phone);
            self.rows.push(contact.clone());
            Ok(())
        }
    }

    fn directory() -> ContactDirectory<MemoryStore> {
        ContactDirectory::new(MemoryStore::default(), None).unwrap()
    }

    #[test]
    fn hydration_keeps_first_of_duplicate_phones() {
        let store = MemoryStore {
            rows: vec![
                Contact::new("Mario", "Rossi", "Via A", "+391", 30),
                Contact::new("Luigi", "Verdi", "Via B", "+391", 40),
            ],
        };
        let dir = ContactDirectory::new(store, Some("  mario  ")).unwrap();
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.get("+391").unwrap().first_name, "Mario");
        assert_eq!(dir.current_user(), Some("mario"));
    }

    #[test]
    fn insert_checks_run_in_order() {
        let dir = directory();
        assert!(matches!(
            dir.insert("", "", "", "abc", -1),
            Err(ContactError::InvalidEntry(_))
        ));
        assert!(matches!(
            dir.insert("Mario", "", "Via", "abc", 1),
            Err(ContactError::EmptyField)
        ));
        assert!(matches!(
            dir.insert("Mar1o", "Rossi", "Via", "abc", 1),
            Err(ContactError::InvalidEntry(_))
        ));
        assert!(matches!(
            dir.insert("Mario", "Rossi", "Via", "abc", 1),
            Err(ContactError::InvalidPhone(_))
        ));
        assert!(dir.is_empty());
    }

    #[test]
    fn delimited_insert_counts_fields_and_parses_age() {
        let dir = directory();
        assert!(matches!(
            dir.insert_delimited("Mario;Rossi;Via Roma"),
            Err(ContactError::InvalidEntry(_))
        ));
        let err = dir.insert_delimited("Mario;Rossi;Via Roma;+391;trenta").unwrap_err();
        assert!(err.to_string().contains("age"));

        dir.insert_delimited("Mario;Rossi;Via Roma;+391;30;;").unwrap();
        assert_eq!(dir.get("+391").unwrap().age, 30);
    }

    #[test]
    fn modify_rejects_empty_value_before_lookup() {
        let dir = directory();
        assert!(matches!(
            dir.modify("+399", "address", ""),
            Err(ContactError::InvalidEntry(_))
        ));
        assert!(matches!(
            dir.modify("+399", "address", "Via"),
            Err(ContactError::NotFound(ref phone)) if phone == "+399"
        ));
    }

    #[test]
    fn modify_validates_per_field() {
        let dir = directory();
        dir.insert("Mario", "Rossi", "Via A", "+391", 30).unwrap();

        let err = dir.modify("+391", "nickname", "Super").unwrap_err();
        assert!(err.to_string().contains("nickname"));
        assert!(matches!(
            dir.modify("+391", "age", "-2"),
            Err(ContactError::InvalidEntry(_))
        ));
        assert!(matches!(
            dir.modify("+391", "phone", "12a"),
            Err(ContactError::InvalidPhone(_))
        ));
        assert!(matches!(
            dir.modify("+391", "last_name", "R0ssi"),
            Err(ContactError::InvalidEntry(_))
        ));

        let updated = dir.modify("+391", "eta", "31").unwrap();
        assert_eq!(updated.age, 31);
        let updated = dir.modify("+391", "phone", "+391").unwrap();
        assert_eq!(updated.phone, "+391");
    }

    #[test]
    fn remove_absent_phone_is_not_found() {
        let dir = directory();
        assert!(matches!(
            dir.remove("+391"),
            Err(ContactError::NotFound(_))
        ));
    }
}
