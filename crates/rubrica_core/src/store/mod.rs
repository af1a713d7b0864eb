//! Persistence contract for contacts and its backends.
//!
//! # Responsibility
//! - Define the five-operation storage contract used by the directory.
//! - Build the configured backend for a caller identity.
//!
//! # Invariants
//! - `save_all` is a full reconciliation: every given contact is upserted and
//!   every previously stored contact missing from the list is deleted.
//! - `modify` receives the phone the contact had before the edit, so backends
//!   keyed by phone can locate the old representation.
//! - Backends report storage problems as `ContactError::BackendFailure`
//!   unless a typed kind applies (`InvalidSession`, `DuplicateIdentifier`).

pub mod dbms_store;
pub mod fs_store;
pub mod line_codec;
pub mod session;

use crate::config::{BackendKind, LoadedConfig};
use crate::db::procedures::SqliteProcedures;
use crate::error::{ContactError, ContactResult};
use crate::model::contact::Contact;
use dbms_store::DbmsContactStore;
use fs_store::FsContactStore;
use log::info;
use session::SessionStore;
use std::sync::Arc;

/// Storage contract shared by the file and relational backends.
pub trait ContactStore {
    /// Reads every stored contact.
    fn list(&mut self) -> ContactResult<Vec<Contact>>;
    /// Reconciles storage with exactly `contacts`.
    fn save_all(&mut self, contacts: &[Contact]) -> ContactResult<()>;
    /// Inserts or replaces one contact.
    fn save_one(&mut self, contact: &Contact) -> ContactResult<()>;
    /// Deletes one contact by phone.
    fn remove(&mut self, contact: &Contact) -> ContactResult<()>;
    /// Stores an edited contact previously stored under `old_phone`.
    fn modify(&mut self, contact: &Contact, old_phone: &str) -> ContactResult<()>;
}

impl<S: ContactStore + ?Sized> ContactStore for Box<S> {
    fn list(&mut self) -> ContactResult<Vec<Contact>> {
        (**self).list()
    }

    fn save_all(&mut self, contacts: &[Contact]) -> ContactResult<()> {
        (**self).save_all(contacts)
    }

    fn save_one(&mut self, contact: &Contact) -> ContactResult<()> {
        (**self).save_one(contact)
    }

    fn remove(&mut self, contact: &Contact) -> ContactResult<()> {
        (**self).remove(contact)
    }

    fn modify(&mut self, contact: &Contact, old_phone: &str) -> ContactResult<()> {
        (**self).modify(contact, old_phone)
    }
}

/// Backend chosen at runtime from configuration.
pub type BoxedContactStore = Box<dyn ContactStore + Send>;

/// Trims the caller identity; blank means single-user mode.
pub fn normalize_identity(identity: Option<&str>) -> Option<String> {
    identity
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Opens the SQLite procedures named by the `dbms` section of `config`.
///
/// # Errors
/// - `BackendFailure` when `dbms.url` is missing or the database cannot be
///   opened.
pub fn open_procedures(config: &LoadedConfig) -> ContactResult<SqliteProcedures> {
    let procedures = match config.dbms_path()? {
        Some(path) => SqliteProcedures::open(path)?,
        None => SqliteProcedures::open_in_memory()?,
    };
    Ok(procedures)
}

/// Builds the backend named by `config` for `identity`.
///
/// # Errors
/// - `InvalidSession` when the relational backend is selected without an
///   identity.
/// - `BackendFailure` when relational settings are missing or the database
///   cannot be opened.
pub fn open_store(
    config: &LoadedConfig,
    identity: Option<&str>,
    sessions: Arc<dyn SessionStore>,
) -> ContactResult<BoxedContactStore> {
    let identity = normalize_identity(identity);
    match config.backend() {
        BackendKind::Fs => {
            let root = config.fs_root();
            info!(
                "event=store_open module=store status=ok backend=fs scoped={}",
                identity.is_some()
            );
            Ok(Box::new(FsContactStore::new(root, identity.as_deref())))
        }
        BackendKind::Dbms => {
            let identity = identity.ok_or_else(|| {
                ContactError::InvalidSession(
                    "the relational backend requires a logged-in user".to_string(),
                )
            })?;
            let procedures = open_procedures(config)?;
            info!("event=store_open module=store status=ok backend=dbms");
            Ok(Box::new(DbmsContactStore::new(procedures, sessions, identity)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_identity;

    #[test]
    fn normalize_identity_trims_and_drops_blank() {
        assert_eq!(normalize_identity(Some("  mario ")), Some("mario".to_string()));
        assert_eq!(normalize_identity(Some("   ")), None);
        assert_eq!(normalize_identity(None), None);
    }
}
