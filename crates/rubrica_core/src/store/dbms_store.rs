//! Relational contact backend driven through stored-procedure calls.
//!
//! # Responsibility
//! - Issue exactly one procedure call per storage operation, each carrying
//!   the caller's session token.
//! - Translate procedure conditions into the contact error taxonomy.
//!
//! # Invariants
//! - A missing token is `InvalidSession` and no call is issued.
//! - SQLSTATE `45010` maps to `InvalidSession`, `23000` to
//!   `DuplicateIdentifier`; anything else is an opaque `BackendFailure`
//!   carrying the original diagnostic.
//! - `save_all` is not atomic: a failure midway leaves rows partly
//!   reconciled.

use crate::error::{BackendError, ContactError, ContactResult};
use crate::model::contact::Contact;
use crate::store::session::SessionStore;
use crate::store::ContactStore;
use log::{debug, error};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub const SP_GET_RUBRICA: &str = "sp_get_rubrica";
pub const SP_INSERISCI_PERSONA: &str = "sp_inserisci_persona";
pub const SP_MODIFICA_PERSONA: &str = "sp_modifica_persona";
pub const SP_ELIMINA_PERSONA: &str = "sp_elimina_persona";

/// Session missing, invalid or expired.
pub const SQLSTATE_SESSION_INVALID: &str = "45010";
/// `sp_modifica_persona` found no row for the old phone.
pub const SQLSTATE_ENTRY_NOT_FOUND: &str = "45011";
/// Uniqueness constraint violated.
pub const SQLSTATE_UNIQUE_VIOLATION: &str = "23000";
/// Any other driver failure.
pub const SQLSTATE_GENERAL_ERROR: &str = "HY000";

/// Condition reported by a procedure call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureError {
    pub sql_state: String,
    pub message: String,
}

impl ProcedureError {
    pub fn new(sql_state: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sql_state: sql_state.into(),
            message: message.into(),
        }
    }
}

impl Display for ProcedureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SQLSTATE {}: {}", self.sql_state, self.message)
    }
}

impl Error for ProcedureError {}

pub type ProcedureResult<T> = Result<T, ProcedureError>;

/// The four contact procedures, one method per call shape.
pub trait ProcedureClient {
    /// `sp_get_rubrica(token)`
    fn get_rubrica(&mut self, token: &str) -> ProcedureResult<Vec<Contact>>;

    /// `sp_inserisci_persona(token, first_name, last_name, address, phone, age)`
    fn inserisci_persona(&mut self, token: &str, contact: &Contact) -> ProcedureResult<()>;

    /// `sp_modifica_persona(token, old_phone, new_phone, first_name, last_name, address, age)`
    fn modifica_persona(
        &mut self,
        token: &str,
        old_phone: &str,
        contact: &Contact,
    ) -> ProcedureResult<()>;

    /// `sp_elimina_persona(token, phone)`
    fn elimina_persona(&mut self, token: &str, phone: &str) -> ProcedureResult<()>;
}

pub struct DbmsContactStore<P: ProcedureClient> {
    client: P,
    sessions: Arc<dyn SessionStore>,
    identity: String,
}

impl<P: ProcedureClient> DbmsContactStore<P> {
    pub fn new(client: P, sessions: Arc<dyn SessionStore>, identity: impl Into<String>) -> Self {
        Self {
            client,
            sessions,
            identity: identity.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn client(&self) -> &P {
        &self.client
    }

    fn token(&self) -> ContactResult<String> {
        self.sessions.token_for(&self.identity).ok_or_else(|| {
            ContactError::InvalidSession(format!(
                "no active session for user `{}`; log in again",
                self.identity
            ))
        })
    }
}

impl<P: ProcedureClient> ContactStore for DbmsContactStore<P> {
    fn list(&mut self) -> ContactResult<Vec<Contact>> {
        let token = self.token()?;
        let contacts = self
            .client
            .get_rubrica(&token)
            .map_err(|err| translate(SP_GET_RUBRICA, err, None))?;
        debug!(
            "event=dbms_list module=store status=ok count={}",
            contacts.len()
        );
        Ok(contacts)
    }

    fn save_all(&mut self, contacts: &[Contact]) -> ContactResult<()> {
        let current = self.list()?;
        for contact in contacts {
            self.save_one(contact)?;
        }

        let kept: HashSet<&str> = contacts.iter().map(|c| c.phone.as_str()).collect();
        for stale in current
            .iter()
            .filter(|contact| !kept.contains(contact.phone.as_str()))
        {
            self.remove(stale)?;
        }
        debug!(
            "event=dbms_save_all module=store status=ok count={}",
            contacts.len()
        );
        Ok(())
    }

    fn save_one(&mut self, contact: &Contact) -> ContactResult<()> {
        let token = self.token()?;
        self.client
            .inserisci_persona(&token, contact)
            .map_err(|err| {
                translate(
                    SP_INSERISCI_PERSONA,
                    err,
                    Some((contact.phone.as_str(), false)),
                )
            })
    }

    fn remove(&mut self, contact: &Contact) -> ContactResult<()> {
        let token = self.token()?;
        self.client
            .elimina_persona(&token, &contact.phone)
            .map_err(|err| translate(SP_ELIMINA_PERSONA, err, None))
    }

    fn modify(&mut self, contact: &Contact, old_phone: &str) -> ContactResult<()> {
        let token = self.token()?;
        self.client
            .modifica_persona(&token, old_phone, contact)
            .map_err(|err| {
                translate(
                    SP_MODIFICA_PERSONA,
                    err,
                    Some((contact.phone.as_str(), true)),
                )
            })
    }
}

/// Maps a procedure condition to the contact taxonomy.
///
/// `phone` names the identifier a uniqueness violation refers to, and whether
/// it was raised by an edit.
fn translate(
    procedure: &'static str,
    err: ProcedureError,
    phone: Option<(&str, bool)>,
) -> ContactError {
    if err.sql_state == SQLSTATE_SESSION_INVALID {
        return ContactError::InvalidSession(format!(
            "session invalid or expired; log in again ({})",
            err.message
        ));
    }
    if err.sql_state == SQLSTATE_UNIQUE_VIOLATION {
        if let Some((phone, blocked_modification)) = phone {
            return ContactError::DuplicateIdentifier {
                phone: phone.to_string(),
                blocked_modification,
            };
        }
    }

    error!(
        "event=dbms_call module=store status=error procedure={procedure} sql_state={}",
        err.sql_state
    );
    ContactError::BackendFailure(BackendError::Procedure {
        procedure,
        sql_state: err.sql_state,
        message: err.message,
    })
}
