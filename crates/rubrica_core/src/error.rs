//! Error taxonomy shared by the directory service and storage backends.
//!
//! # Invariants
//! - Validation failures are returned to the caller, never swallowed.
//! - Backend I/O and driver failures are wrapped in `BackendFailure`; only
//!   session and uniqueness conditions are surfaced as their own kinds.
//! - Messages name the offending field or value where one exists.

use crate::config::ConfigError;
use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type ContactResult<T> = Result<T, ContactError>;

/// Failure kinds raised by contact operations.
#[derive(Debug)]
pub enum ContactError {
    /// Structurally wrong input: negative or non-numeric age, unknown field,
    /// malformed delimited line, names outside the allowed alphabet.
    InvalidEntry(String),
    /// A required text field is empty.
    EmptyField,
    /// Phone number does not match the accepted format.
    InvalidPhone(String),
    /// Reserved for address rules; no validator raises it today.
    InvalidAddress(String),
    /// Another contact already owns this phone number.
    DuplicateIdentifier {
        phone: String,
        /// `true` when raised by a phone edit rather than an insert.
        blocked_modification: bool,
    },
    /// No contact owns this phone number.
    NotFound(String),
    /// Relational backend: missing, invalid or expired session.
    InvalidSession(String),
    /// Unrecoverable storage failure.
    BackendFailure(BackendError),
}

impl Display for ContactError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEntry(details) => write!(f, "invalid entry: {details}"),
            Self::EmptyField => write!(f, "fields cannot be empty"),
            Self::InvalidPhone(phone) => write!(f, "invalid phone number: `{phone}`"),
            Self::InvalidAddress(address) => write!(f, "invalid address: `{address}`"),
            Self::DuplicateIdentifier {
                phone,
                blocked_modification: false,
            } => write!(f, "another contact already has phone number `{phone}`"),
            Self::DuplicateIdentifier {
                phone,
                blocked_modification: true,
            } => write!(
                f,
                "modification blocked: phone number `{phone}` belongs to another contact \
                 (cannot take over another person's identity)"
            ),
            Self::NotFound(phone) => write!(f, "no contact with phone number `{phone}`"),
            Self::InvalidSession(details) => write!(f, "invalid session: {details}"),
            Self::BackendFailure(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl Error for ContactError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::BackendFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BackendError> for ContactError {
    fn from(value: BackendError) -> Self {
        Self::BackendFailure(value)
    }
}

impl From<DbError> for ContactError {
    fn from(value: DbError) -> Self {
        Self::BackendFailure(BackendError::Db(value))
    }
}

impl From<ConfigError> for ContactError {
    fn from(value: ConfigError) -> Self {
        Self::BackendFailure(BackendError::Config(value))
    }
}

/// Underlying cause of a `ContactError::BackendFailure`.
#[derive(Debug)]
pub enum BackendError {
    /// File system failure on a concrete path.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// SQLite bootstrap or driver failure.
    Db(DbError),
    /// A stored-procedure call reported a condition with no typed mapping.
    Procedure {
        procedure: &'static str,
        sql_state: String,
        message: String,
    },
    /// Backend could not be built from configuration.
    Config(ConfigError),
}

impl BackendError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "I/O error on `{}`: {source}", path.display()),
            Self::Db(err) => write!(f, "{err}"),
            Self::Procedure {
                procedure,
                sql_state,
                message,
            } => write!(f, "{procedure} failed (SQLSTATE {sql_state}): {message}"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Db(err) => Some(err),
            Self::Procedure { .. } => None,
            Self::Config(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendError, ContactError};
    use std::error::Error;

    #[test]
    fn duplicate_messages_name_the_phone() {
        let insert = ContactError::DuplicateIdentifier {
            phone: "+391".to_string(),
            blocked_modification: false,
        };
        let modify = ContactError::DuplicateIdentifier {
            phone: "+392".to_string(),
            blocked_modification: true,
        };

        assert!(insert.to_string().contains("+391"));
        assert!(modify.to_string().contains("+392"));
        assert!(modify.to_string().contains("another person's identity"));
    }

    #[test]
    fn backend_failure_exposes_io_source() {
        let err = ContactError::from(BackendError::io(
            "/tmp/contacts.txt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        ));

        let backend = err.source().expect("backend failure should have a source");
        assert!(backend.source().is_some());
        assert!(err.to_string().contains("/tmp/contacts.txt"));
    }
}
