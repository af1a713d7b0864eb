//! SQLite storage bootstrap for the relational contact backend.
//!
//! # Responsibility
//! - Open and configure SQLite connections.
//! - Create the contact schema when it is missing.
//! - Host the SQLite rendition of the contact stored procedures.
//!
//! # Invariants
//! - Procedures only run on connections returned by `open_db` or
//!   `open_db_in_memory`.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;
pub mod procedures;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "contact database error: {err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
