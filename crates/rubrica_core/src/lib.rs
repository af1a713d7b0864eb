//! Core domain logic for the Rubrica contact directory.
//! This crate owns validation, uniqueness and persistence of contacts.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use config::{BackendKind, ConfigError, DirectoryConfig, LoadedConfig};
pub use error::{BackendError, ContactError, ContactResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::contact::{Contact, ContactField, FieldUpdate};
pub use model::contact_set::ContactSet;
pub use service::directory::{open_directory, ContactDirectory};
pub use store::session::{InMemorySessionStore, SessionStore};
pub use store::{open_procedures, open_store, BoxedContactStore, ContactStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
