//! SQLite rendition of the contact stored procedures.
//!
//! # Responsibility
//! - Implement the four contact call shapes on top of the `contacts` table.
//! - Issue and check session tokens stored in the `sessions` table.
//!
//! # Invariants
//! - Every procedure runs in its own transaction and validates the token
//!   first; an unknown or expired token yields SQLSTATE `45010`.
//! - Rows are always scoped to the username bound to the token.
//! - `sp_inserisci_persona` upserts by `(owner, phone)`.

use super::{open_db, open_db_in_memory, DbResult};
use crate::model::contact::Contact;
use crate::store::dbms_store::{
    ProcedureClient, ProcedureError, ProcedureResult, SQLSTATE_ENTRY_NOT_FOUND,
    SQLSTATE_GENERAL_ERROR, SQLSTATE_SESSION_INVALID, SQLSTATE_UNIQUE_VIOLATION,
};
use log::info;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Contact procedures backed by one migrated SQLite connection.
pub struct SqliteProcedures {
    conn: Connection,
}

impl SqliteProcedures {
    /// Wraps a connection opened by `open_db` or `open_db_in_memory`.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        open_db(path).map(Self::new)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        open_db_in_memory().map(Self::new)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Issues a new token for `username`, valid for `ttl`.
    ///
    /// Expired sessions of every user are purged first.
    pub fn open_session(&self, username: &str, ttl: Duration) -> ProcedureResult<String> {
        let now = now_epoch_ms();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let token = Uuid::new_v4().to_string();

        self.conn
            .execute("DELETE FROM sessions WHERE expires_at <= ?1;", [now])
            .map_err(sql_failure)?;
        self.conn
            .execute(
                "INSERT INTO sessions (token, username, expires_at) VALUES (?1, ?2, ?3);",
                params![token, username, now.saturating_add(ttl_ms)],
            )
            .map_err(sql_failure)?;

        info!("event=session_open module=db status=ok ttl_secs={}", ttl.as_secs());
        Ok(token)
    }

    /// Ends a session. Returns whether the token existed.
    pub fn revoke_session(&self, token: &str) -> ProcedureResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1;", [token])
            .map_err(sql_failure)?;
        Ok(changed > 0)
    }

    fn begin(&mut self) -> ProcedureResult<Transaction<'_>> {
        self.conn.transaction().map_err(sql_failure)
    }
}

impl ProcedureClient for SqliteProcedures {
    fn get_rubrica(&mut self, token: &str) -> ProcedureResult<Vec<Contact>> {
        let tx = self.begin()?;
        let owner = authorize(&tx, token)?;

        let contacts = {
            let mut stmt = tx
                .prepare(
                    "SELECT first_name, last_name, address, phone, age
                     FROM contacts
                     WHERE owner = ?1
                     ORDER BY rowid ASC;",
                )
                .map_err(sql_failure)?;
            let rows = stmt
                .query_map([owner.as_str()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                })
                .map_err(sql_failure)?;

            let mut contacts = Vec::new();
            for row in rows {
                let (first_name, last_name, address, phone, age) = row.map_err(sql_failure)?;
                let age = u32::try_from(age).map_err(|_| {
                    ProcedureError::new(
                        SQLSTATE_GENERAL_ERROR,
                        format!("invalid age `{age}` in contacts.age"),
                    )
                })?;
                contacts.push(Contact::new(first_name, last_name, address, phone, age));
            }
            contacts
        };

        tx.commit().map_err(sql_failure)?;
        Ok(contacts)
    }

    fn inserisci_persona(&mut self, token: &str, contact: &Contact) -> ProcedureResult<()> {
        let tx = self.begin()?;
        let owner = authorize(&tx, token)?;

        tx.execute(
            "INSERT INTO contacts (owner, phone, first_name, last_name, address, age)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (owner, phone) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                address = excluded.address,
                age = excluded.age,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                owner,
                contact.phone,
                contact.first_name,
                contact.last_name,
                contact.address,
                i64::from(contact.age),
            ],
        )
        .map_err(sql_failure)?;

        tx.commit().map_err(sql_failure)
    }

    fn modifica_persona(
        &mut self,
        token: &str,
        old_phone: &str,
        contact: &Contact,
    ) -> ProcedureResult<()> {
        let tx = self.begin()?;
        let owner = authorize(&tx, token)?;

        let changed = tx
            .execute(
                "UPDATE contacts
                 SET
                    phone = ?1,
                    first_name = ?2,
                    last_name = ?3,
                    address = ?4,
                    age = ?5,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE owner = ?6 AND phone = ?7;",
                params![
                    contact.phone,
                    contact.first_name,
                    contact.last_name,
                    contact.address,
                    i64::from(contact.age),
                    owner,
                    old_phone,
                ],
            )
            .map_err(sql_failure)?;

        if changed == 0 {
            return Err(ProcedureError::new(
                SQLSTATE_ENTRY_NOT_FOUND,
                format!("no entry with phone `{old_phone}` in this directory"),
            ));
        }

        tx.commit().map_err(sql_failure)
    }

    fn elimina_persona(&mut self, token: &str, phone: &str) -> ProcedureResult<()> {
        let tx = self.begin()?;
        let owner = authorize(&tx, token)?;

        tx.execute(
            "DELETE FROM contacts WHERE owner = ?1 AND phone = ?2;",
            params![owner, phone],
        )
        .map_err(sql_failure)?;

        tx.commit().map_err(sql_failure)
    }
}

/// Resolves the username bound to a live token.
fn authorize(tx: &Transaction<'_>, token: &str) -> ProcedureResult<String> {
    let owner = tx
        .query_row(
            "SELECT username FROM sessions WHERE token = ?1 AND expires_at > ?2;",
            params![token, now_epoch_ms()],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(sql_failure)?;

    owner.ok_or_else(|| {
        ProcedureError::new(SQLSTATE_SESSION_INVALID, "session invalid or expired")
    })
}

fn sql_failure(err: rusqlite::Error) -> ProcedureError {
    let sql_state = match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                ) =>
        {
            SQLSTATE_UNIQUE_VIOLATION
        }
        _ => SQLSTATE_GENERAL_ERROR,
    };
    ProcedureError::new(sql_state, err.to_string())
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::SqliteProcedures;
    use crate::model::contact::Contact;
    use crate::store::dbms_store::{
        ProcedureClient, SQLSTATE_ENTRY_NOT_FOUND, SQLSTATE_SESSION_INVALID,
        SQLSTATE_UNIQUE_VIOLATION,
    };
    use std::time::Duration;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn rows_are_scoped_to_the_token_owner() {
        let mut procs = SqliteProcedures::open_in_memory().unwrap();
        let mario = procs.open_session("mario", HOUR).unwrap();
        let anna = procs.open_session("anna", HOUR).unwrap();

        procs
            .inserisci_persona(&mario, &Contact::new("Luigi", "Verdi", "Via", "+391", 40))
            .unwrap();

        assert_eq!(procs.get_rubrica(&mario).unwrap().len(), 1);
        assert!(procs.get_rubrica(&anna).unwrap().is_empty());
    }

    #[test]
    fn insert_upserts_existing_phone() {
        let mut procs = SqliteProcedures::open_in_memory().unwrap();
        let token = procs.open_session("mario", HOUR).unwrap();

        procs
            .inserisci_persona(&token, &Contact::new("Luigi", "Verdi", "Via A", "+391", 40))
            .unwrap();
        procs
            .inserisci_persona(&token, &Contact::new("Luigi", "Verdi", "Via B", "+391", 41))
            .unwrap();

        let rows = procs.get_rubrica(&token).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].address, "Via B");
        assert_eq!(rows[0].age, 41);
    }

    #[test]
    fn modify_reports_missing_row_and_phone_collision() {
        let mut procs = SqliteProcedures::open_in_memory().unwrap();
        let token = procs.open_session("mario", HOUR).unwrap();
        procs
            .inserisci_persona(&token, &Contact::new("A", "A", "Via", "+391", 1))
            .unwrap();
        procs
            .inserisci_persona(&token, &Contact::new("B", "B", "Via", "+392", 2))
            .unwrap();

        let missing = procs
            .modifica_persona(&token, "+399", &Contact::new("C", "C", "Via", "+399", 3))
            .unwrap_err();
        assert_eq!(missing.sql_state, SQLSTATE_ENTRY_NOT_FOUND);

        let collision = procs
            .modifica_persona(&token, "+391", &Contact::new("A", "A", "Via", "+392", 1))
            .unwrap_err();
        assert_eq!(collision.sql_state, SQLSTATE_UNIQUE_VIOLATION);
    }

    #[test]
    fn expired_or_revoked_sessions_are_rejected() {
        let mut procs = SqliteProcedures::open_in_memory().unwrap();
        let expired = procs.open_session("mario", Duration::ZERO).unwrap();
        let err = procs.get_rubrica(&expired).unwrap_err();
        assert_eq!(err.sql_state, SQLSTATE_SESSION_INVALID);

        let token = procs.open_session("mario", HOUR).unwrap();
        assert!(procs.revoke_session(&token).unwrap());
        let err = procs.elimina_persona(&token, "+391").unwrap_err();
        assert_eq!(err.sql_state, SQLSTATE_SESSION_INVALID);
    }
}
