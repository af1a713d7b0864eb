//! File-system contact backend.
//!
//! # Responsibility
//! - Scoped mode (caller identity present): one directory per identity under
//!   the base directory, one `first-last-phone.txt` file per contact.
//! - Flat mode (no identity): one `contacts.txt` file in the base directory,
//!   one record line per contact.
//!
//! # Invariants
//! - The in-memory cache is read from disk once, on first access, and every
//!   mutating call keeps it in step with the files it writes.
//! - In scoped mode every `save_all` and `modify` ends with an orphan cleanup:
//!   record files that do not belong to a cached contact are deleted.
//! - Reserved file names are never read as contacts nor cleaned up.
//! - A scoped directory is always a direct child of the base directory,
//!   whatever the identity.
//! - Whole files are replaced through a temporary sibling and a rename.

use crate::error::{BackendError, ContactError, ContactResult};
use crate::model::contact::Contact;
use crate::store::line_codec::{
    decode_line, encode_line, name_file_prefix, phone_file_suffix, record_file_name,
    sanitize_for_path, LINE_SEPARATOR, RECORD_FILE_EXTENSION,
};
use crate::store::ContactStore;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Flat-mode record file, also skipped inside scoped directories.
pub const FLAT_FILE_NAME: &str = "contacts.txt";
/// Credential file the login collaborator keeps in a user's directory.
pub const CREDENTIALS_FILE_NAME: &str = "info.txt";

const TEMP_SUFFIX: &str = ".tmp";

/// Storage layout selected by the presence of a caller identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsLayout {
    Scoped,
    Flat,
}

pub struct FsContactStore {
    base_dir: PathBuf,
    identity: Option<String>,
    cache: Option<Vec<Contact>>,
}

impl FsContactStore {
    /// Creates a store rooted at `base_dir`. Nothing is read until first use.
    pub fn new(base_dir: impl Into<PathBuf>, identity: Option<&str>) -> Self {
        Self {
            base_dir: base_dir.into(),
            identity: super::normalize_identity(identity),
            cache: None,
        }
    }

    pub fn layout(&self) -> FsLayout {
        if self.identity.is_some() {
            FsLayout::Scoped
        } else {
            FsLayout::Flat
        }
    }

    /// Directory holding this caller's files.
    pub fn storage_dir(&self) -> PathBuf {
        match &self.identity {
            Some(identity) => self.base_dir.join(identity_dir_name(identity)),
            None => self.base_dir.clone(),
        }
    }

    pub fn flat_file_path(&self) -> PathBuf {
        self.storage_dir().join(FLAT_FILE_NAME)
    }

    /// Drops the cache so the next call re-reads the disk.
    pub fn invalidate_cache(&mut self) {
        self.cache = None;
    }

    fn ensure_storage_dir(&self) -> ContactResult<PathBuf> {
        let dir = self.storage_dir();
        fs::create_dir_all(&dir).map_err(|err| io_failure(&dir, err))?;
        Ok(dir)
    }

    fn load_cache(&mut self) -> ContactResult<&mut Vec<Contact>> {
        if self.cache.is_none() {
            let contacts = match self.layout() {
                FsLayout::Scoped => read_record_dir(&self.storage_dir())?,
                FsLayout::Flat => read_flat_file(&self.flat_file_path())?,
            };
            debug!(
                "event=fs_cache_load module=store status=ok count={}",
                contacts.len()
            );
            self.cache = Some(contacts);
        }
        Ok(self.cache.get_or_insert_with(Vec::new))
    }

    fn write_flat_from_cache(&mut self) -> ContactResult<()> {
        self.ensure_storage_dir()?;
        let path = self.flat_file_path();
        let contacts = self.load_cache()?;
        write_flat_file(&path, contacts.as_slice())
    }

    fn cleanup_orphans(&mut self) -> ContactResult<()> {
        if self.layout() != FsLayout::Scoped {
            return Ok(());
        }
        let dir = self.ensure_storage_dir()?;
        let valid: HashSet<String> = self.load_cache()?.iter().map(record_file_name).collect();

        let mut removed = 0usize;
        for name in record_file_names(&dir)? {
            if !valid.contains(&name) {
                remove_if_exists(&dir.join(&name))?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("event=fs_cleanup module=store status=ok removed={removed}");
        }
        Ok(())
    }
}

impl ContactStore for FsContactStore {
    fn list(&mut self) -> ContactResult<Vec<Contact>> {
        Ok(self.load_cache()?.clone())
    }

    fn save_all(&mut self, contacts: &[Contact]) -> ContactResult<()> {
        if self.layout() == FsLayout::Flat {
            self.ensure_storage_dir()?;
            write_flat_file(&self.flat_file_path(), contacts)?;
            self.cache = Some(contacts.to_vec());
            return Ok(());
        }

        let dir = self.ensure_storage_dir()?;
        let previous = self.load_cache()?.clone();
        let previous_by_phone: HashMap<&str, &Contact> = previous
            .iter()
            .map(|contact| (contact.phone.as_str(), contact))
            .collect();
        let kept: HashSet<&str> = contacts.iter().map(|c| c.phone.as_str()).collect();

        for contact in contacts {
            let prior = previous_by_phone.get(contact.phone.as_str()).copied();
            upsert_record_file(&dir, prior, contact)?;
        }
        for stale in previous
            .iter()
            .filter(|contact| !kept.contains(contact.phone.as_str()))
        {
            remove_if_exists(&dir.join(record_file_name(stale)))?;
        }

        self.cache = Some(contacts.to_vec());
        self.cleanup_orphans()?;
        debug!(
            "event=fs_save_all module=store status=ok count={}",
            contacts.len()
        );
        Ok(())
    }

    fn save_one(&mut self, contact: &Contact) -> ContactResult<()> {
        let dir = self.ensure_storage_dir()?;
        let layout = self.layout();
        upsert_cached(self.load_cache()?, contact);

        match layout {
            FsLayout::Flat => self.write_flat_from_cache(),
            FsLayout::Scoped => write_record_file(&dir.join(record_file_name(contact)), contact),
        }
    }

    fn remove(&mut self, contact: &Contact) -> ContactResult<()> {
        let dir = self.ensure_storage_dir()?;
        self.load_cache()?
            .retain(|cached| cached.phone != contact.phone);

        match self.layout() {
            FsLayout::Flat => self.write_flat_from_cache(),
            FsLayout::Scoped => {
                let suffix = phone_file_suffix(&contact.phone);
                for name in record_file_names(&dir)? {
                    if name.ends_with(&suffix) {
                        remove_if_exists(&dir.join(&name))?;
                    }
                }
                Ok(())
            }
        }
    }

    fn modify(&mut self, contact: &Contact, old_phone: &str) -> ContactResult<()> {
        let dir = self.ensure_storage_dir()?;

        if self.layout() == FsLayout::Flat {
            let cache = self.load_cache()?;
            match cache.iter().position(|cached| cached.phone == old_phone) {
                Some(index) => cache[index] = contact.clone(),
                None => upsert_cached(cache, contact),
            }
            return self.write_flat_from_cache();
        }

        let cache = self.load_cache()?;
        let prior_index = cache
            .iter()
            .position(|cached| cached.phone == old_phone)
            .or_else(|| {
                cache.iter().position(|cached| {
                    cached.first_name.eq_ignore_ascii_case(&contact.first_name)
                        && cached.last_name.eq_ignore_ascii_case(&contact.last_name)
                })
            });
        let prior = prior_index.map(|index| cache.remove(index));

        let new_path = dir.join(record_file_name(contact));
        write_record_file(&new_path, contact)?;
        match &prior {
            Some(prior) => {
                let old_path = dir.join(record_file_name(prior));
                if old_path != new_path {
                    remove_if_exists(&old_path)?;
                }
            }
            None => remove_name_duplicates(&dir, contact)?,
        }

        let cache = self.load_cache()?;
        cache.retain(|cached| cached.phone != contact.phone);
        cache.push(contact.clone());
        self.cleanup_orphans()
    }
}

fn upsert_cached(cache: &mut Vec<Contact>, contact: &Contact) {
    match cache.iter_mut().find(|cached| cached.phone == contact.phone) {
        Some(cached) => *cached = contact.clone(),
        None => cache.push(contact.clone()),
    }
}

fn upsert_record_file(dir: &Path, prior: Option<&Contact>, contact: &Contact) -> ContactResult<()> {
    let new_path = dir.join(record_file_name(contact));
    write_record_file(&new_path, contact)?;
    if let Some(prior) = prior {
        let old_path = dir.join(record_file_name(prior));
        if old_path != new_path {
            remove_if_exists(&old_path)?;
        }
    }
    Ok(())
}

fn remove_name_duplicates(dir: &Path, contact: &Contact) -> ContactResult<()> {
    let prefix = name_file_prefix(&contact.first_name, &contact.last_name);
    let keep = record_file_name(contact);
    for name in record_file_names(dir)? {
        if name.starts_with(&prefix) && name != keep {
            remove_if_exists(&dir.join(&name))?;
        }
    }
    Ok(())
}

/// Names of `*.txt` files in `dir`, reserved names excluded.
fn record_file_names(dir: &Path) -> ContactResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_failure(dir, err)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| io_failure(dir, err))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !name.ends_with(RECORD_FILE_EXTENSION) || is_reserved(&name) {
            continue;
        }
        if entry.path().is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Directory name for a caller identity, always a child of the base directory.
///
/// Sanitized names made only of dots, or equal to a reserved file name, get
/// a `_` prefix.
pub fn identity_dir_name(identity: &str) -> String {
    let name = sanitize_for_path(identity);
    if name.chars().all(|c| c == '.') || is_reserved(&name) {
        format!("_{name}")
    } else {
        name
    }
}

fn is_reserved(name: &str) -> bool {
    name == FLAT_FILE_NAME || name == CREDENTIALS_FILE_NAME
}

fn read_record_dir(dir: &Path) -> ContactResult<Vec<Contact>> {
    let mut contacts = Vec::new();
    let mut skipped = 0usize;
    for name in record_file_names(dir)? {
        let path = dir.join(&name);
        let text = fs::read_to_string(&path).map_err(|err| io_failure(&path, err))?;
        match decode_line(text.trim()) {
            Some(contact) => contacts.push(contact),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("event=fs_read module=store status=partial layout=scoped skipped={skipped}");
    }
    Ok(contacts)
}

fn read_flat_file(path: &Path) -> ContactResult<Vec<Contact>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_failure(path, err)),
    };

    let mut contacts = Vec::new();
    let mut skipped = 0usize;
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        match decode_line(line) {
            Some(contact) => contacts.push(contact),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("event=fs_read module=store status=partial layout=flat skipped={skipped}");
    }
    Ok(contacts)
}

fn write_record_file(path: &Path, contact: &Contact) -> ContactResult<()> {
    replace_file(path, &format!("{}{LINE_SEPARATOR}", encode_line(contact)))
}

fn write_flat_file(path: &Path, contacts: &[Contact]) -> ContactResult<()> {
    let mut body = String::new();
    for contact in contacts {
        body.push_str(&encode_line(contact));
        body.push_str(LINE_SEPARATOR);
    }
    replace_file(path, &body)
}

fn replace_file(path: &Path, body: &str) -> ContactResult<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(TEMP_SUFFIX);
    let temp_path = PathBuf::from(temp_name);

    fs::write(&temp_path, body).map_err(|err| io_failure(&temp_path, err))?;
    fs::rename(&temp_path, path).map_err(|err| io_failure(path, err))
}

fn remove_if_exists(path: &Path) -> ContactResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_failure(path, err)),
    }
}

fn io_failure(path: &Path, err: std::io::Error) -> ContactError {
    ContactError::BackendFailure(BackendError::io(path, err))
}

#[cfg(test)]
mod tests {
    use super::{
        identity_dir_name, FsContactStore, FsLayout, CREDENTIALS_FILE_NAME, FLAT_FILE_NAME,
    };
    use crate::model::contact::Contact;
    use crate::store::ContactStore;

    #[test]
    fn layout_follows_identity() {
        let dir = tempfile::tempdir().unwrap();
        let scoped = FsContactStore::new(dir.path(), Some(" mario "));
        let flat = FsContactStore::new(dir.path(), Some(""));

        assert_eq!(scoped.layout(), FsLayout::Scoped);
        assert_eq!(scoped.storage_dir(), dir.path().join("mario"));
        assert_eq!(flat.layout(), FsLayout::Flat);
        assert_eq!(flat.storage_dir(), dir.path());
    }

    #[test]
    fn dot_identities_stay_inside_the_base_dir() {
        assert_eq!(identity_dir_name(".."), "_..");
        assert_eq!(identity_dir_name("."), "_.");
        assert_eq!(identity_dir_name("../etc"), ".._etc");
        assert_eq!(identity_dir_name(FLAT_FILE_NAME), "_contacts.txt");
        assert_eq!(identity_dir_name("mario.rossi"), "mario.rossi");

        let dir = tempfile::tempdir().unwrap();
        for identity in [".", "..", " .. "] {
            let store = FsContactStore::new(dir.path(), Some(identity));
            let storage = store.storage_dir();
            assert_eq!(storage.parent(), Some(dir.path()));
            assert_ne!(storage, dir.path());
        }
    }

    #[test]
    fn flush_for_parent_identity_leaves_sibling_files_alone() {
        let root = tempfile::tempdir().unwrap();
        let base = root.path().join("contacts");
        let notes = root.path().join("notes.txt");
        std::fs::write(&notes, "keep me\n").unwrap();

        let mut store = FsContactStore::new(&base, Some(".."));
        assert!(store.list().unwrap().is_empty());
        store.save_all(&[]).unwrap();

        assert!(notes.is_file());
        assert!(base.join("_..").is_dir());
    }

    #[test]
    fn credentials_file_is_not_read_or_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let user_dir = dir.path().join("mario");
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::write(user_dir.join(CREDENTIALS_FILE_NAME), "mario,hash\n").unwrap();

        let mut store = FsContactStore::new(dir.path(), Some("mario"));
        assert!(store.list().unwrap().is_empty());

        store
            .save_all(&[Contact::new("Anna", "Bianchi", "Via A", "+391", 30)])
            .unwrap();
        assert!(user_dir.join(CREDENTIALS_FILE_NAME).exists());
    }
}
