use rubrica_core::config::{ConfigSource, CONFIG_RELATIVE_PATH};
use rubrica_core::store::fs_store::{FsContactStore, CREDENTIALS_FILE_NAME, FLAT_FILE_NAME};
use rubrica_core::{
    open_directory, BackendKind, Contact, ContactDirectory, ContactStore, InMemorySessionStore,
    LoadedConfig,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn scoped_store_writes_one_file_per_contact() {
    let root = tempfile::tempdir().unwrap();
    let directory =
        ContactDirectory::new(FsContactStore::new(root.path(), Some("mario")), Some("mario"))
            .unwrap();

    directory.insert("Anna", "Bianchi", "Via Po", "+391", 30).unwrap();
    directory.insert("Bruno", "De Luca", "Via Roma", "+392", 40).unwrap();

    let user_dir = root.path().join("mario");
    assert_eq!(
        file_names(&user_dir),
        ["Anna-Bianchi-_391.txt", "Bruno-De_Luca-_392.txt"]
    );
    let body = fs::read_to_string(user_dir.join("Anna-Bianchi-_391.txt")).unwrap();
    assert_eq!(body.trim_end(), "Anna;Bianchi;Via Po;+391;30");
}

#[test]
fn scoped_phone_edit_renames_the_record_file() {
    let root = tempfile::tempdir().unwrap();
    let directory =
        ContactDirectory::new(FsContactStore::new(root.path(), Some("mario")), Some("mario"))
            .unwrap();
    directory.insert("Anna", "Bianchi", "Via Po", "+391", 30).unwrap();

    directory.modify("+391", "phone", "+399").unwrap();
    directory.modify("+399", "first_name", "Annamaria").unwrap();

    assert_eq!(
        file_names(&root.path().join("mario")),
        ["Annamaria-Bianchi-_399.txt"]
    );
}

#[test]
fn scoped_remove_deletes_every_file_for_the_phone() {
    let root = tempfile::tempdir().unwrap();
    let user_dir = root.path().join("mario");
    fs::create_dir_all(&user_dir).unwrap();
    fs::write(user_dir.join(CREDENTIALS_FILE_NAME), "secret\n").unwrap();
    fs::write(user_dir.join("Anna-Bianchi-_391.txt"), "Anna;Bianchi;Via Po;+391;30\n").unwrap();

    let directory =
        ContactDirectory::new(FsContactStore::new(root.path(), Some("mario")), Some("mario"))
            .unwrap();
    fs::write(user_dir.join("Old-Name-_391.txt"), "Old;Name;Via Po;+391;30\n").unwrap();

    assert!(directory.remove("+391").unwrap());
    assert_eq!(file_names(&user_dir), [CREDENTIALS_FILE_NAME]);
}

#[test]
fn flush_cleans_orphans_but_keeps_reserved_files() {
    let root = tempfile::tempdir().unwrap();
    let user_dir = root.path().join("mario");
    fs::create_dir_all(&user_dir).unwrap();
    fs::write(user_dir.join(CREDENTIALS_FILE_NAME), "secret\n").unwrap();

    let directory =
        ContactDirectory::new(FsContactStore::new(root.path(), Some("mario")), Some("mario"))
            .unwrap();
    directory.insert("Anna", "Bianchi", "Via Po", "+391", 30).unwrap();
    fs::write(user_dir.join("Stray-Entry-_300.txt"), "Stray;Entry;Via;+300;1\n").unwrap();

    directory.close().unwrap();
    assert_eq!(
        file_names(&user_dir),
        ["Anna-Bianchi-_391.txt", CREDENTIALS_FILE_NAME]
    );
}

#[test]
fn parent_dir_identity_cannot_clean_outside_the_base_dir() {
    let root = tempfile::tempdir().unwrap();
    let base = root.path().join("contacts");
    fs::write(root.path().join("notes.txt"), "keep me\n").unwrap();

    let directory =
        ContactDirectory::new(FsContactStore::new(&base, Some("..")), Some("..")).unwrap();
    directory.insert("Anna", "Bianchi", "Via Po", "+391", 30).unwrap();
    directory.close().unwrap();

    assert!(root.path().join("notes.txt").is_file());
    assert_eq!(file_names(&base.join("_..")), ["Anna-Bianchi-_391.txt"]);
}

#[test]
fn flat_store_keeps_one_line_per_contact_and_skips_malformed_lines() {
    let root = tempfile::tempdir().unwrap();
    fs::write(
        root.path().join(FLAT_FILE_NAME),
        "Anna ; Bianchi ; Via Po ; +391 ; 30\nnot a record\n\nBruno;Neri;Via Roma;+392;x\n",
    )
    .unwrap();

    let mut store = FsContactStore::new(root.path(), None);
    let loaded = store.list().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].phone, "+391");
    assert_eq!(loaded[0].age, 30);

    store
        .save_one(&Contact::new("Carla", "Verdi", "Via\nNuova", "+393", 22))
        .unwrap();
    let text = fs::read_to_string(root.path().join(FLAT_FILE_NAME)).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, ["Anna;Bianchi;Via Po;+391;30", "Carla;Verdi;Via Nuova;+393;22"]);
}

#[test]
fn flat_modify_and_remove_rewrite_the_file() {
    let root = tempfile::tempdir().unwrap();
    let directory = ContactDirectory::new(FsContactStore::new(root.path(), None), None).unwrap();
    directory.insert("Anna", "Bianchi", "Via Po", "+391", 30).unwrap();
    directory.insert("Bruno", "Neri", "Via Roma", "+392", 40).unwrap();

    directory.modify("+391", "address", "Corso Italia").unwrap();
    directory.remove("+392").unwrap();

    let text = fs::read_to_string(root.path().join(FLAT_FILE_NAME)).unwrap();
    assert_eq!(text.lines().collect::<Vec<_>>(), ["Anna;Bianchi;Corso Italia;+391;30"]);
}

#[test]
fn open_directory_reads_configuration_beside_the_anchor() {
    let anchor = tempfile::tempdir().unwrap();
    let conf = anchor.path().join(CONFIG_RELATIVE_PATH);
    fs::create_dir_all(conf.parent().unwrap()).unwrap();
    fs::write(&conf, r#"{ "backend": "fs", "fs": { "base_dir": "rubrica-data" } }"#).unwrap();

    let config = LoadedConfig::load(anchor.path());
    assert_eq!(config.source, ConfigSource::File(conf));
    assert_eq!(config.backend(), BackendKind::Fs);

    let directory =
        open_directory(&config, Some("anna"), Arc::new(InMemorySessionStore::new())).unwrap();
    directory.insert("Anna", "Bianchi", "Via Po", "+391", 30).unwrap();
    assert_eq!(directory.current_user(), Some("anna"));
    assert!(anchor
        .path()
        .join("rubrica-data/anna/Anna-Bianchi-_391.txt")
        .is_file());
}

#[test]
fn malformed_configuration_falls_back_to_bundled_default() {
    let anchor = tempfile::tempdir().unwrap();
    let conf = anchor.path().join(CONFIG_RELATIVE_PATH);
    fs::create_dir_all(conf.parent().unwrap()).unwrap();
    fs::write(&conf, "{ backend = ").unwrap();

    let config = LoadedConfig::load(anchor.path());
    assert_eq!(config.source, ConfigSource::Bundled);
    assert_eq!(config.backend(), BackendKind::Fs);
    assert_eq!(config.fs_root(), anchor.path().join("contacts"));
}
