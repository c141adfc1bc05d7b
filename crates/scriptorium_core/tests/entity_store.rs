use scriptorium_core::{
    Document, EntityStore, ErrorKind, Folder, FsEntityStore, Namespace, NamespaceKind,
    ValidationError, VaultError, WriteDurability,
};
use std::fs;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn open_vault() -> (TempDir, Namespace) {
    let dir = TempDir::new().unwrap();
    let namespace =
        Namespace::open(NamespaceKind::Vault, dir.path(), WriteDurability::BestEffort).unwrap();
    (dir, namespace)
}

#[test]
fn save_then_load_refreshes_updated_at_and_records_prior_content() {
    let (_dir, vault) = open_vault();
    let documents = vault.documents();

    let original = documents
        .save_document(Document::with_id("doc-1", "Intro", "first"))
        .unwrap();
    thread::sleep(Duration::from_millis(5));

    let mut edited = original.clone();
    edited.content = "second".to_string();
    documents.save_document(edited).unwrap();

    let loaded = documents.get_document("doc-1").unwrap();
    assert_eq!(loaded.id, original.id);
    assert_eq!(loaded.name, original.name);
    assert_eq!(loaded.content, "second");
    assert_eq!(loaded.created_at, original.created_at);
    assert!(loaded.updated_at > original.updated_at);
    assert_eq!(loaded.versions.len(), 1);
    assert_eq!(loaded.versions[0].content, "first");
    assert_eq!(loaded.versions[0].created_at, original.updated_at);
}

#[test]
fn saving_same_content_appends_no_version() {
    let (_dir, vault) = open_vault();
    let documents = vault.documents();

    let saved = documents
        .save_document(Document::with_id("doc-1", "Intro", "same"))
        .unwrap();
    let mut renamed = saved.clone();
    renamed.name = "Renamed".to_string();
    let resaved = documents.save_document(renamed).unwrap();

    assert!(resaved.versions.is_empty());
    assert_eq!(resaved.name, "Renamed");
}

#[test]
fn stale_client_copy_does_not_drop_history() {
    let (_dir, vault) = open_vault();
    let documents = vault.documents();

    let stale = documents
        .save_document(Document::with_id("doc-1", "Intro", "v1"))
        .unwrap();
    let mut second = stale.clone();
    second.content = "v2".to_string();
    documents.save_document(second).unwrap();

    let mut third = stale;
    third.content = "v3".to_string();
    let saved = documents.save_document(third).unwrap();

    let history: Vec<&str> = saved.versions.iter().map(|v| v.content.as_str()).collect();
    assert_eq!(history, vec!["v1", "v2"]);
}

#[test]
fn delete_document_twice_is_idempotent() {
    let (_dir, vault) = open_vault();
    let documents = vault.documents();
    let doc = documents.create_document("Gone", "bye", None).unwrap();

    assert!(documents.delete_document(&doc.id).unwrap());
    assert!(!documents.list_documents().unwrap().iter().any(|d| d.id == doc.id));
    assert!(!documents.delete_document(&doc.id).unwrap());

    let err = documents.get_document(&doc.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn list_documents_orders_by_most_recent_update() {
    let (_dir, vault) = open_vault();
    let documents = vault.documents();

    let older = documents.create_document("Older", "", None).unwrap();
    thread::sleep(Duration::from_millis(5));
    let newer = documents.create_document("Newer", "", None).unwrap();

    let ids: Vec<String> = documents
        .list_documents()
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec![newer.id, older.id]);
}

#[test]
fn rejects_blank_names_and_unsafe_ids() {
    let (_dir, vault) = open_vault();
    let documents = vault.documents();

    let err = documents
        .save_document(Document::with_id("doc-1", "   ", "body"))
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::Validation(ValidationError::MissingName { .. })
    ));

    let err = documents
        .save_document(Document::with_id("../escape", "Name", "body"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = documents.get_document("a/b").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Malformed ids are refused on every path, even where a missing id
    // would be NotFound or a no-op.
    assert_eq!(
        documents.delete_document("a.b").unwrap_err().kind(),
        ErrorKind::Validation
    );
    assert_eq!(
        documents.move_document("a.b", None).unwrap_err().kind(),
        ErrorKind::Validation
    );
    assert!(!documents.delete_document("well-formed-but-absent").unwrap());
}

#[test]
fn save_into_missing_folder_is_not_found_and_empty_folder_means_root() {
    let (_dir, vault) = open_vault();
    let documents = vault.documents();

    let err = documents
        .save_document(Document::with_id("doc-1", "Doc", "").in_folder("nope"))
        .unwrap_err();
    assert!(matches!(err, VaultError::NotFound { .. }));

    let mut doc = Document::with_id("doc-2", "Doc", "");
    doc.folder_id = Some(String::new());
    assert_eq!(documents.save_document(doc).unwrap().folder_id, None);
}

#[test]
fn move_document_between_folder_and_root() {
    let (_dir, vault) = open_vault();
    let folder = vault.tree().create_folder("F", None).unwrap();
    let doc = vault.documents().create_document("Doc", "", None).unwrap();

    let moved = vault
        .documents()
        .move_document(&doc.id, Some(&folder.id))
        .unwrap();
    assert_eq!(moved.folder_id.as_deref(), Some(folder.id.as_str()));

    let back = vault.documents().move_document(&doc.id, None).unwrap();
    assert_eq!(back.folder_id, None);

    let err = vault
        .documents()
        .move_document(&doc.id, Some("missing"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = vault.documents().move_document("missing", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn restore_version_appends_replaced_content() {
    let (_dir, vault) = open_vault();
    let documents = vault.documents();
    let mut doc = documents
        .save_document(Document::with_id("doc-1", "Doc", "v1"))
        .unwrap();
    doc.content = "v2".to_string();
    documents.save_document(doc).unwrap();

    let restored = documents.restore_version("doc-1", 0).unwrap();
    assert_eq!(restored.content, "v1");
    let history: Vec<String> = documents
        .document_versions("doc-1")
        .unwrap()
        .into_iter()
        .map(|v| v.content)
        .collect();
    assert_eq!(history, vec!["v1".to_string(), "v2".to_string()]);

    let err = documents.restore_version("doc-1", 9).unwrap_err();
    assert!(matches!(
        err,
        VaultError::Validation(ValidationError::VersionOutOfRange { len: 2, .. })
    ));
}

#[test]
fn reads_legacy_timestamp_shapes_and_unknown_fields() {
    let dir = TempDir::new().unwrap();
    let store = FsEntityStore::open(dir.path(), WriteDurability::BestEffort).unwrap();
    let raw = r#"{
        "id": "legacy",
        "name": "Legacy",
        "content": "old",
        "createdAt": 1700000000000,
        "updatedAt": "2023-11-14T22:13:20.000Z",
        "versions": [{ "content": "older", "createdAt": "1699999999000" }],
        "pinned": true
    }"#;
    fs::write(dir.path().join("documents").join("legacy.json"), raw).unwrap();

    let doc = store.get::<Document>("legacy").unwrap().unwrap();
    assert_eq!(doc.created_at.timestamp_millis(), 1_700_000_000_000);
    assert_eq!(doc.updated_at.timestamp_millis(), 1_700_000_000_000);
    assert_eq!(doc.versions[0].created_at.timestamp_millis(), 1_699_999_999_000);
    assert_eq!(doc.folder_id, None);
}

#[test]
fn records_are_stored_one_file_per_id() {
    let dir = TempDir::new().unwrap();
    let store = FsEntityStore::open(dir.path(), WriteDurability::BestEffort).unwrap();
    store.save(Document::with_id("d1", "Doc", "")).unwrap();
    store.save(Folder::with_id("f1", "Folder")).unwrap();

    assert!(dir.path().join("documents").join("d1.json").is_file());
    assert!(dir.path().join("folders").join("f1.json").is_file());

    let raw = fs::read_to_string(dir.path().join("documents").join("d1.json")).unwrap();
    assert!(raw.contains("\"folderId\""));
    assert!(raw.contains("\"updatedAt\""));
}
