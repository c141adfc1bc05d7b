use scriptorium_core::{
    api, DeleteFolderOutcome, Document, ErrorKind, Folder, Namespace, NamespaceKind, VaultError,
    WriteDurability,
};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use tempfile::TempDir;

fn open_vault() -> (TempDir, Namespace) {
    let dir = TempDir::new().unwrap();
    let namespace =
        Namespace::open(NamespaceKind::Vault, dir.path(), WriteDurability::BestEffort).unwrap();
    (dir, namespace)
}

/// root -> a -> b -> c, plus sibling d at root.
fn chain(vault: &Namespace) -> (Folder, Folder, Folder, Folder) {
    let tree = vault.tree();
    let a = tree.create_folder("a", None).unwrap();
    let b = tree.create_folder("b", Some(&a.id)).unwrap();
    let c = tree.create_folder("c", Some(&b.id)).unwrap();
    let d = tree.create_folder("d", None).unwrap();
    (a, b, c, d)
}

#[test]
fn move_folder_rejects_self_and_descendants() {
    let (_dir, vault) = open_vault();
    let (a, b, c, _) = chain(&vault);
    let tree = vault.tree();

    for target in [&a.id, &b.id, &c.id] {
        let err = tree.move_folder(&a.id, Some(target)).unwrap_err();
        assert!(matches!(err, VaultError::CycleDetected { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }
    assert_eq!(tree.get_folder(&a.id).unwrap().parent_id, None);
}

#[test]
fn move_folder_updates_parent_otherwise() {
    let (_dir, vault) = open_vault();
    let (a, _b, c, d) = chain(&vault);
    let tree = vault.tree();

    let moved = tree.move_folder(&c.id, Some(&d.id)).unwrap();
    assert_eq!(moved.parent_id.as_deref(), Some(d.id.as_str()));

    let moved = tree.move_folder(&a.id, Some(&d.id)).unwrap();
    assert_eq!(moved.parent_id.as_deref(), Some(d.id.as_str()));

    let moved = tree.move_folder(&a.id, None).unwrap();
    assert_eq!(moved.parent_id, None);

    assert_eq!(
        tree.move_folder(&a.id, Some("missing")).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        tree.move_folder("missing", None).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn save_folder_checks_parent_and_cycles() {
    let (_dir, vault) = open_vault();
    let (a, _b, c, _) = chain(&vault);
    let tree = vault.tree();

    let err = tree
        .save_folder(Folder::new("orphan").in_parent("missing"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let mut looped = tree.get_folder(&a.id).unwrap();
    looped.parent_id = Some(c.id.clone());
    assert_eq!(
        tree.save_folder(looped).unwrap_err().kind(),
        ErrorKind::InvalidOperation
    );
}

#[test]
fn rename_folder_keeps_contents() {
    let (_dir, vault) = open_vault();
    let (a, b, _, _) = chain(&vault);
    let doc = vault
        .documents()
        .create_document("Doc", "", Some(&a.id))
        .unwrap();

    let renamed = vault.tree().rename_folder(&a.id, "  Renamed ").unwrap();
    assert_eq!(renamed.name, "Renamed");
    assert_eq!(
        vault.tree().get_folder(&b.id).unwrap().parent_id.as_deref(),
        Some(a.id.as_str())
    );
    assert_eq!(
        vault.documents().get_document(&doc.id).unwrap().folder_id,
        Some(a.id.clone())
    );
    assert_eq!(
        vault.tree().rename_folder(&a.id, "").unwrap_err().kind(),
        ErrorKind::Validation
    );
}

#[test]
fn delete_gate_reports_subtree_document_count_then_deletes_recursively() {
    let (_dir, vault) = open_vault();
    let tree = vault.tree();
    let documents = vault.documents();
    let top = tree.create_folder("Top", None).unwrap();
    let nested = tree.create_folder("Nested", Some(&top.id)).unwrap();
    let d1 = documents.create_document("D1", "", Some(&top.id)).unwrap();
    let d2 = documents.create_document("D2", "", Some(&top.id)).unwrap();
    let d3 = documents.create_document("D3", "", Some(&nested.id)).unwrap();
    let outside = documents.create_document("Out", "[[D3]]", None).unwrap();

    let refused = api::delete_folder(&vault, &top.id, false);
    assert_eq!(
        serde_json::to_value(&refused).unwrap()["documentCount"],
        json!(3)
    );
    assert!(!refused.success);
    assert_eq!(refused.can_recurse, Some(true));
    assert_eq!(tree.subtree_document_count(&top.id).unwrap(), 3);

    let outcome = tree.delete_folder(&top.id, true).unwrap();
    assert_eq!(
        outcome,
        DeleteFolderOutcome::Deleted {
            folders_removed: 2,
            documents_removed: 3,
        }
    );
    for id in [&d1.id, &d2.id, &d3.id] {
        assert_eq!(
            documents.get_document(id).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
    for id in [&top.id, &nested.id] {
        assert_eq!(tree.get_folder(id).unwrap_err().kind(), ErrorKind::NotFound);
    }

    let outside = documents.get_document(&outside.id).unwrap();
    assert_eq!(outside.content, "[[D3]]");
    assert!(documents.backlinks_of(&outside.id).unwrap().is_empty());
}

#[test]
fn empty_folder_deletes_without_confirmation() {
    let (_dir, vault) = open_vault();
    let empty = vault.tree().create_folder("Empty", None).unwrap();

    let response = api::delete_folder(&vault, &empty.id, false);
    assert!(response.success);
    assert_eq!(response.can_recurse, None);

    let again = vault.tree().delete_folder(&empty.id, false).unwrap();
    assert_eq!(
        again,
        DeleteFolderOutcome::Deleted {
            folders_removed: 0,
            documents_removed: 0,
        }
    );
}

#[test]
fn folder_with_only_subfolders_still_needs_confirmation() {
    let (_dir, vault) = open_vault();
    let (a, _, _, _) = chain(&vault);

    assert_eq!(
        vault.tree().delete_folder(&a.id, false).unwrap(),
        DeleteFolderOutcome::NeedsConfirmation { document_count: 0 }
    );
}

fn shape(vault: &Namespace, root: &str) -> BTreeMap<String, (Vec<String>, Vec<(String, String)>)> {
    let mut out = BTreeMap::new();
    let mut stack = vec![(root.to_string(), String::new())];
    while let Some((id, path)) = stack.pop() {
        let children = vault.tree().list_children(Some(&id)).unwrap();
        let folder_names: Vec<String> = children.folders.iter().map(|f| f.name.clone()).collect();
        let docs: Vec<(String, String)> = children
            .documents
            .iter()
            .map(|d| (d.name.clone(), d.content.clone()))
            .collect();
        for folder in &children.folders {
            stack.push((folder.id.clone(), format!("{path}/{}", folder.name)));
        }
        out.insert(path, (folder_names, docs));
    }
    out
}

fn subtree_ids(vault: &Namespace, root: &str) -> HashSet<String> {
    let mut ids = HashSet::new();
    let mut stack = vec![root.to_string()];
    while let Some(id) = stack.pop() {
        let children = vault.tree().list_children(Some(&id)).unwrap();
        ids.extend(children.documents.into_iter().map(|d| d.id));
        for folder in children.folders {
            stack.push(folder.id.clone());
        }
        ids.insert(id);
    }
    ids
}

#[test]
fn copy_folder_produces_isomorphic_subtree_with_fresh_ids() {
    let (_dir, vault) = open_vault();
    let tree = vault.tree();
    let documents = vault.documents();
    let src = tree.create_folder("Project", None).unwrap();
    let sub = tree.create_folder("Notes", Some(&src.id)).unwrap();
    let deeper = tree.create_folder("Deep", Some(&sub.id)).unwrap();
    documents
        .create_document("Readme", "see [[Plan]]", Some(&src.id))
        .unwrap();
    documents
        .create_document("Plan", "step one", Some(&sub.id))
        .unwrap();
    documents
        .create_document("Bottom", "", Some(&deeper.id))
        .unwrap();
    let dest = tree.create_folder("Archive", None).unwrap();

    let response = api::copy_folder(&vault, &src.id, Some(&dest.id), None);
    assert!(response.success);
    let new_id = response.new_folder_id.unwrap();

    let copy_root = tree.get_folder(&new_id).unwrap();
    assert_eq!(copy_root.name, "Project (copy)");
    assert_eq!(copy_root.parent_id.as_deref(), Some(dest.id.as_str()));

    assert_eq!(shape(&vault, &src.id), shape(&vault, &new_id));
    let original = subtree_ids(&vault, &src.id);
    let copied = subtree_ids(&vault, &new_id);
    assert_eq!(original.len(), copied.len());
    assert!(original.is_disjoint(&copied));

    // Links are copied verbatim, so "Plan" now has two referrers.
    let plan = documents
        .list_documents()
        .unwrap()
        .into_iter()
        .find(|d| d.name == "Plan" && d.folder_id.as_deref() == Some(sub.id.as_str()))
        .unwrap();
    assert_eq!(documents.backlinks_of(&plan.id).unwrap().len(), 2);
}

#[test]
fn copy_folder_uses_given_name_and_rejects_own_subtree() {
    let (_dir, vault) = open_vault();
    let (a, b, c, _) = chain(&vault);
    let tree = vault.tree();

    let new_id = tree.copy_folder(&b.id, None, Some("Snapshot")).unwrap();
    let copy = tree.get_folder(&new_id).unwrap();
    assert_eq!(copy.name, "Snapshot");
    assert_eq!(copy.parent_id, None);

    for target in [&b.id, &c.id] {
        let err = tree.copy_folder(&b.id, Some(target), None).unwrap_err();
        assert!(matches!(err, VaultError::CopyIntoOwnSubtree { .. }));
    }
    let failed = api::copy_folder(&vault, &a.id, Some(&c.id), None);
    assert!(!failed.success);
    assert!(failed.new_folder_id.is_none());
    assert!(failed.error.is_some());

    assert_eq!(
        tree.copy_folder("missing", None, None).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn list_children_and_folder_path() {
    let (_dir, vault) = open_vault();
    let (a, b, c, d) = chain(&vault);
    vault
        .documents()
        .save_document(Document::with_id("zeta", "Zeta", "").in_folder(b.id.clone()))
        .unwrap();
    vault
        .documents()
        .save_document(Document::with_id("alpha", "Alpha", "").in_folder(b.id.clone()))
        .unwrap();

    let root = vault.tree().list_children(None).unwrap();
    let root_names: Vec<&str> = root.folders.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(root_names, vec!["a", "d"]);
    assert!(root.documents.is_empty());

    let inside_b = vault.tree().list_children(Some(&b.id)).unwrap();
    assert_eq!(inside_b.folders.len(), 1);
    let doc_names: Vec<&str> = inside_b.documents.iter().map(|x| x.name.as_str()).collect();
    assert_eq!(doc_names, vec!["Alpha", "Zeta"]);

    let path: Vec<String> = vault
        .tree()
        .folder_path(&c.id)
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(path, vec![a.id.clone(), b.id.clone(), c.id.clone()]);
    assert_eq!(vault.tree().folder_path(&d.id).unwrap().len(), 1);

    assert_eq!(
        vault.tree().list_children(Some("missing")).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn duplicate_names_are_allowed() {
    let (_dir, vault) = open_vault();
    let first = vault.tree().create_folder("Same", None).unwrap();
    let second = vault.tree().create_folder("Same", None).unwrap();
    assert_ne!(first.id, second.id);

    vault.documents().create_document("Doc", "", None).unwrap();
    vault.documents().create_document("Doc", "", None).unwrap();
    assert_eq!(vault.documents().list_documents().unwrap().len(), 2);
}
