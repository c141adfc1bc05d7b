use scriptorium_core::{Document, Namespace, NamespaceKind, WriteDurability};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn open_vault() -> (TempDir, Arc<Namespace>) {
    let dir = TempDir::new().unwrap();
    let namespace =
        Namespace::open(NamespaceKind::Vault, dir.path(), WriteDurability::BestEffort).unwrap();
    (dir, Arc::new(namespace))
}

#[test]
fn concurrent_saves_to_one_document_lose_no_history() {
    const WRITERS: usize = 16;
    let (_dir, vault) = open_vault();
    vault
        .documents()
        .save_document(Document::with_id("shared", "Shared", "v0"))
        .unwrap();

    let handles: Vec<_> = (1..=WRITERS)
        .map(|i| {
            let vault = Arc::clone(&vault);
            thread::spawn(move || {
                let doc = Document::with_id("shared", "Shared", format!("v{i}"));
                vault.documents().save_document(doc).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let doc = vault.documents().get_document("shared").unwrap();
    assert_eq!(doc.versions.len(), WRITERS);
    assert_eq!(doc.versions[0].content, "v0");

    let mut seen: Vec<String> = doc.versions.iter().map(|v| v.content.clone()).collect();
    seen.push(doc.content.clone());
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), WRITERS + 1);
}

#[test]
fn concurrent_edits_across_documents_keep_index_consistent() {
    const WRITERS: usize = 8;
    let (_dir, vault) = open_vault();
    vault.documents().create_document("Hub", "", None).unwrap();

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let vault = Arc::clone(&vault);
            thread::spawn(move || {
                let documents = vault.documents();
                let doc = documents
                    .create_document(format!("Spoke {i}"), "[[Hub]]", None)
                    .unwrap();
                if i % 2 == 0 {
                    documents.delete_document(&doc.id).unwrap();
                } else {
                    documents
                        .rename_document(&doc.id, &format!("Renamed {i}"))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let documents = vault.documents();
    let all = documents.list_documents().unwrap();
    assert_eq!(all.len(), 1 + WRITERS / 2);
    assert!(documents.index().is_consistent_with(&all));

    let hub = all.iter().find(|d| d.name == "Hub").unwrap();
    assert_eq!(documents.backlinks_of(&hub.id).unwrap().len(), WRITERS / 2);
}

#[test]
fn concurrent_readers_never_see_torn_records() {
    let (_dir, vault) = open_vault();
    let big = "x".repeat(64 * 1024);
    vault
        .documents()
        .save_document(Document::with_id("big", "Big", big))
        .unwrap();

    let writer = {
        let vault = Arc::clone(&vault);
        thread::spawn(move || {
            for round in 0..20u8 {
                let content = char::from(b'a' + round).to_string().repeat(64 * 1024);
                let mut doc = vault.documents().get_document("big").unwrap();
                doc.content = content;
                vault.documents().save_document(doc).unwrap();
            }
        })
    };
    let reader = {
        let vault = Arc::clone(&vault);
        thread::spawn(move || {
            for _ in 0..50 {
                let doc = vault.documents().get_document("big").unwrap();
                let first = doc.content.chars().next().unwrap();
                assert!(doc.content.chars().all(|ch| ch == first));
            }
        })
    };
    writer.join().unwrap();
    reader.join().unwrap();
}

#[test]
fn opposing_folder_moves_never_leave_a_cycle() {
    let (_dir, vault) = open_vault();
    for round in 0..100 {
        let tree = vault.tree();
        let a = tree.create_folder(format!("A{round}"), None).unwrap();
        let b = tree.create_folder(format!("B{round}"), None).unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let spawn_move = |id: String, parent: String| {
            let vault = Arc::clone(&vault);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                vault.tree().move_folder(&id, Some(&parent)).is_ok()
            })
        };
        let first = spawn_move(a.id.clone(), b.id.clone());
        let second = spawn_move(b.id.clone(), a.id.clone());
        let accepted = [first.join().unwrap(), second.join().unwrap()];

        assert_eq!(
            accepted.iter().filter(|ok| **ok).count(),
            1,
            "round {round}: exactly one opposing move must win"
        );
        assert!(vault.integrity().check_integrity().unwrap().cycles.is_empty());
    }
}
