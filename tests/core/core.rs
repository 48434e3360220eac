use opsboard::core::broker::{DocBroker, DocEvent};
use opsboard::core::document::{self, LoadOutcome};
use opsboard::core::error::OpsboardError;
use opsboard::core::store::Store;
use std::collections::BTreeMap;
use std::fs;
use tempfile::tempdir;

type CountDoc = BTreeMap<String, u64>;

#[test]
fn load_missing_path_returns_default_and_creates_nothing() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("absent.json");

    let mut default = CountDoc::new();
    default.insert("seed".to_string(), 3);

    let outcome = document::load_document(&path, default.clone());
    assert!(outcome.was_defaulted());
    assert_eq!(outcome.into_inner(), default);
    assert!(!path.exists(), "load must not create the file");
}

#[test]
fn empty_and_corrupt_files_read_as_default() {
    let tmp = tempdir().expect("tempdir");

    let empty = tmp.path().join("empty.json");
    fs::write(&empty, "   \n").expect("write empty");
    assert!(document::load_document(&empty, CountDoc::new()).was_defaulted());

    let corrupt = tmp.path().join("corrupt.json");
    fs::write(&corrupt, "{\"a\": 1,,}").expect("write corrupt");
    assert!(document::load_document(&corrupt, CountDoc::new()).was_defaulted());
}

#[test]
fn save_load_round_trip_is_idempotent() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("doc.json");

    let mut doc = CountDoc::new();
    doc.insert("alpha".to_string(), 1);
    doc.insert("beta".to_string(), 2);

    document::save_document(&path, &doc).expect("first save");
    let loaded = document::load_document(&path, CountDoc::new());
    assert!(matches!(loaded, LoadOutcome::Loaded(_)));
    let loaded = loaded.into_inner();
    assert_eq!(loaded, doc);

    // Saving what we just loaded yields a semantically equal document.
    document::save_document(&path, &loaded).expect("second save");
    assert_eq!(document::load_document(&path, CountDoc::new()).into_inner(), doc);
}

#[test]
fn save_leaves_no_temp_files_behind() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("doc.json");

    let mut doc = CountDoc::new();
    doc.insert("k".to_string(), 9);
    document::save_document(&path, &doc).expect("save");

    let leftovers: Vec<_> = fs::read_dir(tmp.path())
        .expect("read_dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn broker_mutation_saves_and_audits() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    let broker = DocBroker::new(root);
    let doc_path = root.join("counters.json");

    let result = broker
        .with_doc(&doc_path, CountDoc::new(), "tester", "counters.bump", |doc| {
            *doc.entry("hits".to_string()).or_insert(0) += 1;
            Ok(doc["hits"])
        })
        .expect("broker success path");
    assert_eq!(result, 1);
    assert_eq!(
        document::load_document(&doc_path, CountDoc::new()).into_inner()["hits"],
        1
    );

    let failure: Result<(), OpsboardError> =
        broker.with_doc(&doc_path, CountDoc::new(), "tester", "counters.fail", |doc| {
            doc.insert("poison".to_string(), 99);
            Err(OpsboardError::ValidationError("intentional".to_string()))
        });
    assert!(failure.is_err());

    // Rejected mutation must not reach disk.
    let on_disk = document::load_document(&doc_path, CountDoc::new()).into_inner();
    assert!(!on_disk.contains_key("poison"));

    let audit_path = root.join("store.events.jsonl");
    assert!(audit_path.exists());
    let events: Vec<DocEvent> = fs::read_to_string(&audit_path)
        .expect("read audit")
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid doc event json"))
        .collect();
    assert!(events.iter().any(|ev| ev.status == "success"));
    assert!(events.iter().any(|ev| ev.status == "error"));
    assert!(
        events
            .iter()
            .filter(|ev| ev.status == "success")
            .all(|ev| ev.content_hash.is_some())
    );
    assert!(events.iter().all(|ev| ev.doc_id == "counters.json"));
}

#[test]
fn store_paths_resolve_inside_root() {
    let store = Store::new("/srv/coord/data");
    assert!(store.blackboard_path().ends_with("blackboard.json"));
    assert!(store.breakers_path().ends_with("circuit_breakers.json"));
}
