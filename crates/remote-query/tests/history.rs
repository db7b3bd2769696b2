//! History store tests, in memory and on disk.

use remote_query::{history_identifier, FileBackend, HistoryBackend, HistoryStore};

#[test]
fn test_front_dedup_sequence() -> anyhow::Result<()> {
    let store = HistoryStore::in_memory();

    store.add("f", "x")?;
    assert_eq!(store.list("f")?, vec!["x"]);
    store.add("f", "y")?;
    assert_eq!(store.list("f")?, vec!["y", "x"]);
    store.add("f", "x")?;
    assert_eq!(store.list("f")?, vec!["x", "y"]);
    Ok(())
}

#[test]
fn test_list_returns_independent_snapshots() -> anyhow::Result<()> {
    let store = HistoryStore::in_memory();
    store.add("f", "x")?;

    let mut first = store.list("f")?;
    first.push("mutated".to_string());
    store.add("f", "y")?;

    assert_eq!(first, vec!["x", "mutated"]);
    assert_eq!(store.list("f")?, vec!["y", "x"]);
    Ok(())
}

#[test]
fn test_default_capacity_is_ten() -> anyhow::Result<()> {
    let store = HistoryStore::in_memory();
    for i in 0..15 {
        store.add("f", &format!("v{i}"))?;
    }

    let values = store.list("f")?;
    assert_eq!(values.len(), 10);
    assert_eq!(values.first().map(String::as_str), Some("v14"));
    assert_eq!(values.last().map(String::as_str), Some("v5"));
    Ok(())
}

#[test]
fn test_file_backend_survives_restart() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let identifier = history_identifier("kobs-mongodb", "filter");

    {
        let store = HistoryStore::new(FileBackend::new(dir.path()), 10);
        store.add(&identifier, "{}")?;
        store.add(&identifier, r#"{"status":"open"}"#)?;
    }

    let raw = std::fs::read_to_string(dir.path().join("kobs-mongodb-filterhistory.json"))?;
    let decoded: Vec<String> = serde_json::from_str(&raw)?;
    assert_eq!(decoded, vec![r#"{"status":"open"}"#, "{}"]);

    let reopened = HistoryStore::new(FileBackend::new(dir.path()), 10);
    assert_eq!(reopened.list(&identifier)?, decoded);

    reopened.clear(&identifier)?;
    assert!(reopened.list(&identifier)?.is_empty());
    assert!(!dir.path().join("kobs-mongodb-filterhistory.json").exists());
    Ok(())
}

#[test]
fn test_file_backend_creates_directory_lazily() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let nested = dir.path().join("state").join("history");
    let backend = FileBackend::new(&nested);

    assert_eq!(backend.load("f")?, None);
    assert!(!nested.exists());

    backend.store("f", "[]")?;
    assert_eq!(backend.load("f")?.as_deref(), Some("[]"));
    Ok(())
}

#[test]
fn test_global_store_is_shared() -> anyhow::Result<()> {
    HistoryStore::global().add("global-test", "x")?;
    assert_eq!(HistoryStore::global().list("global-test")?, vec!["x"]);
    assert!(HistoryStore::install_global(HistoryStore::in_memory()).is_err());
    Ok(())
}
