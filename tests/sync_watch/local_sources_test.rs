use std::fs;
use std::sync::Arc;

use confsync::ChangeEvent;
use confsync::Configurator;
use confsync::MemoryStore;
use confsync::WatchConfig;
use tokio::sync::mpsc;

use crate::commons::drain;
use crate::commons::NAMESPACE;

fn watch_config() -> WatchConfig {
    WatchConfig {
        namespace: NAMESPACE.to_string(),
        interval_secs: 3600,
        ..Default::default()
    }
}

/// A directory of mixed formats merges into one namespace, and a second
/// sync of the same directory changes nothing
#[tokio::test]
async fn test_directory_sync_is_idempotent() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("10-base.toml"), "[app]\nname = \"orders\"\nworkers = 4\n").unwrap();
    fs::write(temp_dir.path().join("20-env.yaml"), "app:\n  workers: 8\nfeatures:\n  - a\n  - b\n").unwrap();
    fs::write(temp_dir.path().join("README.md"), "ignored").unwrap();

    let store = Arc::new(MemoryStore::new());
    let configurator = Configurator::new(store.clone(), watch_config());

    let first = configurator.sync(temp_dir.path()).await.unwrap();
    assert_eq!(
        first.puts,
        vec!["/micro/config/app/name", "/micro/config/app/workers", "/micro/config/features"]
    );
    assert_eq!(configurator.get("/micro/config/app/workers", "").await.unwrap(), "8");
    assert_eq!(configurator.get("/micro/config/features", "").await.unwrap(), r#"["a","b"]"#);

    let second = configurator.sync(temp_dir.path()).await.unwrap();
    assert!(second.is_noop());
}

/// Removing a key from the local file deletes it remotely and listeners hear about it
#[tokio::test]
async fn test_removed_local_key_is_deleted_and_announced() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("app.toml");
    fs::write(&path, "a = \"1\"\nb = \"2\"\n").unwrap();

    let store = Arc::new(MemoryStore::new());
    let configurator = Configurator::new(store.clone(), watch_config());
    configurator.sync(&path).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    configurator.listen(tx).await.unwrap();
    assert_eq!(drain(&mut rx).len(), 2);

    fs::write(&path, "a = \"1\"\n").unwrap();
    let report = configurator.sync(&path).await.unwrap();

    assert_eq!(report.deletes, vec!["/micro/config/b"]);
    assert!(report.ticked);
    assert_eq!(drain(&mut rx), vec![ChangeEvent::delete("/micro/config/b")]);
    assert_eq!(store.snapshot().len(), 1);

    configurator.close().await.unwrap();
}
