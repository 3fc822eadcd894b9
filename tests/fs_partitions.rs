//! File-backed partitions survive restarts and version changes.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tempfile::TempDir;

use vellum::network::{
    CacheRegistry, FsPartitions, NetworkConfig, PartitionError, PartitionKind, PartitionStore,
    ResponseSnapshot,
};

fn response(body: &str) -> ResponseSnapshot {
    ResponseSnapshot::new(200, body.to_string()).with_header("content-type", "text/css")
}

fn registry(root: &TempDir, version: &str) -> CacheRegistry {
    let store = Arc::new(FsPartitions::new(root.path()));
    CacheRegistry::new(
        store,
        NetworkConfig {
            version: version.to_string(),
            name_prefix: "site".to_string(),
            image_cap: 2,
            ..NetworkConfig::default()
        },
    )
}

#[tokio::test]
async fn entries_survive_a_reopen() {
    let dir = TempDir::new().unwrap();
    let key = "https://example.com/assets/site.css?v=3";

    FsPartitions::new(dir.path())
        .put("site-static-1", key, &response("body{}"))
        .await
        .unwrap();

    let reopened = FsPartitions::new(dir.path());
    let stored = reopened.get("site-static-1", key).await.unwrap().unwrap();
    assert_eq!(stored, response("body{}"));
    assert_eq!(stored.header("Content-Type"), Some("text/css"));
    assert_eq!(reopened.keys("site-static-1").await.unwrap(), vec![key]);
}

#[tokio::test]
async fn binary_bodies_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = FsPartitions::new(dir.path());
    let png = ResponseSnapshot::new(200, vec![0x89, b'P', b'N', b'G', 0, 0xff]);

    store.put("site-images-1", "cover.png", &png).await.unwrap();
    assert_eq!(
        store.get("site-images-1", "cover.png").await.unwrap(),
        Some(png)
    );
}

#[tokio::test]
async fn rewriting_a_key_moves_it_to_newest() {
    let dir = TempDir::new().unwrap();
    let store = FsPartitions::new(dir.path());
    for key in ["a", "b", "c"] {
        store.put("p", key, &response(key)).await.unwrap();
    }
    store.put("p", "a", &response("again")).await.unwrap();

    assert_eq!(store.keys("p").await.unwrap(), vec!["b", "c", "a"]);
    assert!(store.delete("p", "b").await.unwrap());
    assert!(!store.delete("p", "b").await.unwrap());
    assert_eq!(store.keys("p").await.unwrap(), vec!["c", "a"]);
}

#[tokio::test]
async fn stray_files_are_ignored() {
    let dir = TempDir::new().unwrap();
    let store = FsPartitions::new(dir.path());
    store.put("p", "a", &response("1")).await.unwrap();
    std::fs::write(dir.path().join("p").join("notes.txt"), "hello").unwrap();
    std::fs::write(dir.path().join("loose-file"), "hello").unwrap();

    assert_eq!(store.keys("p").await.unwrap(), vec!["a"]);
    assert_eq!(store.partition_names().await.unwrap(), vec!["p"]);
}

#[tokio::test]
async fn names_that_leave_the_root_are_rejected() {
    let dir = TempDir::new().unwrap();
    let store = FsPartitions::new(dir.path());

    let err = store
        .put("../outside", "a", &response("1"))
        .await
        .unwrap_err();
    assert!(matches!(err, PartitionError::InvalidName(_)));
    assert!(matches!(
        store.open(".hidden").await,
        Err(PartitionError::InvalidName(_))
    ));
}

#[tokio::test]
async fn activation_on_disk_replaces_the_old_version() {
    let dir = TempDir::new().unwrap();

    let old = registry(&dir, "1");
    old.activate().await.unwrap();
    old.store()
        .put(
            &old.partition_name(PartitionKind::Static),
            "https://example.com/",
            &response("old"),
        )
        .await
        .unwrap();

    let new = registry(&dir, "2");
    let deleted = new.activate().await.unwrap();
    assert_eq!(deleted.len(), 3);
    assert!(!dir.path().join("site-static-1").exists());
    assert!(dir.path().join("site-static-2").is_dir());

    let stats = new.stats().await.unwrap();
    assert_eq!(stats.version, "2");
    assert_eq!(stats.partitions.len(), 3);
    assert!(stats.partitions.iter().all(|p| p.entries == 0));
}

#[tokio::test]
async fn image_trim_keeps_the_newest_files() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir, "1");
    let name = registry.partition_name(PartitionKind::Images);
    for i in 0..4 {
        registry
            .store()
            .put(&name, &format!("img-{i}"), &response("x"))
            .await
            .unwrap();
    }

    assert_eq!(registry.trim_images().await.unwrap(), 2);
    assert_eq!(
        registry.store().keys(&name).await.unwrap(),
        vec!["img-2", "img-3"]
    );
    assert_eq!(registry.trim_images().await.unwrap(), 0);
}

fn entry_file(dir: &TempDir, partition: &str, key: &str, suffix: &str) -> std::path::PathBuf {
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    dir.path().join(partition).join(format!("{digest}{suffix}"))
}

#[tokio::test]
async fn unreadable_entries_do_not_block_trimming() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir, "1");
    let name = registry.partition_name(PartitionKind::Images);
    for i in 0..4 {
        registry
            .store()
            .put(&name, &format!("img-{i}"), &response("x"))
            .await
            .unwrap();
    }
    std::fs::write(entry_file(&dir, &name, "img-1", ".meta"), "{not json").unwrap();

    assert_eq!(
        registry.store().keys(&name).await.unwrap(),
        vec!["img-0", "img-2", "img-3"]
    );
    assert_eq!(registry.trim_images().await.unwrap(), 1);
    assert_eq!(
        registry.store().keys(&name).await.unwrap(),
        vec!["img-2", "img-3"]
    );
    assert!(registry.stats().await.is_ok());
}

#[tokio::test]
async fn listing_does_not_read_response_bodies() {
    let dir = TempDir::new().unwrap();
    let store = FsPartitions::new(dir.path());
    store.put("p", "a", &response("1")).await.unwrap();
    store.put("p", "b", &response("2")).await.unwrap();
    std::fs::write(entry_file(&dir, "p", "a", ".json"), "truncated").unwrap();

    assert_eq!(store.keys("p").await.unwrap(), vec!["a", "b"]);
    assert!(store.delete("p", "a").await.unwrap());
    assert_eq!(store.keys("p").await.unwrap(), vec!["b"]);
}
