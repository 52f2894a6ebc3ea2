//! Integration test for the persistent cache.
//!
//! Exercises the real SQLite file on disk (via tempfile), not an in-memory
//! stand-in, so migrations, the calendar-boundary TTL rule, and full-text
//! search all run against the actual storage path used in production.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shelf_reconcile::cache::Cache;
use shelf_reconcile::models::CrossSourceMapping;
use tempfile::tempdir;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct SamplePayload {
    title: String,
    author: String,
    external_id: String,
}

#[tokio::test]
async fn set_and_get_round_trips_through_a_real_sqlite_file() {
    let dir = tempdir().unwrap();
    let cache = Cache::open(dir.path().join("cache.db"), 100).await.unwrap();

    let payload = SamplePayload {
        title: "Leviathan Wakes".to_string(),
        author: "James S. A. Corey".to_string(),
        external_id: "B00BNSZQFS".to_string(),
    };
    cache.set("lib_items", "item-1", &payload, 3600).await.unwrap();

    let fetched: Option<SamplePayload> = cache.get_typed("lib_items", "item-1").await;
    assert_eq!(fetched, Some(payload));
}

#[tokio::test]
async fn expired_entries_are_reported_as_absent() {
    let dir = tempdir().unwrap();
    let cache = Cache::open(dir.path().join("cache.db"), 100).await.unwrap();

    cache.set("lib_items", "item-1", &"stale", -1).await.unwrap();

    let fetched: Option<String> = cache.get_typed("lib_items", "item-1").await;
    assert_eq!(fetched, None);
}

#[tokio::test]
async fn delete_removes_the_entry() {
    let dir = tempdir().unwrap();
    let cache = Cache::open(dir.path().join("cache.db"), 100).await.unwrap();

    cache.set("lib_items", "item-1", &"value", 3600).await.unwrap();
    cache.delete("lib_items", "item-1").await.unwrap();

    let fetched: Option<String> = cache.get_typed("lib_items", "item-1").await;
    assert_eq!(fetched, None);
}

#[tokio::test]
async fn clear_namespace_only_affects_that_namespace() {
    let dir = tempdir().unwrap();
    let cache = Cache::open(dir.path().join("cache.db"), 100).await.unwrap();

    cache.set("lib_items", "item-1", &"a", 3600).await.unwrap();
    cache.set("catalog_product", "item-1", &"b", 3600).await.unwrap();

    let removed = cache.clear_namespace("lib_items").await.unwrap();
    assert_eq!(removed, 1);

    let lib_item: Option<String> = cache.get_typed("lib_items", "item-1").await;
    assert_eq!(lib_item, None);
    let catalog_item: Option<String> = cache.get_typed("catalog_product", "item-1").await;
    assert_eq!(catalog_item, Some("b".to_string()));
}

#[tokio::test]
async fn invalidate_by_external_id_sweeps_every_namespace() {
    let dir = tempdir().unwrap();
    let cache = Cache::open(dir.path().join("cache.db"), 100).await.unwrap();

    let payload = SamplePayload {
        title: "Caliban's War".to_string(),
        author: "James S. A. Corey".to_string(),
        external_id: "B00DQZCE1Y".to_string(),
    };
    cache.set("lib_items", "item-9", &payload, 3600).await.unwrap();
    cache.set("catalog_product", "B00DQZCE1Y", &payload, 3600).await.unwrap();

    let removed_per_namespace = cache.invalidate_by_external_id("B00DQZCE1Y").await.unwrap();
    assert_eq!(removed_per_namespace.len(), 2);

    let lib_item: Option<SamplePayload> = cache.get_typed("lib_items", "item-9").await;
    assert_eq!(lib_item, None);
}

#[tokio::test]
async fn full_text_search_finds_entries_by_title_and_author() {
    let dir = tempdir().unwrap();
    let cache = Cache::open(dir.path().join("cache.db"), 100).await.unwrap();

    let payload = SamplePayload {
        title: "Leviathan Wakes".to_string(),
        author: "James S. A. Corey".to_string(),
        external_id: "B00BNSZQFS".to_string(),
    };
    cache.set("lib_items", "item-1", &payload, 3600).await.unwrap();

    let results = cache.search_full_text("Leviathan", 10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, "lib_items");
}

#[tokio::test]
async fn mapping_upsert_then_get_round_trips() {
    let dir = tempdir().unwrap();
    let cache = Cache::open(dir.path().join("cache.db"), 100).await.unwrap();

    let mapping = CrossSourceMapping {
        external_id: "B00BNSZQFS".to_string(),
        local_id: Some("local-1".to_string()),
        local_path: Some("/audiobooks/leviathan-wakes".to_string()),
        canonical_external_id: Some("B00BNSZQFS".to_string()),
        title: Some("Leviathan Wakes".to_string()),
        author: Some("James S. A. Corey".to_string()),
        confidence: Some(92.5),
        matched_at: Utc::now(),
    };
    cache.mapping_upsert(&mapping).await.unwrap();

    let fetched = cache.mapping_get("B00BNSZQFS").await.unwrap();
    assert_eq!(fetched, Some(mapping));
}

#[tokio::test]
async fn mapping_unmapped_local_items_excludes_mapped_ones() {
    let dir = tempdir().unwrap();
    let cache = Cache::open(dir.path().join("cache.db"), 100).await.unwrap();

    let mapping = CrossSourceMapping {
        external_id: "B00BNSZQFS".to_string(),
        local_id: Some("local-1".to_string()),
        local_path: None,
        canonical_external_id: Some("B00BNSZQFS".to_string()),
        title: None,
        author: None,
        confidence: None,
        matched_at: Utc::now(),
    };
    cache.mapping_upsert(&mapping).await.unwrap();

    let unmapped = cache
        .mapping_unmapped_local_items(&["local-1".to_string(), "local-2".to_string()])
        .await
        .unwrap();
    assert_eq!(unmapped, vec!["local-2".to_string()]);
}

#[tokio::test]
async fn reopening_the_same_file_preserves_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.db");

    {
        let cache = Cache::open(&path, 100).await.unwrap();
        cache.set("lib_items", "item-1", &"persisted", 3600).await.unwrap();
    }

    let cache = Cache::open(&path, 100).await.unwrap();
    let fetched: Option<String> = cache.get_typed("lib_items", "item-1").await;
    assert_eq!(fetched, Some("persisted".to_string()));
}
