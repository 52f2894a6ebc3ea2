// Copyright (C) 2026 the project contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Persistent, namespaced, TTL-bounded key-value store with content-indexed
//! search and cross-source entity mapping (§4.1).
//!
//! A hot in-process layer ([`hot::HotCache`]) sits in front of the SQLite
//! store so repeated reads within one scan never touch disk. The store
//! itself is safe for concurrent use: sqlx serializes writes against the
//! pool, and the hot layer is guarded by a single mutex.

mod database;
mod hot;
mod metadata;
mod migrations;
mod ttl;

pub use ttl::{effective_ttl_seconds, is_pricing_namespace, seconds_until_next_calendar_month_utc};

use crate::error::{CoreError, Result};
use crate::models::CrossSourceMapping;
use chrono::{DateTime, Utc};
use database::Database;
use hot::HotCache;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    pub total_entries: i64,
    pub namespace_counts: HashMap<String, i64>,
    pub expired_count: i64,
    pub mapping_count: i64,
    pub db_size_bytes: u64,
}

pub struct Cache {
    db: Database,
    hot: HotCache,
}

impl Cache {
    pub async fn open(path: impl AsRef<Path>, max_memory_entries: usize) -> Result<Self> {
        Ok(Self {
            db: Database::open(path).await?,
            hot: HotCache::new(max_memory_entries),
        })
    }

    pub async fn open_in_memory(max_memory_entries: usize) -> Result<Self> {
        Ok(Self {
            db: Database::open_in_memory().await?,
            hot: HotCache::new(max_memory_entries),
        })
    }

    /// Returns absent if the entry is missing or expired; an expired entry
    /// is a miss, never surfaced as stale.
    pub async fn get(&self, namespace: &str, key: &str) -> Option<serde_json::Value> {
        let now = Utc::now();
        if let Some(payload) = self.hot.get(namespace, key, now) {
            return Some(payload);
        }

        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT payload, expires_at FROM entries WHERE namespace = ? AND key = ? AND expires_at > ?",
        )
        .bind(namespace)
        .bind(key)
        .bind(now.to_rfc3339())
        .fetch_optional(self.db.pool())
        .await
        .ok()
        .flatten();

        let (payload_text, expires_at_text) = row?;
        let expires_at = DateTime::parse_from_rfc3339(&expires_at_text)
            .ok()?
            .with_timezone(&Utc);

        match serde_json::from_str::<serde_json::Value>(&payload_text) {
            Ok(payload) => {
                self.hot.put(namespace, key, payload.clone(), expires_at);
                Some(payload)
            }
            Err(_) => {
                // Corrupt payload: treat as absent and delete (§4.1 Failures).
                let _ = self.delete(namespace, key).await;
                None
            }
        }
    }

    pub async fn get_typed<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        let value = self.get(namespace, key).await?;
        serde_json::from_value(value).ok()
    }

    /// Overwrites any existing entry at (namespace, key). `ttl_seconds` is
    /// clamped by the calendar-boundary rule when `namespace` is a pricing
    /// namespace.
    pub async fn set<T: Serialize>(
        &self,
        namespace: &str,
        key: &str,
        payload: &T,
        ttl_seconds: i64,
    ) -> Result<()> {
        let payload_value = serde_json::to_value(payload)?;
        let now = Utc::now();
        let effective_ttl = effective_ttl_seconds(namespace, ttl_seconds, now);
        let expires_at = now + chrono::Duration::seconds(effective_ttl.max(0));
        let meta = metadata::extract_metadata(namespace, &payload_value);
        let payload_text = serde_json::to_string(&payload_value)?;

        let result = sqlx::query(
            r#"
            INSERT INTO entries (namespace, key, payload, created_at, expires_at, external_id, title, author, source)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(namespace, key) DO UPDATE SET
                payload = excluded.payload,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at,
                external_id = excluded.external_id,
                title = excluded.title,
                author = excluded.author,
                source = excluded.source
            "#,
        )
        .bind(namespace)
        .bind(key)
        .bind(&payload_text)
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .bind(&meta.external_id)
        .bind(&meta.title)
        .bind(&meta.author)
        .bind(&meta.source)
        .execute(self.db.pool())
        .await;

        match result {
            Ok(_) => {
                self.hot.put(namespace, key, payload_value, expires_at);
                Ok(())
            }
            Err(e) => {
                // Cache writes are never load-bearing for correctness.
                tracing::warn!(namespace, key, error = %e, "cache set failed, continuing without caching");
                Ok(())
            }
        }
    }

    pub async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM entries WHERE namespace = ? AND key = ?")
            .bind(namespace)
            .bind(key)
            .execute(self.db.pool())
            .await?;
        self.hot.remove(namespace, key);
        Ok(())
    }

    pub async fn clear_namespace(&self, namespace: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM entries WHERE namespace = ?")
            .bind(namespace)
            .execute(self.db.pool())
            .await?;
        self.hot.remove_namespace_prefix(namespace);
        Ok(result.rows_affected())
    }

    pub async fn delete_by_pattern(&self, namespace: &str, glob: &str) -> Result<u64> {
        let like_pattern = glob.replace('*', "%").replace('?', "_");
        let result = sqlx::query("DELETE FROM entries WHERE namespace = ? AND key LIKE ?")
            .bind(namespace)
            .bind(&like_pattern)
            .execute(self.db.pool())
            .await?;
        self.hot.remove_namespace_prefix(namespace);
        Ok(result.rows_affected())
    }

    /// Removes every entry whose extracted external_id equals `external_id`
    /// or whose key contains it as a substring, across every namespace.
    /// Returns counts per namespace that had at least one row removed.
    pub async fn invalidate_by_external_id(&self, external_id: &str) -> Result<HashMap<String, u64>> {
        let like_key = format!("%{external_id}%");
        let namespaces: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT namespace FROM entries WHERE external_id = ? OR key LIKE ?",
        )
        .bind(external_id)
        .bind(&like_key)
        .fetch_all(self.db.pool())
        .await?;

        let mut result = HashMap::new();
        for namespace in namespaces {
            let deleted = sqlx::query(
                "DELETE FROM entries WHERE namespace = ? AND (external_id = ? OR key LIKE ?)",
            )
            .bind(&namespace)
            .bind(external_id)
            .bind(&like_key)
            .execute(self.db.pool())
            .await?;
            self.hot.remove_namespace_prefix(&namespace);
            if deleted.rows_affected() > 0 {
                result.insert(namespace, deleted.rows_affected());
            }
        }
        Ok(result)
    }

    pub async fn touch(&self, namespace: &str, key: &str, new_ttl_seconds: i64) -> Result<bool> {
        let now = Utc::now();
        let effective_ttl = effective_ttl_seconds(namespace, new_ttl_seconds, now);
        let expires_at = now + chrono::Duration::seconds(effective_ttl.max(0));

        let result = sqlx::query("UPDATE entries SET expires_at = ? WHERE namespace = ? AND key = ?")
            .bind(expires_at.to_rfc3339())
            .bind(namespace)
            .bind(key)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() > 0 {
            if let Some(payload) = self.get(namespace, key).await {
                self.hot.put(namespace, key, payload, expires_at);
            }
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub async fn search_by_external_id(
        &self,
        external_id: &str,
        source: Option<&str>,
    ) -> Result<Vec<(String, String, serde_json::Value)>> {
        let now = Utc::now().to_rfc3339();
        let rows: Vec<(String, String, String)> = if let Some(source) = source {
            sqlx::query_as(
                "SELECT namespace, key, payload FROM entries WHERE external_id = ? AND source = ? AND expires_at > ?",
            )
            .bind(external_id)
            .bind(source)
            .bind(&now)
            .fetch_all(self.db.pool())
            .await?
        } else {
            sqlx::query_as(
                "SELECT namespace, key, payload FROM entries WHERE external_id = ? AND expires_at > ?",
            )
            .bind(external_id)
            .bind(&now)
            .fetch_all(self.db.pool())
            .await?
        };

        Ok(rows
            .into_iter()
            .filter_map(|(ns, key, payload)| {
                serde_json::from_str(&payload).ok().map(|p| (ns, key, p))
            })
            .collect())
    }

    /// BM25-ranked full-text search over (title, author). Lower bm25() score
    /// is better, so results are returned in ascending score order.
    pub async fn search_full_text(
        &self,
        query: &str,
        limit: i64,
    ) -> Result<Vec<(String, String, serde_json::Value)>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT e.namespace, e.key, e.payload
            FROM entries_fts f
            JOIN entries e ON e.id = f.rowid
            WHERE entries_fts MATCH ? AND e.expires_at > ?
            ORDER BY bm25(entries_fts)
            LIMIT ?
            "#,
        )
        .bind(query)
        .bind(Utc::now().to_rfc3339())
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(ns, key, payload)| {
                serde_json::from_str(&payload).ok().map(|p| (ns, key, p))
            })
            .collect())
    }

    pub async fn mapping_upsert(&self, mapping: &CrossSourceMapping) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO mappings (external_id, local_id, local_path, canonical_external_id, title, author, confidence, matched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO UPDATE SET
                local_id = excluded.local_id,
                local_path = excluded.local_path,
                canonical_external_id = excluded.canonical_external_id,
                title = excluded.title,
                author = excluded.author,
                confidence = excluded.confidence,
                matched_at = excluded.matched_at
            "#,
        )
        .bind(&mapping.external_id)
        .bind(&mapping.local_id)
        .bind(&mapping.local_path)
        .bind(&mapping.canonical_external_id)
        .bind(&mapping.title)
        .bind(&mapping.author)
        .bind(mapping.confidence)
        .bind(mapping.matched_at.to_rfc3339())
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn mapping_get(&self, external_id: &str) -> Result<Option<CrossSourceMapping>> {
        self.fetch_mapping("external_id = ?", external_id).await
    }

    pub async fn mapping_get_by_local_id(&self, local_id: &str) -> Result<Option<CrossSourceMapping>> {
        self.fetch_mapping("local_id = ?", local_id).await
    }

    async fn fetch_mapping(&self, clause: &str, bound: &str) -> Result<Option<CrossSourceMapping>> {
        let query = format!(
            "SELECT external_id, local_id, local_path, canonical_external_id, title, author, confidence, matched_at FROM mappings WHERE {clause}"
        );
        let row: Option<MappingRow> = sqlx::query_as(&query)
            .bind(bound)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    /// Local items present in `local_ids` that have no row in `mappings`
    /// with a non-null canonical_external_id yet.
    pub async fn mapping_unmapped_local_items(&self, local_ids: &[String]) -> Result<Vec<String>> {
        if local_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mapped: Vec<String> = sqlx::query_scalar(
            "SELECT local_id FROM mappings WHERE local_id IS NOT NULL AND canonical_external_id IS NOT NULL",
        )
        .fetch_all(self.db.pool())
        .await?;
        let mapped_set: std::collections::HashSet<_> = mapped.into_iter().collect();
        Ok(local_ids
            .iter()
            .filter(|id| !mapped_set.contains(*id))
            .cloned()
            .collect())
    }

    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM entries WHERE expires_at <= ?")
            .bind(Utc::now().to_rfc3339())
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_stats(&self) -> Result<CacheStats> {
        let total_entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(self.db.pool())
            .await?;

        let expired_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE expires_at <= ?")
            .bind(Utc::now().to_rfc3339())
            .fetch_one(self.db.pool())
            .await?;

        let mapping_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mappings")
            .fetch_one(self.db.pool())
            .await?;

        let namespace_rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT namespace, COUNT(*) FROM entries GROUP BY namespace")
                .fetch_all(self.db.pool())
                .await?;

        let db_size_bytes = self
            .db
            .path()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(CacheStats {
            total_entries,
            namespace_counts: namespace_rows.into_iter().collect(),
            expired_count,
            mapping_count,
            db_size_bytes,
        })
    }

    pub fn hot_len(&self) -> usize {
        self.hot.len()
    }
}

#[derive(sqlx::FromRow)]
struct MappingRow {
    external_id: String,
    local_id: Option<String>,
    local_path: Option<String>,
    canonical_external_id: Option<String>,
    title: Option<String>,
    author: Option<String>,
    confidence: Option<f64>,
    matched_at: String,
}

impl From<MappingRow> for CrossSourceMapping {
    fn from(row: MappingRow) -> Self {
        CrossSourceMapping {
            external_id: row.external_id,
            local_id: row.local_id,
            local_path: row.local_path,
            canonical_external_id: row.canonical_external_id,
            title: row.title,
            author: row.author,
            confidence: row.confidence,
            matched_at: DateTime::parse_from_rfc3339(&row.matched_at)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_cache() -> Cache {
        Cache::open_in_memory(500).await.unwrap()
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = test_cache().await;
        cache.set("catalog_product", "B001", &json!({"title": "Dune"}), 3600).await.unwrap();
        let value = cache.get("catalog_product", "B001").await.unwrap();
        assert_eq!(value["title"], "Dune");
    }

    #[tokio::test]
    async fn get_is_absent_after_expiry() {
        let cache = test_cache().await;
        cache.set("ns", "k", &json!({"v": 1}), -1).await.unwrap();
        assert!(cache.get("ns", "k").await.is_none());
    }

    #[tokio::test]
    async fn touch_extends_ttl() {
        let cache = test_cache().await;
        cache.set("ns", "k", &json!({"v": 1}), -1).await.unwrap();
        assert!(cache.get("ns", "k").await.is_none());
        cache.touch("ns", "k", 3600).await.unwrap();
        assert!(cache.get("ns", "k").await.is_some());
    }

    #[tokio::test]
    async fn invalidate_by_external_id_spans_namespaces() {
        let cache = test_cache().await;
        cache.set("catalog_product", "EX001", &json!({"external_id": "EX001"}), 3600).await.unwrap();
        cache
            .set("lib_items", "local42", &json!({"external_id": "EX001", "title": "x"}), 3600)
            .await
            .unwrap();
        cache.set("pricing_catalog", "EX001", &json!({"external_id": "EX001"}), 3600).await.unwrap();

        let removed = cache.invalidate_by_external_id("EX001").await.unwrap();
        assert_eq!(removed.len(), 3);
        assert!(removed.values().all(|&count| count == 1));

        assert!(cache.get("catalog_product", "EX001").await.is_none());
        assert!(cache.get("lib_items", "local42").await.is_none());
        assert!(cache.get("pricing_catalog", "EX001").await.is_none());
    }

    #[tokio::test]
    async fn corrupt_payload_on_read_is_deleted() {
        let cache = test_cache().await;
        sqlx::query(
            "INSERT INTO entries (namespace, key, payload, created_at, expires_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind("ns")
        .bind("k")
        .bind("{not json")
        .bind(Utc::now().to_rfc3339())
        .bind((Utc::now() + chrono::Duration::hours(1)).to_rfc3339())
        .execute(cache.db.pool())
        .await
        .unwrap();

        assert!(cache.get("ns", "k").await.is_none());
        let row: Option<(String,)> = sqlx::query_as("SELECT key FROM entries WHERE namespace = 'ns'")
            .fetch_optional(cache.db.pool())
            .await
            .unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn mapping_round_trips() {
        let cache = test_cache().await;
        let mapping = CrossSourceMapping {
            external_id: "EX001".into(),
            local_id: Some("local42".into()),
            local_path: Some("/books/x".into()),
            canonical_external_id: Some("EX001".into()),
            title: Some("Dune".into()),
            author: Some("Frank Herbert".into()),
            confidence: Some(95.0),
            matched_at: Utc::now(),
        };
        cache.mapping_upsert(&mapping).await.unwrap();
        let fetched = cache.mapping_get("EX001").await.unwrap().unwrap();
        assert_eq!(fetched.local_id.as_deref(), Some("local42"));

        let by_local = cache.mapping_get_by_local_id("local42").await.unwrap().unwrap();
        assert_eq!(by_local.external_id, "EX001");
    }

    #[tokio::test]
    async fn full_text_search_finds_by_title() {
        let cache = test_cache().await;
        cache
            .set("catalog_product", "B001", &json!({"title": "Dune Messiah", "author": "Frank Herbert"}), 3600)
            .await
            .unwrap();
        let results = cache.search_full_text("Dune", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1, "B001");
    }

    #[tokio::test]
    async fn hot_layer_serves_hits_without_store_roundtrip() {
        let cache = test_cache().await;
        cache.set("ns", "k", &json!({"v": 1}), 3600).await.unwrap();
        assert_eq!(cache.hot_len(), 1);
        assert!(cache.get("ns", "k").await.is_some());
    }
}
