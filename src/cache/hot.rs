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

//! In-process hot layer sitting above the persistent store.
//!
//! A plain mutex-guarded map, keyed by `"{namespace}\u{0}{key}"`. On
//! overflow past `max_entries`, the oldest quarter by `expires_at` is
//! evicted — a deliberately simple policy, not a true LRU, matching the
//! original reference implementation's eviction rule.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

fn composite_key(namespace: &str, key: &str) -> String {
    format!("{namespace}\u{0}{key}")
}

pub struct HotCache {
    entries: Mutex<HashMap<String, (serde_json::Value, DateTime<Utc>)>>,
    max_entries: usize,
}

impl HotCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries,
        }
    }

    pub fn get(&self, namespace: &str, key: &str, now: DateTime<Utc>) -> Option<serde_json::Value> {
        let entries = self.entries.lock().unwrap();
        let composite = composite_key(namespace, key);
        match entries.get(&composite) {
            Some((payload, expires_at)) if *expires_at > now => Some(payload.clone()),
            _ => None,
        }
    }

    pub fn put(&self, namespace: &str, key: &str, payload: serde_json::Value, expires_at: DateTime<Utc>) {
        let mut entries = self.entries.lock().unwrap();
        let composite = composite_key(namespace, key);
        entries.insert(composite, (payload, expires_at));

        if entries.len() > self.max_entries {
            let mut by_expiry: Vec<(String, DateTime<Utc>)> = entries
                .iter()
                .map(|(k, (_, exp))| (k.clone(), *exp))
                .collect();
            by_expiry.sort_by_key(|(_, exp)| *exp);
            let evict_count = by_expiry.len() / 4;
            for (key, _) in by_expiry.into_iter().take(evict_count) {
                entries.remove(&key);
            }
        }
    }

    pub fn remove(&self, namespace: &str, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&composite_key(namespace, key));
    }

    pub fn remove_namespace_prefix(&self, namespace: &str) {
        let mut entries = self.entries.lock().unwrap();
        let prefix = format!("{namespace}\u{0}");
        entries.retain(|k, _| !k.starts_with(&prefix));
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn evicts_oldest_quarter_when_over_cap() {
        let hot = HotCache::new(4);
        let now = Utc::now();
        for i in 0..5 {
            hot.put(
                "ns",
                &format!("k{i}"),
                serde_json::json!(i),
                now + Duration::seconds(i as i64),
            );
        }
        // 5 entries over a cap of 4 evicts floor(5/4) = 1, the oldest.
        assert_eq!(hot.len(), 4);
        assert!(hot.get("ns", "k0", now).is_none());
        assert!(hot.get("ns", "k4", now).is_some());
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let hot = HotCache::new(10);
        let now = Utc::now();
        hot.put("ns", "k", serde_json::json!("v"), now - Duration::seconds(1));
        assert!(hot.get("ns", "k", now).is_none());
    }
}
