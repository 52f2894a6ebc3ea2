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

//! Typed, rate-limited, caching client for the self-hosted Library API
//! (§4.2).

use super::dto::{ItemDto, ItemsPageResponse, SeriesListResponseDto};
use crate::cache::Cache;
use crate::config::LibraryConfig;
use crate::error::{CoreError, Result};
use crate::models::{LibraryItem, LocalSeries};
use crate::ratelimit::IntervalLimiter;
use futures_util::stream::{FuturesUnordered, StreamExt};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const INITIAL_RETRY_DELAY_SECS: u64 = 1;

pub struct LibraryClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    cache: Arc<Cache>,
    semaphore: Arc<Semaphore>,
    batch_semaphore: Arc<Semaphore>,
    rate_limiter: IntervalLimiter,
    library_ttl_seconds: i64,
}

impl LibraryClient {
    pub fn new(config: &LibraryConfig, cache: Arc<Cache>, library_ttl_hours: f64) -> Result<Self> {
        if config.host.is_empty() {
            return Err(CoreError::configuration("library.host must be set"));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: config.host.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            cache,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            batch_semaphore: Arc::new(Semaphore::new(config.batch_max_concurrent.max(1))),
            rate_limiter: IntervalLimiter::new(config.rate_limit_interval_seconds),
            library_ttl_seconds: (library_ttl_hours * 3600.0) as i64,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The standard rate-limited, semaphore-bounded, retrying path. Every
    /// public operation except the batch fetcher goes through this.
    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        self.rate_limiter.wait().await;
        self.execute_with_retry(method, path, query).await
    }

    async fn execute_with_retry<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let response = self
                .http
                .request(method.clone(), self.url(path))
                .bearer_auth(&self.api_key)
                .query(query)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) if e.is_timeout() => {
                    if attempt >= 2 {
                        return Err(CoreError::Timeout(REQUEST_TIMEOUT));
                    }
                    tracing::warn!(path, attempt, "library request timed out, retrying");
                    tokio::time::sleep(Duration::from_secs(INITIAL_RETRY_DELAY_SECS)).await;
                    continue;
                }
                Err(e) => {
                    if attempt >= 2 {
                        return Err(CoreError::Transport(e.to_string()));
                    }
                    tracing::warn!(path, attempt, error = %e, "library transport error, retrying");
                    tokio::time::sleep(Duration::from_secs(INITIAL_RETRY_DELAY_SECS)).await;
                    continue;
                }
            };

            match response.status() {
                StatusCode::UNAUTHORIZED => return Err(CoreError::Unauthorized(path.to_string())),
                StatusCode::FORBIDDEN => return Err(CoreError::Forbidden(path.to_string())),
                StatusCode::NOT_FOUND => return Err(CoreError::not_found(path)),
                StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(INITIAL_RETRY_DELAY_SECS);
                    tokio::time::sleep(Duration::from_secs(retry_after)).await;
                    if attempt >= 2 {
                        return Err(CoreError::RateLimit {
                            retry_after_seconds: retry_after,
                        });
                    }
                    continue;
                }
                status if status.is_server_error() => {
                    if attempt >= 2 {
                        return Err(CoreError::HttpStatus {
                            status: status.as_u16(),
                            message: "server error".to_string(),
                        });
                    }
                    let delay = INITIAL_RETRY_DELAY_SECS * 2u64.pow(attempt - 1);
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    continue;
                }
                status if status.is_success() => {
                    let text = response.text().await.map_err(CoreError::from)?;
                    return serde_json::from_str(&text)
                        .map_err(|e| CoreError::validation(path, e.to_string()));
                }
                status => {
                    return Err(CoreError::HttpStatus {
                        status: status.as_u16(),
                        message: "unexpected status".to_string(),
                    });
                }
            }
        }
    }

    /// Direct, rate-limit-bypassing request used only by the batch path
    /// against a local server (§9 Large-return batch fetchers).
    async fn batch_request_raw(&self, path: &str) -> Result<ItemDto> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .query(&[("expanded", "1")])
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(CoreError::Unauthorized(path.to_string())),
            StatusCode::NOT_FOUND => Err(CoreError::not_found(path)),
            status if status.is_success() => {
                let text = response.text().await?;
                serde_json::from_str(&text).map_err(|e| CoreError::validation(path, e.to_string()))
            }
            status => Err(CoreError::HttpStatus {
                status: status.as_u16(),
                message: "unexpected status".to_string(),
            }),
        }
    }

    pub async fn whoami(&self) -> Result<serde_json::Value> {
        self.request_json(Method::GET, "/me", &[]).await
    }

    pub async fn list_libraries(&self) -> Result<serde_json::Value> {
        self.request_json(Method::GET, "/libraries", &[]).await
    }

    pub async fn library_stats(&self, library_id: &str) -> Result<serde_json::Value> {
        self.request_json(Method::GET, &format!("/libraries/{library_id}/stats"), &[])
            .await
    }

    pub async fn list_item_ids(&self, library_id: &str) -> Result<Vec<String>> {
        let page: ItemsPageResponse = self
            .request_json(
                Method::GET,
                &format!("/libraries/{library_id}/items"),
                &[("limit", "0".to_string())],
            )
            .await?;
        Ok(page.results.into_iter().map(|i| i.id).collect())
    }

    /// Single-item fetch, cached under "lib_items", going through the
    /// standard rate-limited path.
    pub async fn get_item(&self, item_id: &str) -> Result<LibraryItem> {
        let cache_key = item_id;
        if let Some(cached) = self.cache.get_typed::<LibraryItem>("lib_items", cache_key).await {
            return Ok(cached);
        }

        let dto: ItemDto = self
            .request_json(
                Method::GET,
                &format!("/items/{item_id}"),
                &[("expanded", "1".to_string())],
            )
            .await?;
        let item: LibraryItem = dto.into();
        let _ = self.cache.set("lib_items", cache_key, &item, self.library_ttl_seconds).await;
        Ok(item)
    }

    /// Batch item fetch contract (§4.2): given N identifiers, returns at
    /// most N items, one per successful fetch, in arbitrary order; failures
    /// are logged and omitted. Bypasses the standard rate limiter and uses
    /// its own, wider concurrency bound. Cache is consulted before fan-out
    /// and populated inside each worker.
    pub async fn batch_get_items(
        &self,
        item_ids: &[String],
        progress_callback: Option<&(dyn Fn(usize, usize) + Send + Sync)>,
    ) -> Vec<LibraryItem> {
        let total = item_ids.len();
        let mut results = Vec::with_capacity(total);
        let mut to_fetch = Vec::new();

        for id in item_ids {
            if let Some(cached) = self.cache.get_typed::<LibraryItem>("lib_items", id).await {
                results.push(cached);
            } else {
                to_fetch.push(id.clone());
            }
        }

        let completed = Arc::new(std::sync::atomic::AtomicUsize::new(results.len()));
        if let Some(cb) = progress_callback {
            cb(completed.load(std::sync::atomic::Ordering::Relaxed), total);
        }

        let mut in_flight = FuturesUnordered::new();
        for id in to_fetch {
            let permit = self.batch_semaphore.clone();
            let this_id = id.clone();
            in_flight.push(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore closed");
                let outcome = self.batch_request_raw(&format!("/items/{this_id}")).await;
                (this_id, outcome)
            });
        }

        while let Some((id, outcome)) = in_flight.next().await {
            match outcome {
                Ok(dto) => {
                    let item: LibraryItem = dto.into();
                    let _ = self
                        .cache
                        .set("lib_items", &id, &item, self.library_ttl_seconds)
                        .await;
                    results.push(item);
                }
                Err(e) => {
                    tracing::warn!(item_id = %id, error = %e, "batch item fetch failed, skipping");
                }
            }

            let done = completed.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
            if let Some(cb) = progress_callback {
                cb(done, total);
            }
        }

        results
    }

    pub async fn authors(&self, library_id: &str) -> Result<serde_json::Value> {
        self.request_json(Method::GET, &format!("/libraries/{library_id}/authors"), &[])
            .await
    }

    pub async fn series_summary(&self, library_id: &str) -> Result<serde_json::Value> {
        self.request_json(Method::GET, &format!("/libraries/{library_id}/series"), &[])
            .await
    }

    /// The full typed series list, each with its member books — used by the
    /// Series Matcher's discovery and whole-library analysis.
    pub async fn list_local_series(&self, library_id: &str) -> Result<Vec<LocalSeries>> {
        let response: SeriesListResponseDto = self
            .request_json(
                Method::GET,
                &format!("/libraries/{library_id}/series"),
                &[("include", "books".to_string())],
            )
            .await?;
        Ok(response.results.into_iter().map(Into::into).collect())
    }

    pub async fn search(&self, library_id: &str, query: &str, limit: u32) -> Result<serde_json::Value> {
        self.request_json(
            Method::GET,
            &format!("/libraries/{library_id}/search"),
            &[("q", query.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    pub async fn list_collections(&self) -> Result<serde_json::Value> {
        self.request_json(Method::GET, "/collections", &[]).await
    }

    pub async fn create_collection(&self, name: &str, library_id: &str) -> Result<serde_json::Value> {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        self.rate_limiter.wait().await;
        let response = self
            .http
            .post(self.url("/collections"))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "name": name, "libraryId": library_id }))
            .send()
            .await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| CoreError::validation("create_collection", e.to_string()))
    }

    pub async fn add_items_to_collection(&self, collection_id: &str, item_ids: &[String]) -> Result<()> {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        self.rate_limiter.wait().await;
        self.http
            .post(self.url(&format!("/collections/{collection_id}/batch/add")))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "items": item_ids }))
            .send()
            .await?;
        Ok(())
    }

    /// Find a collection by name within a library, creating it if absent.
    pub async fn find_or_create_collection(&self, name: &str, library_id: &str) -> Result<serde_json::Value> {
        let collections = self.list_collections().await?;
        if let Some(found) = collections
            .get("results")
            .and_then(|r| r.as_array())
            .and_then(|arr| arr.iter().find(|c| c.get("name").and_then(|n| n.as_str()) == Some(name)))
        {
            return Ok(found.clone());
        }
        self.create_collection(name, library_id).await
    }
}
