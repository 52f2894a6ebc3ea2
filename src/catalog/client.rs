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

//! Typed, rate-limited, caching client for the commercial catalog API
//! (§4.3).

use super::content::{ContentQualityInfo, ContentReference};
use super::dto::{ContentMetadataDto, ProductDto, SearchResponseDto};
use crate::cache::Cache;
use crate::config::CatalogConfig;
use crate::error::{CoreError, Result};
use crate::models::CatalogProduct;
use crate::ratelimit::CatalogRateLimiter;
use futures_util::future::join_all;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::os::unix::fs::PermissionsExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The drm_variant set iterated by `fast_quality_check`; each surfaces one
/// codec family (§4.3).
const DRM_VARIANTS: &[&str] = &["Adrm", "DolbyDigitalPlus", "DolbyAC4"];

pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    credential: String,
    locale: String,
    cache: Arc<Cache>,
    semaphore: Arc<Semaphore>,
    rate_limiter: CatalogRateLimiter,
    catalog_ttl_seconds: i64,
    pricing_ttl_seconds: i64,
    cache_hits: AtomicU64,
    api_calls: AtomicU64,
}

impl CatalogClient {
    pub fn new(
        config: &CatalogConfig,
        base_url: impl Into<String>,
        cache: Arc<Cache>,
        catalog_ttl_hours: f64,
    ) -> Result<Self> {
        let credential = load_credential(config)?;
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
            locale: config.locale.clone(),
            cache,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            rate_limiter: CatalogRateLimiter::new(
                config.rate_limit_interval_seconds,
                config.requests_per_minute,
                config.burst_size,
                config.backoff_multiplier,
                config.max_backoff_seconds,
            ),
            catalog_ttl_seconds: (catalog_ttl_hours * 3600.0) as i64,
            pricing_ttl_seconds: 3600,
            cache_hits: AtomicU64::new(0),
            api_calls: AtomicU64::new(0),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Running (cache_hits, api_calls) totals since construction, consulted
    /// by the Upgrade Finder to report enrichment-phase counters (§4.7).
    pub fn cache_stats(&self) -> (u64, u64) {
        (self.cache_hits.load(Ordering::Relaxed), self.api_calls.load(Ordering::Relaxed))
    }

    fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        self.rate_limiter.acquire().await;

        let mut all_query: Vec<(&str, String)> = query.to_vec();
        all_query.push(("response_groups", "relationships,series,price,product_attrs".to_string()));

        let response = self
            .http
            .request(method, self.url(path))
            .bearer_auth(&self.credential)
            .query(&[("locale", self.locale.clone())])
            .query(&all_query)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(CoreError::Unauthorized(path.to_string())),
            StatusCode::FORBIDDEN => Err(CoreError::Forbidden(path.to_string())),
            StatusCode::NOT_FOUND => Err(CoreError::not_found(path)),
            StatusCode::TOO_MANY_REQUESTS => {
                self.rate_limiter.handle_rate_limit_error().await;
                let retry_response = self
                    .http
                    .request(Method::GET, self.url(path))
                    .bearer_auth(&self.credential)
                    .query(&all_query)
                    .send()
                    .await?;
                let text = retry_response.text().await?;
                serde_json::from_str(&text).map_err(|e| CoreError::validation(path, e.to_string()))
            }
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

    /// The set of external_ids already owned on the catalog-side account,
    /// used by the Enrichment Service's ownership check. Cached under
    /// "library_wishlist" alongside the other account-scoped namespaces.
    pub async fn owned_external_ids(&self) -> Result<std::collections::HashSet<String>> {
        const CACHE_KEY: &str = "owned";
        if let Some(cached) = self
            .cache
            .get_typed::<Vec<String>>("library_wishlist", CACHE_KEY)
            .await
        {
            self.record_cache_hit();
            return Ok(cached.into_iter().collect());
        }

        #[derive(serde::Deserialize)]
        struct OwnedLibraryResponseDto {
            #[serde(default)]
            items: Vec<OwnedItemDto>,
        }
        #[derive(serde::Deserialize)]
        struct OwnedItemDto {
            asin: String,
        }

        let response: OwnedLibraryResponseDto = self.request_json(Method::GET, "/library", &[]).await?;
        let ids: Vec<String> = response.items.into_iter().map(|i| i.asin).collect();
        let _ = self
            .cache
            .set("library_wishlist", CACHE_KEY, &ids, self.pricing_ttl_seconds)
            .await;
        Ok(ids.into_iter().collect())
    }

    pub async fn get_product(&self, external_id: &str) -> Result<CatalogProduct> {
        if let Some(cached) = self
            .cache
            .get_typed::<CatalogProduct>("catalog_product", external_id)
            .await
        {
            self.record_cache_hit();
            return Ok(cached);
        }

        let dto: ProductDto = self
            .request_json(Method::GET, &format!("/products/{external_id}"), &[])
            .await?;
        let product: CatalogProduct = dto.into();
        let _ = self
            .cache
            .set("catalog_product", external_id, &product, self.catalog_ttl_seconds)
            .await;
        Ok(product)
    }

    pub async fn search(
        &self,
        keywords: Option<&str>,
        author: Option<&str>,
        narrator: Option<&str>,
        title: Option<&str>,
    ) -> Result<Vec<CatalogProduct>> {
        let mut query = Vec::new();
        if let Some(k) = keywords {
            query.push(("keywords", k.to_string()));
        }
        if let Some(a) = author {
            query.push(("author", a.to_string()));
        }
        if let Some(n) = narrator {
            query.push(("narrator", n.to_string()));
        }
        if let Some(t) = title {
            query.push(("title", t.to_string()));
        }

        let cache_key = format!("{keywords:?}|{author:?}|{narrator:?}|{title:?}");
        if let Some(cached) = self
            .cache
            .get_typed::<Vec<CatalogProduct>>("catalog_search", &cache_key)
            .await
        {
            self.record_cache_hit();
            return Ok(cached);
        }

        let response: SearchResponseDto = self.request_json(Method::GET, "/catalog/products", &query).await?;
        let products: Vec<CatalogProduct> = response.products.into_iter().map(Into::into).collect();
        let _ = self
            .cache
            .set("catalog_search", &cache_key, &products, self.catalog_ttl_seconds)
            .await;
        Ok(products)
    }

    pub async fn similar_products(&self, external_id: &str, similarity_type: &str) -> Result<Vec<CatalogProduct>> {
        let cache_key = format!("{external_id}:{similarity_type}");
        if let Some(cached) = self
            .cache
            .get_typed::<Vec<CatalogProduct>>("catalog_sims", &cache_key)
            .await
        {
            self.record_cache_hit();
            return Ok(cached);
        }

        let response: SearchResponseDto = self
            .request_json(
                Method::GET,
                &format!("/catalog/products/{external_id}/sims"),
                &[("similarity_type", similarity_type.to_string())],
            )
            .await?;
        let products: Vec<CatalogProduct> = response.products.into_iter().map(Into::into).collect();
        let _ = self
            .cache
            .set("catalog_sims", &cache_key, &products, self.catalog_ttl_seconds)
            .await;
        Ok(products)
    }

    /// The primary series-discovery primitive (§4.3): everything the catalog
    /// considers in the same series as `seed_external_id`.
    pub async fn series_books(&self, seed_external_id: &str) -> Result<Vec<CatalogProduct>> {
        self.similar_products(seed_external_id, "same-series").await
    }

    /// Metadata-based format discovery; ~3x faster than `license_request`
    /// and preferred when a single drm_variant suffices.
    pub async fn content_metadata(
        &self,
        external_id: &str,
        quality: &str,
        drm_variant: Option<&str>,
    ) -> Result<ContentReference> {
        let mut query = vec![("quality", quality.to_string())];
        if let Some(v) = drm_variant {
            query.push(("drm_type", v.to_string()));
        }

        let dto: ContentMetadataDto = self
            .request_json(Method::GET, &format!("/content/{external_id}/metadata"), &query)
            .await?;
        Ok(ContentReference {
            codec: dto.content_reference.codec,
            content_size_bytes: dto.content_reference.content_size_in_bytes,
            runtime_ms: dto.content_reference.runtime_length_ms,
        })
    }

    /// The slower, exhaustive format-discovery path, used only when
    /// metadata-based discovery is insufficient.
    pub async fn license_request(
        &self,
        external_id: &str,
        codecs: &[&str],
        drm_types: &[&str],
        spatial: Option<bool>,
    ) -> Result<ContentReference> {
        let mut query: Vec<(&str, String)> = Vec::new();
        for codec in codecs {
            query.push(("codec", codec.to_string()));
        }
        for drm_type in drm_types {
            query.push(("drm_type", drm_type.to_string()));
        }
        if let Some(spatial) = spatial {
            query.push(("spatial", spatial.to_string()));
        }

        let dto: ContentMetadataDto = self
            .request_json(Method::POST, &format!("/content/{external_id}/licenserequest"), &query)
            .await?;
        Ok(ContentReference {
            codec: dto.content_reference.codec,
            content_size_bytes: dto.content_reference.content_size_in_bytes,
            runtime_ms: dto.content_reference.runtime_length_ms,
        })
    }

    /// Runs `content_metadata` for every configured drm_variant concurrently
    /// and assembles the aggregate result.
    pub async fn fast_quality_check(&self, external_id: &str) -> Result<ContentQualityInfo> {
        if let Some(cached) = self
            .cache
            .get_typed::<ContentQualityInfo>("catalog_quality", external_id)
            .await
        {
            self.record_cache_hit();
            return Ok(cached);
        }

        let futures = DRM_VARIANTS
            .iter()
            .map(|variant| self.content_metadata(external_id, "High", Some(variant)));
        let outcomes = join_all(futures).await;

        let formats: Vec<ContentReference> = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                Ok(reference) => Some(reference),
                Err(e) => {
                    tracing::warn!(external_id, error = %e, "drm variant metadata fetch failed, skipping");
                    None
                }
            })
            .collect();

        let info = ContentQualityInfo::from_formats(formats);
        let _ = self
            .cache
            .set("catalog_quality", external_id, &info, self.pricing_ttl_seconds)
            .await;
        Ok(info)
    }
}

/// Opens the pre-issued credential file once, at construction. Decryption of
/// an encrypted credential file is the responsibility of an adjacent module
/// and out of scope here; this loads a plaintext bearer token.
fn load_credential(config: &CatalogConfig) -> Result<String> {
    if let Some(password) = &config.auth_password {
        return Ok(password.clone());
    }

    if config.auth_file_path.is_empty() {
        return Err(CoreError::configuration(
            "catalog.auth_file_path must be set (or CATALOG_AUTH_PASSWORD)",
        ));
    }

    let metadata = std::fs::metadata(&config.auth_file_path)?;
    let mode = metadata.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        return Err(CoreError::InsecureCredentialFile {
            path: config.auth_file_path.clone(),
            mode,
        });
    }

    let contents = std::fs::read_to_string(&config.auth_file_path)?;
    Ok(contents.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_client() -> CatalogClient {
        let cache = Arc::new(Cache::open_in_memory(100).await.unwrap());
        let config = CatalogConfig {
            auth_password: Some("token".to_string()),
            ..CatalogConfig::default()
        };
        CatalogClient::new(&config, "https://catalog.example.invalid", cache, 24.0).unwrap()
    }

    #[tokio::test]
    async fn url_joins_base_and_path() {
        let client = test_client().await;
        assert_eq!(client.url("/library"), "https://catalog.example.invalid/library");
    }

    #[tokio::test]
    async fn cache_stats_start_at_zero() {
        let client = test_client().await;
        assert_eq!(client.cache_stats(), (0, 0));
    }

    #[tokio::test]
    async fn cache_hit_is_recorded_without_an_api_call() {
        let client = test_client().await;
        let _ = client
            .cache
            .set("catalog_product", "EX001", &serde_json::json!({"title": "x"}), 3600)
            .await;
        client.record_cache_hit();
        let (hits, calls) = client.cache_stats();
        assert_eq!(hits, 1);
        assert_eq!(calls, 0);
    }
}
