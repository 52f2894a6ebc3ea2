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

//! Layered configuration: file defaults overridden by a handful of
//! documented environment variables. Each sub-struct mirrors one client or
//! service so callers can pass just the slice they need.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_library_rate_limit_interval() -> f64 {
    0.1
}
fn default_library_max_concurrent() -> usize {
    5
}
fn default_library_batch_max_concurrent() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub host: String,
    pub api_key: String,
    #[serde(default = "default_library_rate_limit_interval")]
    pub rate_limit_interval_seconds: f64,
    pub library_id: Option<String>,
    #[serde(default = "default_library_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_library_batch_max_concurrent")]
    pub batch_max_concurrent: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            api_key: String::new(),
            rate_limit_interval_seconds: default_library_rate_limit_interval(),
            library_id: None,
            max_concurrent: default_library_max_concurrent(),
            batch_max_concurrent: default_library_batch_max_concurrent(),
        }
    }
}

fn default_catalog_rate_limit_interval() -> f64 {
    0.5
}
fn default_requests_per_minute() -> f64 {
    20.0
}
fn default_burst_size() -> u32 {
    5
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_max_backoff_seconds() -> f64 {
    60.0
}
fn default_catalog_max_concurrent() -> usize {
    5
}
fn default_locale() -> String {
    "us".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub auth_file_path: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_catalog_rate_limit_interval")]
    pub rate_limit_interval_seconds: f64,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: f64,
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_backoff_seconds")]
    pub max_backoff_seconds: f64,
    #[serde(default = "default_catalog_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(skip_serializing)]
    pub auth_password: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            auth_file_path: String::new(),
            locale: default_locale(),
            rate_limit_interval_seconds: default_catalog_rate_limit_interval(),
            requests_per_minute: default_requests_per_minute(),
            burst_size: default_burst_size(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_seconds: default_max_backoff_seconds(),
            max_concurrent: default_catalog_max_concurrent(),
            auth_password: None,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_db_path() -> String {
    "reconcile-cache.db".to_string()
}
fn default_ttl_hours() -> f64 {
    24.0
}
fn default_library_ttl_hours() -> f64 {
    6.0
}
fn default_catalog_ttl_hours() -> f64 {
    240.0
}
fn default_max_memory_entries() -> usize {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_ttl_hours")]
    pub default_ttl_hours: f64,
    #[serde(default = "default_library_ttl_hours")]
    pub library_ttl_hours: f64,
    #[serde(default = "default_catalog_ttl_hours")]
    pub catalog_ttl_hours: f64,
    #[serde(default = "default_max_memory_entries")]
    pub max_memory_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            db_path: default_db_path(),
            default_ttl_hours: default_ttl_hours(),
            library_ttl_hours: default_library_ttl_hours(),
            catalog_ttl_hours: default_catalog_ttl_hours(),
            max_memory_entries: default_max_memory_entries(),
        }
    }
}

fn default_excellent_kbps() -> u32 {
    256
}
fn default_good_kbps() -> u32 {
    128
}
fn default_acceptable_kbps() -> u32 {
    110
}
fn default_low_kbps() -> u32 {
    64
}
fn default_spatial_codec_set() -> Vec<String> {
    vec!["eac3".to_string(), "truehd".to_string(), "ac3".to_string()]
}
fn default_spatial_min_channels() -> u32 {
    6
}
fn default_premium_container_set() -> Vec<String> {
    vec!["m4b".to_string(), "m4a".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    #[serde(default = "default_excellent_kbps")]
    pub excellent_kbps: u32,
    #[serde(default = "default_good_kbps")]
    pub good_kbps: u32,
    #[serde(default = "default_acceptable_kbps")]
    pub acceptable_kbps: u32,
    #[serde(default = "default_low_kbps")]
    pub low_kbps: u32,
    #[serde(default = "default_spatial_codec_set")]
    pub spatial_codec_set: Vec<String>,
    #[serde(default = "default_spatial_min_channels")]
    pub spatial_min_channels: u32,
    #[serde(default = "default_premium_container_set")]
    pub premium_container_set: Vec<String>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            excellent_kbps: default_excellent_kbps(),
            good_kbps: default_good_kbps(),
            acceptable_kbps: default_acceptable_kbps(),
            low_kbps: default_low_kbps(),
            spatial_codec_set: default_spatial_codec_set(),
            spatial_min_channels: default_spatial_min_channels(),
            premium_container_set: default_premium_container_set(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub catalog: CatalogConfig,
    pub cache: CacheConfig,
    pub quality: QualityConfig,
}

impl Config {
    /// Load from a TOML file, then apply the three documented environment
    /// overrides (CATALOG_AUTH_PASSWORD, LIBRARY_ID, CATALOG_AUTH_FILE).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&text)
            .map_err(|e| CoreError::configuration(format!("invalid config file: {e}")))?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var("CATALOG_AUTH_PASSWORD") {
            self.catalog.auth_password = Some(password);
        }
        if let Ok(library_id) = std::env::var("LIBRARY_ID") {
            self.library.library_id = Some(library_id);
        }
        if let Ok(auth_file) = std::env::var("CATALOG_AUTH_FILE") {
            self.catalog.auth_file_path = auth_file;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.catalog.requests_per_minute, 20.0);
        assert_eq!(config.catalog.burst_size, 5);
        assert_eq!(config.catalog.max_backoff_seconds, 60.0);
        assert_eq!(config.library.max_concurrent, 5);
        assert_eq!(config.library.batch_max_concurrent, 20);
        assert_eq!(config.quality.excellent_kbps, 256);
    }

    #[test]
    fn env_overrides_apply() {
        std::env::set_var("LIBRARY_ID", "lib_test_123");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.library.library_id.as_deref(), Some("lib_test_123"));
        std::env::remove_var("LIBRARY_ID");
    }
}
