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

//! Shared data model: the entities every component reads or produces.
//!
//! Types here are plain data — no I/O, no business logic beyond a handful
//! of derived properties called out explicitly in the field-level docs.

use serde::{Deserialize, Serialize};

/// One physical audio track belonging to a [`LibraryItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFile {
    pub filename: String,
    pub codec: Option<String>,
    /// Bitrate in bits/second, as reported by the Library API.
    pub bitrate_bps: i64,
    pub channels: Option<u32>,
    pub channel_layout: Option<String>,
    /// Duration in seconds.
    pub duration_seconds: f64,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
}

/// One owned audiobook, as reported by the Library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryItem {
    pub id: String,
    pub external_id: Option<String>,
    pub title: String,
    pub author: Option<String>,
    pub path: String,
    pub total_size_bytes: i64,
    pub audio_files: Vec<AudioFile>,
}

/// Container/codec classification carrying a comparison score.
///
/// MP3, Opus, and FLAC intentionally share a [`FormatRank::rank_score`] —
/// they are treated as one quality tier — but remain distinct variants so
/// their labels never collapse into each other. Do not "simplify" this by
/// giving the shared-score variants an identical discriminant; a test in
/// this module asserts the labels stay pairwise distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatRank {
    PremiumContainerAac,
    PlainAac,
    Mp3,
    Opus,
    Flac,
    Other,
}

impl FormatRank {
    /// Lower is better. MP3/Opus/FLAC alias to the same score on purpose.
    pub fn rank_score(self) -> u32 {
        match self {
            FormatRank::PremiumContainerAac => 1,
            FormatRank::PlainAac => 2,
            FormatRank::Mp3 | FormatRank::Opus | FormatRank::Flac => 3,
            FormatRank::Other => 99,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FormatRank::PremiumContainerAac => "M4B",
            FormatRank::PlainAac => "M4A",
            FormatRank::Mp3 => "MP3",
            FormatRank::Opus => "Opus",
            FormatRank::Flac => "FLAC",
            FormatRank::Other => "Other",
        }
    }

    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_lowercase();
        if lower.ends_with(".m4b") {
            FormatRank::PremiumContainerAac
        } else if lower.ends_with(".m4a") {
            FormatRank::PlainAac
        } else if lower.ends_with(".mp3") {
            FormatRank::Mp3
        } else if lower.ends_with(".opus") {
            FormatRank::Opus
        } else if lower.ends_with(".flac") {
            FormatRank::Flac
        } else {
            FormatRank::Other
        }
    }

    /// Falls back to codec/MIME sniffing when the filename carries no usable
    /// extension. An `eac3` codec — the Dolby Digital Plus carrier for
    /// Atmos — is treated as top tier rather than "Other": a file already
    /// encoding spatial audio is at least as good as a plain AAC rendition.
    pub fn from_codec_mime(codec: Option<&str>, mime_type: Option<&str>) -> Self {
        let codec_lower = codec.unwrap_or("").to_lowercase();
        let mime_lower = mime_type.unwrap_or("").to_lowercase();

        if codec_lower == "aac" && mime_lower.contains("mp4") {
            FormatRank::PremiumContainerAac
        } else if codec_lower == "aac" {
            FormatRank::PlainAac
        } else if codec_lower == "mp3" || mime_lower.contains("mp3") {
            FormatRank::Mp3
        } else if codec_lower == "opus" {
            FormatRank::Opus
        } else if codec_lower == "flac" {
            FormatRank::Flac
        } else if codec_lower == "eac3" {
            FormatRank::PremiumContainerAac
        } else {
            FormatRank::Other
        }
    }

    pub fn is_premium_container(self) -> bool {
        matches!(self, FormatRank::PremiumContainerAac | FormatRank::PlainAac)
    }

    pub fn is_mp3_opus_flac(self) -> bool {
        matches!(self, FormatRank::Mp3 | FormatRank::Opus | FormatRank::Flac)
    }
}

/// Totally ordered by ascending quality number — lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u32)]
pub enum QualityTier {
    Excellent = 1,
    Better = 2,
    Good = 3,
    Low = 4,
    Poor = 5,
    Unknown = 99,
}

impl QualityTier {
    pub fn label(self) -> &'static str {
        match self {
            QualityTier::Excellent => "Excellent",
            QualityTier::Better => "Better",
            QualityTier::Good => "Good",
            QualityTier::Low => "Low",
            QualityTier::Poor => "Poor",
            QualityTier::Unknown => "Unknown",
        }
    }
}

/// The output of analyzing one [`LibraryItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioQuality {
    pub item_id: String,
    pub title: String,
    pub author: Option<String>,
    pub external_id: Option<String>,
    pub path: String,
    pub size_bytes: i64,
    pub file_count: usize,
    pub primary_filename: Option<String>,
    pub codec: Option<String>,
    pub bitrate_kbps: f64,
    pub channels: u32,
    pub channel_layout: Option<String>,
    pub format_rank: FormatRank,
    pub duration_hours: f64,
    pub is_spatial: bool,
    pub tier: QualityTier,
    pub quality_score: f64,
    pub upgrade_priority: i64,
    pub upgrade_reason: Option<String>,
}

impl AudioQuality {
    pub fn size_gb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0 * 1024.0)
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn tier_label(&self) -> &'static str {
        self.tier.label()
    }

    pub fn format_label(&self) -> &'static str {
        self.format_rank.label()
    }
}

/// (series_external_id, series_title, sequence). Sequence is lexicographic,
/// not numeric, to accommodate values like "1.5", "0", "Novella".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRef {
    pub series_external_id: Option<String>,
    pub series_title: String,
    pub sequence: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PriceType {
    Sale,
    Member,
    List,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingInfo {
    pub list_price: Option<f64>,
    pub sale_price: Option<f64>,
    pub credit_price: f64,
    pub currency: String,
    pub price_type: Option<PriceType>,
    pub is_monthly_deal: bool,
}

impl PricingInfo {
    /// `good_deal_threshold_usd` is the configured "under $X" cutoff (§3: 9.00).
    pub fn discount_percent(&self) -> Option<f64> {
        match (self.sale_price, self.list_price) {
            (Some(sale), Some(list)) if list > 0.0 => Some((1.0 - sale / list) * 100.0),
            _ => None,
        }
    }

    pub fn effective_price(&self) -> Option<f64> {
        self.sale_price.or(self.list_price)
    }

    pub fn is_good_deal(&self, good_deal_threshold_usd: f64) -> bool {
        match self.effective_price() {
            Some(price) => price < good_deal_threshold_usd,
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionInclusion {
    pub is_included_free: bool,
    pub plan_name: Option<String>,
    pub expiration_date: Option<chrono::DateTime<chrono::Utc>>,
}

impl SubscriptionInclusion {
    pub fn days_until_expiration(&self, now: chrono::DateTime<chrono::Utc>) -> Option<i64> {
        self.expiration_date
            .map(|exp| (exp - now).num_days().max(0))
    }

    pub fn is_expiring_soon(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match self.days_until_expiration(now) {
            Some(days) => days > 0 && days <= 30,
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecDescriptor {
    pub name: String,
    pub enhanced_codec: Option<String>,
}

/// One book in the Catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub external_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub narrators: Vec<String>,
    pub runtime_minutes: Option<i64>,
    pub release_date: Option<chrono::NaiveDate>,
    pub pricing: Option<PricingInfo>,
    pub subscription: Option<SubscriptionInclusion>,
    pub available_codecs: Vec<CodecDescriptor>,
    pub cover_image_urls: Vec<(u32, String)>,
    pub series: Vec<SeriesRef>,
    pub has_dolby_atmos: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchConfidence {
    None,
    Low,
    Medium,
    High,
    Exact,
}

impl MatchConfidence {
    /// 100 ⇒ exact; ≥90 ⇒ high; ≥75 ⇒ medium; ≥60 ⇒ low; else none.
    pub fn from_score(score: f64) -> Self {
        if score >= 100.0 {
            MatchConfidence::Exact
        } else if score >= 90.0 {
            MatchConfidence::High
        } else if score >= 75.0 {
            MatchConfidence::Medium
        } else if score >= 60.0 {
            MatchConfidence::Low
        } else {
            MatchConfidence::None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSeriesBook {
    pub id: String,
    pub title: String,
    pub sequence: Option<String>,
    pub external_id: Option<String>,
    pub author: Option<String>,
    pub narrator: Option<String>,
    pub duration_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSeries {
    pub id: String,
    pub name: String,
    pub books: Vec<LocalSeriesBook>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSeriesBook {
    pub external_id: String,
    pub title: String,
    pub sequence: Option<String>,
    pub pricing: Option<PricingInfo>,
    pub subscription: Option<SubscriptionInclusion>,
    pub runtime_minutes: Option<i64>,
    pub authors: Vec<String>,
    pub cover_image_urls: Vec<(u32, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSeries {
    pub external_id: Option<String>,
    pub title: String,
    pub books: Vec<CatalogSeriesBook>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub local_book: LocalSeriesBook,
    pub catalog_book: Option<CatalogSeriesBook>,
    pub score: f64,
    pub confidence: MatchConfidence,
    pub strategy_used: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeriesWarning {
    DuplicateExternalId,
    MissingMetadata,
    PotentialDupes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesComparisonResult {
    pub local_series: LocalSeries,
    pub catalog_series: Option<CatalogSeries>,
    pub matches: Vec<MatchResult>,
    pub missing_books: Vec<CatalogSeriesBook>,
    pub warnings: Vec<SeriesWarning>,
}

impl SeriesComparisonResult {
    pub fn catalog_count(&self) -> usize {
        self.catalog_series
            .as_ref()
            .map(|s| s.books.len())
            .unwrap_or(0)
    }

    pub fn matched_count(&self) -> usize {
        self.matches
            .iter()
            .filter(|m| m.catalog_book.is_some())
            .count()
    }

    pub fn missing_count(&self) -> usize {
        self.missing_books.len()
    }

    /// matched / catalog_count when catalog_count > 0, else 100 if the local
    /// series is non-empty, else 0.
    pub fn completion_percentage(&self) -> f64 {
        let catalog_count = self.catalog_count();
        if catalog_count > 0 {
            (self.matched_count() as f64 / catalog_count as f64) * 100.0
        } else if !self.local_series.books.is_empty() {
            100.0
        } else {
            0.0
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing_count() == 0
    }
}

/// (namespace, key) is unique; `expires_at >= created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub namespace: String,
    pub key: String,
    pub payload: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub source: Option<String>,
}

/// `external_id` is unique; `local_id` is unique when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossSourceMapping {
    pub external_id: String,
    pub local_id: Option<String>,
    pub local_path: Option<String>,
    pub canonical_external_id: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub confidence: Option<f64>,
    pub matched_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn format_rank_labels_stay_pairwise_distinct_despite_shared_scores() {
        let all = [
            FormatRank::PremiumContainerAac,
            FormatRank::PlainAac,
            FormatRank::Mp3,
            FormatRank::Opus,
            FormatRank::Flac,
            FormatRank::Other,
        ];
        let labels: HashSet<&str> = all.iter().map(|f| f.label()).collect();
        assert_eq!(labels.len(), all.len(), "format rank labels must not alias");

        // The aliasing hazard this guards against: MP3/Opus/FLAC share a
        // rank_score but must keep distinct labels.
        assert_eq!(FormatRank::Mp3.rank_score(), FormatRank::Opus.rank_score());
        assert_eq!(FormatRank::Opus.rank_score(), FormatRank::Flac.rank_score());
        assert_ne!(FormatRank::Mp3.label(), FormatRank::Opus.label());
        assert_ne!(FormatRank::Opus.label(), FormatRank::Flac.label());
    }

    #[test]
    fn match_confidence_thresholds() {
        assert_eq!(MatchConfidence::from_score(100.0), MatchConfidence::Exact);
        assert_eq!(MatchConfidence::from_score(90.0), MatchConfidence::High);
        assert_eq!(MatchConfidence::from_score(75.0), MatchConfidence::Medium);
        assert_eq!(MatchConfidence::from_score(60.0), MatchConfidence::Low);
        assert_eq!(MatchConfidence::from_score(59.9), MatchConfidence::None);
    }

    #[test]
    fn eac3_codec_maps_to_top_tier() {
        assert_eq!(
            FormatRank::from_codec_mime(Some("eac3"), None),
            FormatRank::PremiumContainerAac
        );
    }
}
