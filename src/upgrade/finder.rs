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

//! Upgrade Finder Service (§4.7): scan, analyze, enrich, filter, and rank.

use super::model::{EnrichedUpgradeCandidate, UpgradeFinderCounters, UpgradeFinderResult};
use crate::catalog::CatalogClient;
use crate::enrichment::EnrichmentService;
use crate::error::Result;
use crate::library::LibraryClient;
use crate::quality::QualityAnalyzer;
use std::time::Instant;

const DEFAULT_BITRATE_THRESHOLD_KBPS: f64 = 110.0;

#[derive(Debug, Clone, Default)]
pub struct UpgradeFinderFilters {
    pub subscription_only: bool,
    pub monthly_deals_only: bool,
    pub deals_only: bool,
    pub exclude_owned: bool,
}

pub struct UpgradeFinderService<'a> {
    library: &'a LibraryClient,
    catalog: Option<&'a CatalogClient>,
    analyzer: &'a QualityAnalyzer,
    enrichment: Option<&'a EnrichmentService>,
}

impl<'a> UpgradeFinderService<'a> {
    pub fn new(
        library: &'a LibraryClient,
        catalog: Option<&'a CatalogClient>,
        analyzer: &'a QualityAnalyzer,
        enrichment: Option<&'a EnrichmentService>,
    ) -> Self {
        Self {
            library,
            catalog,
            analyzer,
            enrichment,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn find_upgrades(
        &self,
        library_id: &str,
        bitrate_threshold: Option<f64>,
        filters: &UpgradeFinderFilters,
        limit: Option<usize>,
        scan_progress: Option<&(dyn Fn(usize, usize) + Send + Sync)>,
        enrichment_progress: Option<&(dyn Fn(usize, usize) + Send + Sync)>,
    ) -> Result<UpgradeFinderResult> {
        let threshold = bitrate_threshold.unwrap_or(DEFAULT_BITRATE_THRESHOLD_KBPS);

        let scan_started = Instant::now();
        let item_ids = self.library.list_item_ids(library_id).await?;
        let items = self.library.batch_get_items(&item_ids, scan_progress).await;

        let mut total_below_threshold = 0usize;
        let mut candidates: Vec<EnrichedUpgradeCandidate> = Vec::new();

        for item in &items {
            let Some(quality) = self.analyzer.analyze(item) else {
                continue;
            };
            if quality.bitrate_kbps >= threshold {
                continue;
            }
            if quality.external_id.is_none() {
                total_below_threshold += 1;
                continue;
            }
            total_below_threshold += 1;
            candidates.push(EnrichedUpgradeCandidate {
                boosted_priority: quality.upgrade_priority,
                quality,
                enrichment: None,
            });
        }
        let scan_duration_ms = scan_started.elapsed().as_millis() as u64;

        let mut enrichment_duration_ms = 0;
        let mut enrichment_cache_hits = 0u64;
        let mut enrichment_api_calls = 0u64;
        if let Some(catalog) = self.catalog {
            if let Some(enrichment) = self.enrichment {
                let enrich_started = Instant::now();
                let (hits_before, calls_before) = catalog.cache_stats();
                let external_ids: Vec<String> = candidates
                    .iter()
                    .filter_map(|c| c.quality.external_id.clone())
                    .collect();
                let enriched = enrichment.enrich_batch(&external_ids, true, enrichment_progress).await;

                for candidate in &mut candidates {
                    if let Some(external_id) = &candidate.quality.external_id {
                        if let Some(e) = enriched.get(external_id) {
                            candidate.boosted_priority = e.boosted_priority(candidate.quality.upgrade_priority);
                            candidate.enrichment = Some(e.clone());
                        }
                    }
                }
                enrichment_duration_ms = enrich_started.elapsed().as_millis() as u64;
                let (hits_after, calls_after) = catalog.cache_stats();
                enrichment_cache_hits = hits_after.saturating_sub(hits_before);
                enrichment_api_calls = calls_after.saturating_sub(calls_before);
            }
        }

        apply_filters(&mut candidates, filters);
        candidates.sort_by(|a, b| b.boosted_priority.cmp(&a.boosted_priority));
        if let Some(limit) = limit {
            candidates.truncate(limit);
        }

        let counters = recompute_counters(&candidates);

        Ok(UpgradeFinderResult {
            candidates,
            total_scanned: item_ids.len(),
            total_below_threshold,
            counters,
            scan_duration_ms,
            enrichment_duration_ms,
            enrichment_cache_hits: enrichment_cache_hits as usize,
            enrichment_api_calls: enrichment_api_calls as usize,
        })
    }
}

/// Applied in this exact order (§4.7): subscription_only, then
/// monthly_deals_only, then deals_only, then exclude_owned.
fn apply_filters(candidates: &mut Vec<EnrichedUpgradeCandidate>, filters: &UpgradeFinderFilters) {
    if filters.subscription_only {
        candidates.retain(|c| {
            c.enrichment
                .as_ref()
                .map(|e| e.recommendation.starts_with("FREE"))
                .unwrap_or(false)
        });
    }
    if filters.monthly_deals_only {
        candidates.retain(|c| {
            c.enrichment
                .as_ref()
                .map(|e| e.recommendation.starts_with("MONTHLY_DEAL"))
                .unwrap_or(false)
        });
    }
    if filters.deals_only {
        candidates.retain(|c| {
            c.enrichment
                .as_ref()
                .map(|e| e.recommendation.starts_with("MONTHLY_DEAL") || e.recommendation.starts_with("GOOD_DEAL"))
                .unwrap_or(false)
        });
    }
    if filters.exclude_owned {
        candidates.retain(|c| !c.enrichment.as_ref().map(|e| e.is_owned).unwrap_or(false));
    }
}

fn recompute_counters(candidates: &[EnrichedUpgradeCandidate]) -> UpgradeFinderCounters {
    let mut counters = UpgradeFinderCounters::default();
    for candidate in candidates {
        let Some(enrichment) = &candidate.enrichment else {
            continue;
        };
        if enrichment.recommendation.starts_with("FREE") {
            counters.subscription_included += 1;
        }
        if enrichment.recommendation.starts_with("MONTHLY_DEAL") {
            counters.monthly_deal += 1;
        }
        if enrichment.recommendation.starts_with("GOOD_DEAL") {
            counters.good_deal += 1;
        }
        if enrichment.is_owned {
            counters.already_owned += 1;
        }
        if enrichment.spatial_available {
            counters.spatial_available += 1;
        }
    }
    counters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::Enrichment;
    use crate::models::{AudioQuality, FormatRank, QualityTier};

    fn quality(external_id: Option<&str>, priority: i64) -> AudioQuality {
        AudioQuality {
            item_id: "i1".to_string(),
            title: "Title".to_string(),
            author: None,
            external_id: external_id.map(|s| s.to_string()),
            path: "/p".to_string(),
            size_bytes: 1,
            file_count: 1,
            primary_filename: None,
            codec: None,
            bitrate_kbps: 90.0,
            channels: 2,
            channel_layout: None,
            format_rank: FormatRank::Mp3,
            duration_hours: 1.0,
            is_spatial: false,
            tier: QualityTier::Poor,
            quality_score: 10.0,
            upgrade_priority: priority,
            upgrade_reason: None,
        }
    }

    fn enrichment(recommendation: &str, is_owned: bool) -> Enrichment {
        Enrichment {
            external_id: "EX1".to_string(),
            title: "Title".to_string(),
            is_owned,
            pricing: None,
            subscription: None,
            recommendation: recommendation.to_string(),
            priority_multiplier: 1.0,
            best_bitrate_kbps: None,
            spatial_available: false,
            available_codecs: vec![],
            cover_image_url: None,
            catalog_url: "https://example.invalid".to_string(),
        }
    }

    #[test]
    fn filters_apply_in_documented_order() {
        let mut candidates = vec![
            EnrichedUpgradeCandidate {
                quality: quality(Some("EX1"), 100),
                enrichment: Some(enrichment("FREE", false)),
                boosted_priority: 100,
            },
            EnrichedUpgradeCandidate {
                quality: quality(Some("EX2"), 100),
                enrichment: Some(enrichment("GOOD_DEAL (10% off)", false)),
                boosted_priority: 100,
            },
        ];

        let filters = UpgradeFinderFilters {
            subscription_only: true,
            ..Default::default()
        };
        apply_filters(&mut candidates, &filters);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].quality.external_id.as_deref(), Some("EX1"));
    }

    #[test]
    fn sort_is_descending_by_boosted_priority() {
        let mut candidates = vec![
            EnrichedUpgradeCandidate {
                quality: quality(Some("EX1"), 10),
                enrichment: None,
                boosted_priority: 10,
            },
            EnrichedUpgradeCandidate {
                quality: quality(Some("EX2"), 50),
                enrichment: None,
                boosted_priority: 50,
            },
        ];
        candidates.sort_by(|a, b| b.boosted_priority.cmp(&a.boosted_priority));
        assert_eq!(candidates[0].quality.external_id.as_deref(), Some("EX2"));
    }
}
