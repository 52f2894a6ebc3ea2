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

//! Result shapes for the Upgrade Finder Service (§4.7).

use crate::enrichment::Enrichment;
use crate::models::AudioQuality;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedUpgradeCandidate {
    pub quality: AudioQuality,
    pub enrichment: Option<Enrichment>,
    pub boosted_priority: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UpgradeFinderCounters {
    pub subscription_included: usize,
    pub monthly_deal: usize,
    pub good_deal: usize,
    pub already_owned: usize,
    pub spatial_available: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpgradeFinderResult {
    pub candidates: Vec<EnrichedUpgradeCandidate>,
    pub total_scanned: usize,
    pub total_below_threshold: usize,
    pub counters: UpgradeFinderCounters,
    pub scan_duration_ms: u64,
    pub enrichment_duration_ms: u64,
    pub enrichment_cache_hits: usize,
    pub enrichment_api_calls: usize,
}
