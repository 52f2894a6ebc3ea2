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

//! The assembled output of [`crate::enrichment::EnrichmentService::enrich`].

use crate::models::{CodecDescriptor, PricingInfo, SubscriptionInclusion};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub external_id: String,
    pub title: String,
    pub is_owned: bool,
    pub pricing: Option<PricingInfo>,
    pub subscription: Option<SubscriptionInclusion>,
    pub recommendation: String,
    pub priority_multiplier: f64,
    pub best_bitrate_kbps: Option<f64>,
    pub spatial_available: bool,
    pub available_codecs: Vec<CodecDescriptor>,
    pub cover_image_url: Option<String>,
    pub catalog_url: String,
}

impl Enrichment {
    /// Integer-truncating application of `priority_multiplier` to a base
    /// upgrade priority from the Quality Analyzer (§4.7).
    pub fn boosted_priority(&self, base_priority: i64) -> i64 {
        (base_priority as f64 * self.priority_multiplier) as i64
    }
}
