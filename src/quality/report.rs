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

//! Whole-library quality scan (§4.4), built from the Analyzer plus the
//! Library Client's listing and batch-fetch operations.

use super::analyzer::QualityAnalyzer;
use crate::error::Result;
use crate::library::LibraryClient;
use crate::models::{AudioQuality, QualityTier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityReport {
    pub items: Vec<AudioQuality>,
    pub tier_counts: HashMap<String, usize>,
    pub total_scanned: usize,
    pub total_skipped: usize,
}

impl QualityReport {
    fn record(&mut self, quality: AudioQuality) {
        *self.tier_counts.entry(quality.tier.label().to_string()).or_insert(0) += 1;
        self.items.push(quality);
    }

    pub fn needing_upgrade(&self) -> impl Iterator<Item = &AudioQuality> {
        self.items.iter().filter(|q| q.upgrade_priority > 0)
    }

    pub fn excellent_count(&self) -> usize {
        self.tier_counts
            .get(QualityTier::Excellent.label())
            .copied()
            .unwrap_or(0)
    }
}

/// Fetches every item in `library_id` and analyzes it. A single malformed
/// item (no audio files, unparsable metadata) is logged and skipped; this
/// function does not fail on that alone. Failure to even list the library
/// (e.g. an authentication error) propagates, since no scan is possible at
/// all in that case.
pub async fn scan_library(
    library: &LibraryClient,
    analyzer: &QualityAnalyzer,
    library_id: &str,
) -> Result<QualityReport> {
    let item_ids = library.list_item_ids(library_id).await?;
    let items = library.batch_get_items(&item_ids, None).await;

    let mut report = QualityReport {
        total_scanned: item_ids.len(),
        ..Default::default()
    };

    for item in &items {
        match analyzer.analyze(item) {
            Some(quality) => report.record(quality),
            None => {
                tracing::warn!(item_id = %item.id, title = %item.title, "item has no audio files, skipping");
                report.total_skipped += 1;
            }
        }
    }

    report.total_skipped += item_ids.len().saturating_sub(items.len());
    Ok(report)
}
