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

//! Series comparison (§4.6): reconcile one [`LocalSeries`] against a
//! discovered [`CatalogSeries`], plus the whole-library pass.

use super::discovery::discover_series;
use super::matcher::BookMatcher;
use crate::catalog::CatalogClient;
use crate::library::LibraryClient;
use crate::models::{CatalogSeries, LocalSeries, SeriesComparisonResult, SeriesWarning};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const DEFAULT_MIN_MATCH_SCORE: f64 = 60.0;

pub async fn compare_series(
    catalog: &CatalogClient,
    local_series: &LocalSeries,
    min_match_score: f64,
) -> crate::error::Result<SeriesComparisonResult> {
    let catalog_series = discover_series(catalog, local_series, min_match_score).await?;
    Ok(compare_with_discovered(local_series.clone(), catalog_series, min_match_score))
}

fn compare_with_discovered(
    local_series: LocalSeries,
    catalog_series: Option<CatalogSeries>,
    min_match_score: f64,
) -> SeriesComparisonResult {
    let matcher = BookMatcher::new(min_match_score);
    let mut warnings = Vec::new();

    let Some(catalog_series) = catalog_series else {
        warnings.push(SeriesWarning::MissingMetadata);
        return SeriesComparisonResult {
            local_series,
            catalog_series: None,
            matches: Vec::new(),
            missing_books: Vec::new(),
            warnings,
        };
    };

    let matches: Vec<_> = local_series
        .books
        .iter()
        .map(|book| matcher.best_match(book, &catalog_series.books))
        .collect();

    let matched_external_ids: std::collections::HashSet<&str> = matches
        .iter()
        .filter_map(|m| m.catalog_book.as_ref().map(|b| b.external_id.as_str()))
        .collect();

    let missing_books: Vec<_> = catalog_series
        .books
        .iter()
        .filter(|b| !matched_external_ids.contains(b.external_id.as_str()))
        .cloned()
        .collect();

    let result = SeriesComparisonResult {
        local_series,
        catalog_series: Some(catalog_series),
        matches,
        missing_books,
        warnings,
    };

    if result.local_series.books.len() > result.catalog_count() {
        let mut result = result;
        result.warnings.push(SeriesWarning::PotentialDupes);
        return result;
    }

    result
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesAnalysisReport {
    pub comparisons: Vec<SeriesComparisonResult>,
    pub total_series: usize,
    pub matched_series: usize,
    pub complete_series: usize,
    pub total_missing_books: usize,
    pub total_missing_hours: f64,
}

/// Fetches every local series in `library_id`, filters by
/// `min_books_per_series`, compares each against the Catalog, and annotates
/// DUPLICATE_EXTERNAL_ID in a second pass over the whole result set. A
/// single series failing to compare is logged and skipped, never fatal.
pub async fn analyze_library(
    library: &LibraryClient,
    catalog: &CatalogClient,
    library_id: &str,
    min_books_per_series: usize,
    limit: Option<usize>,
    min_match_score: f64,
) -> crate::error::Result<SeriesAnalysisReport> {
    let all_series = library.list_local_series(library_id).await?;
    let candidates: Vec<_> = all_series
        .into_iter()
        .filter(|s| s.books.len() >= min_books_per_series)
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    let mut comparisons = Vec::with_capacity(candidates.len());
    for series in candidates {
        match compare_series(catalog, &series, min_match_score).await {
            Ok(comparison) => comparisons.push(comparison),
            Err(e) => {
                tracing::warn!(series_name = %series.name, error = %e, "series comparison failed, skipping");
            }
        }
    }

    annotate_duplicate_external_ids(&mut comparisons);

    let total_series = comparisons.len();
    let matched_series = comparisons.iter().filter(|c| c.matched_count() > 0).count();
    let complete_series = comparisons.iter().filter(|c| c.is_complete() && c.catalog_series.is_some()).count();
    let total_missing_books: usize = comparisons.iter().map(|c| c.missing_count()).sum();
    let total_missing_hours: f64 = comparisons
        .iter()
        .flat_map(|c| c.missing_books.iter())
        .map(|b| b.runtime_minutes.unwrap_or(0) as f64 / 60.0)
        .sum();

    Ok(SeriesAnalysisReport {
        comparisons,
        total_series,
        matched_series,
        complete_series,
        total_missing_books,
        total_missing_hours,
    })
}

/// Two distinct local series resolving to the same catalog series external
/// id is only detectable across the whole batch (§4.6).
fn annotate_duplicate_external_ids(comparisons: &mut [SeriesComparisonResult]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for comparison in comparisons.iter() {
        if let Some(id) = comparison.catalog_series.as_ref().and_then(|s| s.external_id.clone()) {
            *seen.entry(id).or_insert(0) += 1;
        }
    }

    for comparison in comparisons.iter_mut() {
        if let Some(id) = comparison.catalog_series.as_ref().and_then(|s| s.external_id.clone()) {
            if seen.get(&id).copied().unwrap_or(0) > 1 {
                comparison.warnings.push(SeriesWarning::DuplicateExternalId);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogSeriesBook, LocalSeriesBook};

    fn local_series_with(books: Vec<LocalSeriesBook>) -> LocalSeries {
        LocalSeries {
            id: "s1".to_string(),
            name: "The Expanse".to_string(),
            books,
        }
    }

    fn book(id: &str, external_id: &str) -> LocalSeriesBook {
        LocalSeriesBook {
            id: id.to_string(),
            title: format!("Book {id}"),
            sequence: Some(id.to_string()),
            external_id: Some(external_id.to_string()),
            author: None,
            narrator: None,
            duration_hours: 10.0,
        }
    }

    fn catalog_book(external_id: &str, sequence: &str) -> CatalogSeriesBook {
        CatalogSeriesBook {
            external_id: external_id.to_string(),
            title: format!("Catalog Book {sequence}"),
            sequence: Some(sequence.to_string()),
            pricing: None,
            subscription: None,
            runtime_minutes: Some(600),
            authors: vec![],
            cover_image_urls: vec![],
        }
    }

    #[test]
    fn seed_sims_happy_path_completion_percentage() {
        let local = local_series_with(vec![book("1", "EX001"), book("3", "EX003"), book("5", "EX005")]);
        let catalog_books: Vec<_> = (1..=9).map(|n| catalog_book(&format!("EX00{n}"), &n.to_string())).collect();
        let catalog_series = CatalogSeries {
            external_id: Some("SERIES1".to_string()),
            title: "The Expanse".to_string(),
            books: catalog_books,
        };

        let result = compare_with_discovered(local, Some(catalog_series), DEFAULT_MIN_MATCH_SCORE);

        assert_eq!(result.missing_count(), 6);
        assert!((result.completion_percentage() - 33.3).abs() < 0.1);
        for m in &result.matches {
            assert_eq!(m.confidence, crate::models::MatchConfidence::Exact);
            assert_eq!(m.strategy_used, Some("external_id"));
        }
    }

    #[test]
    fn missing_metadata_warning_when_no_catalog_series_found() {
        let local = local_series_with(vec![book("1", "EX001")]);
        let result = compare_with_discovered(local, None, DEFAULT_MIN_MATCH_SCORE);
        assert!(result.warnings.contains(&SeriesWarning::MissingMetadata));
    }

    #[test]
    fn potential_dupes_warning_when_local_exceeds_catalog_count() {
        let local = local_series_with(vec![book("1", "EX001"), book("2", "EX001-dup")]);
        let catalog_series = CatalogSeries {
            external_id: Some("SERIES1".to_string()),
            title: "The Expanse".to_string(),
            books: vec![catalog_book("EX001", "1")],
        };
        let result = compare_with_discovered(local, Some(catalog_series), DEFAULT_MIN_MATCH_SCORE);
        assert!(result.warnings.contains(&SeriesWarning::PotentialDupes));
    }
}
