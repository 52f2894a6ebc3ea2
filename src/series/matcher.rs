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

//! Book-matching strategies (§4.6): exact external_id, normalized-title
//! Levenshtein ratio, and normalized title+author token-set ratio. Tried in
//! order; the best score across all three wins.

use super::normalize::normalize_title;
use crate::models::{CatalogSeriesBook, LocalSeriesBook, MatchConfidence, MatchResult};

const DEFAULT_MIN_MATCH_SCORE: f64 = 60.0;

pub struct BookMatcher {
    min_match_score: f64,
}

impl Default for BookMatcher {
    fn default() -> Self {
        Self {
            min_match_score: DEFAULT_MIN_MATCH_SCORE,
        }
    }
}

impl BookMatcher {
    pub fn new(min_match_score: f64) -> Self {
        Self { min_match_score }
    }

    /// Scores `local` against every candidate and returns the best match
    /// clearing `min_match_score`, or a scoreless non-match when nothing
    /// does.
    pub fn best_match(&self, local: &LocalSeriesBook, candidates: &[CatalogSeriesBook]) -> MatchResult {
        let mut best: Option<(f64, MatchConfidence, &'static str, &CatalogSeriesBook)> = None;

        for candidate in candidates {
            if let Some(local_id) = &local.external_id {
                if local_id == &candidate.external_id {
                    let result = (100.0, MatchConfidence::Exact, "external_id", candidate);
                    best = Some(best.map_or(result, |b| if result.0 > b.0 { result } else { b }));
                    continue;
                }
            }

            let title_score = title_ratio(&local.title, &candidate.title);
            let mut score = title_score;
            let mut strategy = "normalized_title";

            if let Some(author) = &local.author {
                if let Some(candidate_author) = candidate.authors.first() {
                    let combined_score = token_set_ratio(
                        &format!("{} {}", local.title, author),
                        &format!("{} {}", candidate.title, candidate_author),
                    );
                    if combined_score > score {
                        score = combined_score;
                        strategy = "title_author_token_set";
                    }
                }
            }

            if best.is_none() || score > best.as_ref().unwrap().0 {
                best = Some((score, MatchConfidence::from_score(score), strategy, candidate));
            }
        }

        match best {
            Some((score, confidence, strategy, candidate)) if score >= self.min_match_score => MatchResult {
                local_book: local.clone(),
                catalog_book: Some(candidate.clone()),
                score,
                confidence,
                strategy_used: Some(strategy),
            },
            _ => MatchResult {
                local_book: local.clone(),
                catalog_book: None,
                score: 0.0,
                confidence: MatchConfidence::None,
                strategy_used: None,
            },
        }
    }
}

fn title_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize_title(a), &normalize_title(b)) * 100.0
}

/// A simplified fuzzywuzzy-style token-set ratio: split both strings into
/// token sets, build the shared-token and per-side-extra strings, and take
/// the best pairwise Levenshtein ratio among them.
fn token_set_ratio(a: &str, b: &str) -> f64 {
    use std::collections::BTreeSet;

    let tokenize = |s: &str| -> BTreeSet<String> {
        normalize_title(s).split_whitespace().map(|t| t.to_string()).collect()
    };

    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);

    let intersection: BTreeSet<&String> = tokens_a.intersection(&tokens_b).collect();
    let only_a: BTreeSet<&String> = tokens_a.difference(&tokens_b).collect();
    let only_b: BTreeSet<&String> = tokens_b.difference(&tokens_a).collect();

    let join = |set: &BTreeSet<&String>| -> String {
        set.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ")
    };

    let sorted_intersection = join(&intersection);
    let combined_a = format!("{sorted_intersection} {}", join(&only_a)).trim().to_string();
    let combined_b = format!("{sorted_intersection} {}", join(&only_b)).trim().to_string();

    let candidates = [
        strsim::normalized_levenshtein(&sorted_intersection, &combined_a),
        strsim::normalized_levenshtein(&sorted_intersection, &combined_b),
        strsim::normalized_levenshtein(&combined_a, &combined_b),
    ];

    candidates.into_iter().fold(0.0_f64, f64::max) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_book(external_id: &str, title: &str) -> CatalogSeriesBook {
        CatalogSeriesBook {
            external_id: external_id.to_string(),
            title: title.to_string(),
            sequence: None,
            pricing: None,
            subscription: None,
            runtime_minutes: None,
            authors: vec!["Jane Author".to_string()],
            cover_image_urls: vec![],
        }
    }

    fn local_book(id: &str, title: &str, external_id: Option<&str>) -> LocalSeriesBook {
        LocalSeriesBook {
            id: id.to_string(),
            title: title.to_string(),
            sequence: None,
            external_id: external_id.map(|s| s.to_string()),
            author: Some("Jane Author".to_string()),
            narrator: None,
            duration_hours: 10.0,
        }
    }

    #[test]
    fn exact_external_id_wins_over_fuzzy_match() {
        let matcher = BookMatcher::default();
        let local = local_book("l1", "Completely Different Title", Some("EX001"));
        let candidates = vec![catalog_book("EX001", "Leviathan Wakes")];
        let result = matcher.best_match(&local, &candidates);

        assert_eq!(result.score, 100.0);
        assert_eq!(result.confidence, MatchConfidence::Exact);
        assert_eq!(result.strategy_used, Some("external_id"));
    }

    #[test]
    fn below_threshold_yields_no_match() {
        let matcher = BookMatcher::default();
        let local = local_book("l1", "Totally Unrelated Words Here", None);
        let candidates = vec![catalog_book("EX002", "Leviathan Wakes")];
        let result = matcher.best_match(&local, &candidates);

        assert!(result.catalog_book.is_none());
        assert_eq!(result.confidence, MatchConfidence::None);
    }

    #[test]
    fn near_identical_titles_match_by_levenshtein_ratio() {
        let matcher = BookMatcher::default();
        let local = local_book("l1", "Leviathan Wakes", None);
        let candidates = vec![catalog_book("EX001", "Leviathan Wakes")];
        let result = matcher.best_match(&local, &candidates);

        assert!(result.catalog_book.is_some());
        assert_eq!(result.score, 100.0);
    }
}
