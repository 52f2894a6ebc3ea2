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

//! Series discovery (§4.6): find the Catalog's series for one local series,
//! trying three strategies in order until one yields any books.

use super::normalize::normalize_series_name;
use crate::catalog::CatalogClient;
use crate::error::Result;
use crate::models::{CatalogSeries, CatalogSeriesBook, LocalSeries, SeriesRef};

/// Distinct from the general `min_match_score` default (60): this is the
/// threshold used only to filter sims results back to the detected series,
/// per §4.6, and is not configurable via `min_match_score`.
const SIMS_MATCH_THRESHOLD: f64 = 80.0;

pub async fn discover_series(
    catalog: &CatalogClient,
    local_series: &LocalSeries,
    min_match_score: f64,
) -> Result<Option<CatalogSeries>> {
    if let Some(found) = discover_via_seed_sims(catalog, local_series).await? {
        return Ok(Some(found));
    }
    if let Some(found) = discover_via_local_external_ids(catalog, local_series).await? {
        return Ok(Some(found));
    }
    discover_via_keyword_search(catalog, local_series, min_match_score).await
}

async fn discover_via_seed_sims(
    catalog: &CatalogClient,
    local_series: &LocalSeries,
) -> Result<Option<CatalogSeries>> {
    let Some(seed) = local_series.books.iter().find_map(|b| b.external_id.as_deref()) else {
        return Ok(None);
    };

    let sims = catalog.series_books(seed).await?;
    if sims.is_empty() {
        return Ok(None);
    }

    let normalized_local_name = normalize_series_name(&local_series.name);
    let matching_sims: Vec<_> = sims
        .into_iter()
        .filter(|product| {
            product.series.iter().any(|series_ref| {
                strsim::normalized_levenshtein(
                    &normalize_series_name(&series_ref.series_title),
                    &normalized_local_name,
                ) * 100.0
                    >= SIMS_MATCH_THRESHOLD
            })
        })
        .collect();

    if matching_sims.is_empty() {
        return Ok(None);
    }

    let series_external_id = matching_sims
        .iter()
        .find_map(|p| p.series.first().and_then(|s| s.series_external_id.clone()));

    Ok(Some(CatalogSeries {
        external_id: series_external_id,
        title: local_series.name.clone(),
        books: matching_sims.into_iter().map(product_to_series_book).collect(),
    }))
}

async fn discover_via_local_external_ids(
    catalog: &CatalogClient,
    local_series: &LocalSeries,
) -> Result<Option<CatalogSeries>> {
    let mut series_ref: Option<SeriesRef> = None;
    let mut seen_ids = std::collections::HashSet::new();
    let mut books = Vec::new();

    for local_book in &local_series.books {
        let Some(external_id) = &local_book.external_id else {
            continue;
        };
        let product = match catalog.get_product(external_id).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(external_id, error = %e, "series discovery: product lookup failed, skipping");
                continue;
            }
        };

        if let Some(found_series) = product.series.first() {
            if series_ref.is_none() {
                series_ref = Some(found_series.clone());
            }
            if seen_ids.insert(product.external_id.clone()) {
                books.push(product_to_series_book(product));
            }
        }
    }

    match series_ref {
        Some(series_ref) => Ok(Some(CatalogSeries {
            external_id: series_ref.series_external_id,
            title: series_ref.series_title,
            books,
        })),
        None => Ok(None),
    }
}

async fn discover_via_keyword_search(
    catalog: &CatalogClient,
    local_series: &LocalSeries,
    min_match_score: f64,
) -> Result<Option<CatalogSeries>> {
    let primary_author = local_series.books.iter().find_map(|b| b.author.as_deref());
    let results = catalog
        .search(Some(&local_series.name), primary_author, None, None)
        .await?;

    let normalized_local_name = normalize_series_name(&local_series.name);
    let matching: Vec<_> = results
        .into_iter()
        .filter(|product| {
            product.series.iter().any(|series_ref| {
                strsim::normalized_levenshtein(
                    &normalize_series_name(&series_ref.series_title),
                    &normalized_local_name,
                ) * 100.0
                    >= min_match_score
            })
        })
        .collect();

    if matching.is_empty() {
        return Ok(None);
    }

    let series_external_id = matching
        .iter()
        .find_map(|p| p.series.first().and_then(|s| s.series_external_id.clone()));

    Ok(Some(CatalogSeries {
        external_id: series_external_id,
        title: local_series.name.clone(),
        books: matching.into_iter().map(product_to_series_book).collect(),
    }))
}

fn product_to_series_book(product: crate::models::CatalogProduct) -> CatalogSeriesBook {
    let sequence = product
        .series
        .first()
        .and_then(|s| s.sequence.clone());
    CatalogSeriesBook {
        external_id: product.external_id,
        title: product.title,
        sequence,
        pricing: product.pricing,
        subscription: product.subscription,
        runtime_minutes: product.runtime_minutes,
        authors: product.authors,
        cover_image_urls: product.cover_image_urls,
    }
}
