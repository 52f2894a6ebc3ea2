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

//! Wire DTOs for the Catalog API.

use crate::models::{CatalogProduct, CodecDescriptor, PriceType, PricingInfo, SeriesRef, SubscriptionInclusion};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ProductDto {
    pub asin: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<NameDto>,
    #[serde(default)]
    pub narrators: Vec<NameDto>,
    #[serde(default)]
    pub runtime_length_min: Option<i64>,
    #[serde(default)]
    pub release_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub price: Option<PriceDto>,
    #[serde(default)]
    pub plans: Vec<PlanDto>,
    #[serde(default)]
    pub available_codecs: Vec<CodecDto>,
    #[serde(default)]
    pub product_images: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub series: Vec<SeriesDto>,
}

#[derive(Debug, Deserialize)]
pub struct NameDto {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct PriceDto {
    #[serde(default)]
    pub list_price: Option<PriceAmountDto>,
    #[serde(default)]
    pub sale_price: Option<PriceAmountDto>,
}

#[derive(Debug, Deserialize)]
pub struct PriceAmountDto {
    pub base: f64,
    #[serde(default = "default_currency")]
    pub currency_code: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Deserialize)]
pub struct PlanDto {
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub expiration_date: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CodecDto {
    pub name: String,
    #[serde(default)]
    pub enhanced_codec: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeriesDto {
    #[serde(default)]
    pub asin: Option<String>,
    pub title: String,
    #[serde(default)]
    pub sequence: Option<String>,
}

impl From<ProductDto> for CatalogProduct {
    fn from(dto: ProductDto) -> Self {
        let pricing = dto.price.map(|price| {
            let list_price = price.list_price.as_ref().map(|p| p.base);
            let sale_price = price.sale_price.as_ref().map(|p| p.base);
            let currency = price
                .sale_price
                .as_ref()
                .or(price.list_price.as_ref())
                .map(|p| p.currency_code.clone())
                .unwrap_or_else(default_currency);
            let price_type = match (sale_price, list_price) {
                (Some(s), Some(l)) if s < l => Some(PriceType::Sale),
                (Some(_), _) => Some(PriceType::List),
                _ => None,
            };
            PricingInfo {
                list_price,
                sale_price,
                credit_price: 1.0,
                currency,
                price_type,
                is_monthly_deal: false,
            }
        });

        let subscription = dto
            .plans
            .iter()
            .find(|p| p.is_free)
            .map(|p| SubscriptionInclusion {
                is_included_free: true,
                plan_name: p.plan_name.clone(),
                expiration_date: p.expiration_date,
            });

        let has_dolby_atmos = dto
            .available_codecs
            .iter()
            .any(|c| c.name == "ec+3" || c.name == "ac-4" || c.enhanced_codec.as_deref() == Some("ac-4"));

        let mut cover_image_urls: Vec<(u32, String)> = dto
            .product_images
            .into_iter()
            .filter_map(|(size, url)| size.parse::<u32>().ok().map(|s| (s, url)))
            .collect();
        cover_image_urls.sort_by(|a, b| b.0.cmp(&a.0));

        CatalogProduct {
            external_id: dto.asin,
            title: dto.title,
            authors: dto.authors.into_iter().map(|a| a.name).collect(),
            narrators: dto.narrators.into_iter().map(|n| n.name).collect(),
            runtime_minutes: dto.runtime_length_min,
            release_date: dto.release_date,
            pricing,
            subscription,
            available_codecs: dto
                .available_codecs
                .into_iter()
                .map(|c| CodecDescriptor {
                    name: c.name,
                    enhanced_codec: c.enhanced_codec,
                })
                .collect(),
            cover_image_urls,
            series: dto
                .series
                .into_iter()
                .map(|s| SeriesRef {
                    series_external_id: s.asin,
                    series_title: s.title,
                    sequence: s.sequence,
                })
                .collect(),
            has_dolby_atmos,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchResponseDto {
    #[serde(default)]
    pub products: Vec<ProductDto>,
    #[serde(default)]
    pub total_results: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ContentMetadataDto {
    pub content_reference: ContentReferenceDto,
}

#[derive(Debug, Deserialize)]
pub struct ContentReferenceDto {
    pub codec: String,
    pub content_size_in_bytes: i64,
    pub runtime_length_ms: i64,
}
