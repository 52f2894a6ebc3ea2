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

//! The calendar-boundary-aware TTL rule for pricing namespaces (§4.1/§9).

use chrono::{DateTime, Datelike, TimeZone, Utc};

/// Namespaces whose promotional pricing data must never outlive the current
/// UTC calendar month, since the Catalog rolls monthly deals over on the
/// first of the month.
pub const PRICING_NAMESPACES: &[&str] = &["pricing_catalog", "catalog_quality", "library_subscriptions"];

pub fn is_pricing_namespace(namespace: &str) -> bool {
    PRICING_NAMESPACES.contains(&namespace)
}

/// Seconds remaining until 00:00:00 UTC on the first day of next month.
pub fn seconds_until_next_calendar_month_utc(now: DateTime<Utc>) -> i64 {
    let (next_year, next_month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let boundary = Utc.with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0).unwrap();
    (boundary - now).num_seconds().max(0)
}

/// `effective_ttl(ns, requested_ttl, now)`: clamps a pricing namespace's TTL
/// to the calendar-month boundary. Non-pricing namespaces pass through
/// unchanged.
pub fn effective_ttl_seconds(namespace: &str, requested_ttl_seconds: i64, now: DateTime<Utc>) -> i64 {
    if is_pricing_namespace(namespace) {
        requested_ttl_seconds.min(seconds_until_next_calendar_month_utc(now))
    } else {
        requested_ttl_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_when_far_from_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 1, 28, 0, 0, 0).unwrap();
        assert_eq!(seconds_until_next_calendar_month_utc(now), 4 * 86_400);
        assert_eq!(effective_ttl_seconds("pricing_catalog", 21_600, now), 21_600);
    }

    #[test]
    fn clamped_near_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 22, 0, 0).unwrap();
        assert_eq!(seconds_until_next_calendar_month_utc(now), 7_200);
        assert_eq!(effective_ttl_seconds("pricing_catalog", 21_600, now), 7_200);
    }

    #[test]
    fn non_pricing_namespace_is_never_clamped() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 0).unwrap();
        assert_eq!(effective_ttl_seconds("catalog_product", 999_999, now), 999_999);
    }

    #[test]
    fn december_rolls_into_next_year() {
        let now = Utc.with_ymd_and_hms(2024, 12, 15, 0, 0, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            seconds_until_next_calendar_month_utc(now),
            (expected - now).num_seconds()
        );
    }
}
