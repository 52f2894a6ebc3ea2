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

//! Title and series-name normalization shared by every matching strategy
//! (§4.6).

use regex::Regex;
use std::sync::OnceLock;

fn book_trailer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\s*[,:]?\s*\((?:[^)]*)\)[\s,;:]*$|\s*[,:]?\s*\b(?:book|volume|part)\s+\d+[\s,;:]*$").unwrap()
    })
}

fn series_suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\s+(series|saga|trilogy|duology|books)\s*$").unwrap())
}

/// Lowercase, trim, strip a leading "the ", strip parenthesized series
/// suffixes, and strip "Book N" / "Volume N" / "Part N" trailers.
pub fn normalize_title(title: &str) -> String {
    let mut normalized = title.trim().to_lowercase();
    if let Some(stripped) = normalized.strip_prefix("the ") {
        normalized = stripped.to_string();
    }

    loop {
        let replaced = book_trailer_pattern().replace(&normalized, "").trim().to_string();
        if replaced == normalized {
            break;
        }
        normalized = replaced;
    }

    normalized.trim().to_string()
}

/// Lowercase, trim, strip a leading "the ", strip a trailing
/// " series"/" saga"/" trilogy"/" duology"/" books".
pub fn normalize_series_name(name: &str) -> String {
    let mut normalized = name.trim().to_lowercase();
    if let Some(stripped) = normalized.strip_prefix("the ") {
        normalized = stripped.to_string();
    }
    normalized = series_suffix_pattern().replace(&normalized, "").trim().to_string();
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_the_and_trailing_book_number() {
        assert_eq!(normalize_title("The Fellowship of the Ring, Book 1"), "fellowship of the ring");
    }

    #[test]
    fn strips_parenthesized_suffix() {
        assert_eq!(normalize_title("Leviathan Wakes (The Expanse, Book 1)"), "leviathan wakes");
    }

    #[test]
    fn handles_book_and_volume_simultaneously() {
        let normalized = normalize_title("Some Title (Series Name) Book 2, Volume 3");
        assert!(!normalized.contains("book"));
        assert!(!normalized.contains("volume"));
    }

    #[test]
    fn series_name_strips_trailing_designators() {
        assert_eq!(normalize_series_name("The Expanse Series"), "expanse");
        assert_eq!(normalize_series_name("Mistborn Trilogy"), "mistborn");
    }
}
