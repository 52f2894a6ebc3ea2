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

//! Extraction of the indexed columns (external_id, title, author, source)
//! from a payload at `set` time, keyed by namespace prefix.

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtractedMetadata {
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub source: Option<String>,
}

fn source_for_namespace(namespace: &str) -> Option<&'static str> {
    if namespace.starts_with("lib_") {
        Some("library")
    } else if namespace.starts_with("catalog")
        || namespace.starts_with("library_subscriptions")
        || namespace.starts_with("library_wishlist")
        || namespace.starts_with("pricing")
    {
        Some("catalog")
    } else {
        None
    }
}

fn str_field<'a>(value: &'a serde_json::Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(|v| v.as_str())
}

/// Best-effort extraction; payload shapes vary across namespaces and this
/// never fails, it just extracts less.
pub fn extract_metadata(namespace: &str, payload: &serde_json::Value) -> ExtractedMetadata {
    let external_id = str_field(payload, "external_id")
        .or_else(|| str_field(payload, "asin"))
        .or_else(|| str_field(payload, "id"))
        .map(str::to_string);

    let title = str_field(payload, "title").map(str::to_string);

    let author = str_field(payload, "author")
        .or_else(|| str_field(payload, "primary_author"))
        .map(str::to_string)
        .or_else(|| {
            payload
                .get("authors")
                .and_then(|a| a.as_array())
                .and_then(|a| a.first())
                .and_then(|first| first.as_str().map(str::to_string).or_else(|| {
                    first.get("name").and_then(|n| n.as_str()).map(str::to_string)
                }))
        });

    ExtractedMetadata {
        external_id,
        title,
        author,
        source: source_for_namespace(namespace).map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_nested_author_list() {
        let payload = json!({
            "title": "The Fellowship",
            "authors": [{"name": "J.R.R. Tolkien"}],
            "asin": "B0001"
        });
        let meta = extract_metadata("catalog_product", &payload);
        assert_eq!(meta.title.as_deref(), Some("The Fellowship"));
        assert_eq!(meta.author.as_deref(), Some("J.R.R. Tolkien"));
        assert_eq!(meta.external_id.as_deref(), Some("B0001"));
        assert_eq!(meta.source.as_deref(), Some("catalog"));
    }

    #[test]
    fn library_namespace_tags_library_source() {
        let meta = extract_metadata("lib_items", &json!({"id": "local42"}));
        assert_eq!(meta.source.as_deref(), Some("library"));
        assert_eq!(meta.external_id.as_deref(), Some("local42"));
    }
}
