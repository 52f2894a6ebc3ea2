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

//! Content-reference shapes returned by the format-discovery endpoints
//! (§4.3 "Content reference shape").

use serde::{Deserialize, Serialize};

/// A codec string of "ec+3" or "ac-4" marks a spatial-capable format.
fn is_spatial_codec(codec: &str) -> bool {
    matches!(codec, "ec+3" | "ac-4")
}

fn codec_label(codec: &str) -> &'static str {
    match codec {
        "mp4a.40.2" => "AAC-LC",
        "mp4a.40.42" => "HE-AAC v2",
        "ec+3" => "Dolby Digital Plus",
        "ac-4" => "Dolby AC-4 (Atmos)",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentReference {
    pub codec: String,
    pub content_size_bytes: i64,
    pub runtime_ms: i64,
}

impl ContentReference {
    /// 0.0 when either input is zero.
    pub fn bitrate_kbps(&self) -> f64 {
        if self.content_size_bytes == 0 || self.runtime_ms == 0 {
            return 0.0;
        }
        let runtime_seconds = self.runtime_ms as f64 / 1000.0;
        (self.content_size_bytes as f64 * 8.0) / runtime_seconds / 1000.0
    }

    pub fn is_spatial(&self) -> bool {
        is_spatial_codec(&self.codec)
    }

    pub fn codec_label(&self) -> &'static str {
        codec_label(&self.codec)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentQualityInfo {
    pub formats: Vec<ContentReference>,
    pub best_bitrate_kbps: f64,
    pub best_format: Option<ContentReference>,
    pub has_spatial: bool,
}

impl ContentQualityInfo {
    pub fn from_formats(formats: Vec<ContentReference>) -> Self {
        if formats.is_empty() {
            return Self::default();
        }

        let has_spatial = formats.iter().any(|f| f.is_spatial());
        let best_format = formats
            .iter()
            .max_by(|a, b| a.bitrate_kbps().total_cmp(&b.bitrate_kbps()))
            .cloned();
        let best_bitrate_kbps = best_format.as_ref().map(|f| f.bitrate_kbps()).unwrap_or(0.0);

        Self {
            formats,
            best_bitrate_kbps,
            best_format,
            has_spatial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitrate_is_zero_when_runtime_is_zero() {
        let reference = ContentReference {
            codec: "mp4a.40.2".to_string(),
            content_size_bytes: 1_000_000,
            runtime_ms: 0,
        };
        assert_eq!(reference.bitrate_kbps(), 0.0);
    }

    #[test]
    fn bitrate_formula_matches_spec() {
        let reference = ContentReference {
            codec: "mp4a.40.2".to_string(),
            content_size_bytes: 1_875_000,
            runtime_ms: 60_000,
        };
        assert!((reference.bitrate_kbps() - 250.0).abs() < 0.01);
    }

    #[test]
    fn ac4_and_ec3_are_spatial() {
        assert!(is_spatial_codec("ac-4"));
        assert!(is_spatial_codec("ec+3"));
        assert!(!is_spatial_codec("mp4a.40.2"));
    }

    #[test]
    fn empty_formats_yield_zeroed_quality_info() {
        let info = ContentQualityInfo::from_formats(vec![]);
        assert_eq!(info.best_bitrate_kbps, 0.0);
        assert!(info.best_format.is_none());
        assert!(!info.has_spatial);
    }

    #[test]
    fn unknown_codec_label_falls_back() {
        let reference = ContentReference {
            codec: "weird".to_string(),
            content_size_bytes: 1,
            runtime_ms: 1,
        };
        assert_eq!(reference.codec_label(), "Unknown");
    }
}
