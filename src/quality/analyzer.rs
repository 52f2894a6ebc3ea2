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

//! The Quality Analyzer (§4.4): a pure, deterministic function from a
//! [`LibraryItem`] to an [`AudioQuality`].

use crate::config::QualityConfig;
use crate::models::{AudioFile, AudioQuality, FormatRank, LibraryItem, QualityTier};

pub struct QualityAnalyzer {
    config: QualityConfig,
}

impl QualityAnalyzer {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, item: &LibraryItem) -> Option<AudioQuality> {
        let first = item.audio_files.first()?;

        let bitrate_kbps = self.aggregate_bitrate_kbps(&item.audio_files, first);
        let format_rank = self.resolve_format_rank(first);
        let channels = first.channels.unwrap_or(0);
        let is_spatial = self.is_spatial(first, channels);
        let tier = self.tier(bitrate_kbps, format_rank, is_spatial);
        let score = self.score(bitrate_kbps, format_rank, is_spatial);

        let total_size_bytes: i64 = item.audio_files.iter().map(|f| f.size_bytes).sum();
        let duration_hours: f64 = item.audio_files.iter().map(|f| f.duration_seconds).sum::<f64>() / 3600.0;
        let size_gb = total_size_bytes as f64 / (1024.0 * 1024.0 * 1024.0);

        let (upgrade_priority, upgrade_reason) =
            self.upgrade_priority(tier, item.external_id.as_deref(), bitrate_kbps, size_gb);

        Some(AudioQuality {
            item_id: item.id.clone(),
            title: item.title.clone(),
            author: item.author.clone(),
            external_id: item.external_id.clone(),
            path: item.path.clone(),
            size_bytes: total_size_bytes,
            file_count: item.audio_files.len(),
            primary_filename: Some(first.filename.clone()),
            codec: first.codec.clone(),
            bitrate_kbps,
            channels,
            channel_layout: first.channel_layout.clone(),
            format_rank,
            duration_hours,
            is_spatial,
            tier,
            quality_score: score,
            upgrade_priority,
            upgrade_reason,
        })
    }

    /// Duration-weighted mean across all files; falls back to the first
    /// file's raw bitrate when total duration is zero.
    fn aggregate_bitrate_kbps(&self, files: &[AudioFile], first: &AudioFile) -> f64 {
        let total_duration: f64 = files.iter().map(|f| f.duration_seconds).sum();
        if total_duration <= 0.0 {
            return first.bitrate_bps as f64 / 1000.0;
        }

        let weighted_sum: f64 = files
            .iter()
            .map(|f| (f.bitrate_bps as f64 / 1000.0) * f.duration_seconds)
            .sum();
        weighted_sum / total_duration
    }

    fn resolve_format_rank(&self, first: &AudioFile) -> FormatRank {
        let by_filename = FormatRank::from_filename(&first.filename);
        if by_filename != FormatRank::Other {
            return by_filename;
        }
        FormatRank::from_codec_mime(first.codec.as_deref(), first.mime_type.as_deref())
    }

    fn is_spatial(&self, first: &AudioFile, channels: u32) -> bool {
        let codec_lower = first.codec.as_deref().unwrap_or("").to_lowercase();
        let by_codec = self
            .config
            .spatial_codec_set
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&codec_lower))
            && channels >= self.config.spatial_min_channels;

        let by_layout = first
            .channel_layout
            .as_deref()
            .map(|layout| layout.to_lowercase().contains("atmos"))
            .unwrap_or(false);

        by_codec || by_layout
    }

    fn tier(&self, bitrate_kbps: f64, format_rank: FormatRank, is_spatial: bool) -> QualityTier {
        if is_spatial {
            return QualityTier::Excellent;
        }
        if bitrate_kbps >= self.config.excellent_kbps as f64 {
            return QualityTier::Excellent;
        }

        if format_rank.is_premium_container() {
            if bitrate_kbps >= self.config.good_kbps as f64 {
                QualityTier::Better
            } else if bitrate_kbps >= self.config.acceptable_kbps as f64 {
                QualityTier::Good
            } else if bitrate_kbps >= self.config.low_kbps as f64 {
                QualityTier::Low
            } else {
                QualityTier::Poor
            }
        } else if format_rank.is_mp3_opus_flac() {
            if bitrate_kbps >= self.config.good_kbps as f64 {
                QualityTier::Good
            } else if bitrate_kbps >= self.config.acceptable_kbps as f64 {
                QualityTier::Low
            } else {
                QualityTier::Poor
            }
        } else if bitrate_kbps >= self.config.good_kbps as f64 {
            QualityTier::Good
        } else if bitrate_kbps >= self.config.low_kbps as f64 {
            QualityTier::Low
        } else {
            QualityTier::Poor
        }
    }

    fn format_weight(&self, format_rank: FormatRank) -> f64 {
        match format_rank {
            FormatRank::PremiumContainerAac => 30.0,
            FormatRank::PlainAac => 25.0,
            FormatRank::Flac => 20.0,
            FormatRank::Mp3 | FormatRank::Opus => 15.0,
            FormatRank::Other => 10.0,
        }
    }

    fn score(&self, bitrate_kbps: f64, format_rank: FormatRank, is_spatial: bool) -> f64 {
        let bitrate_component = (bitrate_kbps / 256.0 * 60.0).min(60.0);
        let format_component = self.format_weight(format_rank);
        let spatial_component = if is_spatial { 10.0 } else { 0.0 };
        bitrate_component + format_component + spatial_component
    }

    fn upgrade_priority(
        &self,
        tier: QualityTier,
        external_id: Option<&str>,
        bitrate_kbps: f64,
        size_gb: f64,
    ) -> (i64, Option<String>) {
        let tier_base = match tier {
            QualityTier::Poor => 100,
            QualityTier::Low => 50,
            QualityTier::Good => 10,
            _ => 0,
        };
        if tier_base == 0 {
            return (0, None);
        }

        let mut priority = tier_base;
        let mut reasons = vec![format!("{} quality tier", tier.label())];

        if external_id.is_some() {
            priority += 20;
            reasons.push("catalog lookup available".to_string());
        }

        let efficiency = bitrate_kbps / (size_gb * 100.0).max(1.0);
        if efficiency < 1.0 {
            priority += 10;
            reasons.push("poor bitrate-to-size efficiency".to_string());
        }

        (priority, Some(reasons.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(codec: &str, mime: Option<&str>, bitrate_bps: i64, channels: u32, duration: f64, filename: &str, size: i64) -> AudioFile {
        AudioFile {
            filename: filename.to_string(),
            codec: Some(codec.to_string()),
            bitrate_bps,
            channels: Some(channels),
            channel_layout: None,
            duration_seconds: duration,
            mime_type: mime.map(|m| m.to_string()),
            size_bytes: size,
        }
    }

    fn item_with(file: AudioFile) -> LibraryItem {
        LibraryItem {
            id: "item-1".to_string(),
            external_id: None,
            title: "Test Book".to_string(),
            author: None,
            path: "/books/test".to_string(),
            total_size_bytes: file.size_bytes,
            audio_files: vec![file],
        }
    }

    #[test]
    fn premium_container_path() {
        let analyzer = QualityAnalyzer::new(QualityConfig::default());
        let item = item_with(file("aac", Some("audio/mp4"), 128_000, 2, 3600.0, "book.m4b", 57_600_000));
        let quality = analyzer.analyze(&item).unwrap();

        assert_eq!(quality.bitrate_kbps, 128.0);
        assert_eq!(quality.format_rank, FormatRank::PremiumContainerAac);
        assert_eq!(quality.tier, QualityTier::Better);
        assert!((quality.quality_score - 60.0).abs() < 0.001);
        assert_eq!(quality.upgrade_priority, 0);
    }

    #[test]
    fn mp3_strictness() {
        let analyzer = QualityAnalyzer::new(QualityConfig::default());
        let item = item_with(file("mp3", None, 160_000, 2, 3600.0, "ch01.mp3", 72_000_000));
        let quality = analyzer.analyze(&item).unwrap();

        assert_eq!(quality.bitrate_kbps, 160.0);
        assert_eq!(quality.tier, QualityTier::Good);
        assert!((quality.quality_score - 52.5).abs() < 0.001);
        assert_eq!(quality.upgrade_priority, 10);
    }

    #[test]
    fn spatial_override_ignores_bitrate() {
        let analyzer = QualityAnalyzer::new(QualityConfig::default());
        let item = item_with(file("eac3", None, 64_000, 6, 3600.0, "x.m4b", 28_800_000));
        let quality = analyzer.analyze(&item).unwrap();

        assert!(quality.is_spatial);
        assert_eq!(quality.tier, QualityTier::Excellent);
        assert!(quality.quality_score >= 10.0);
    }

    #[test]
    fn zero_duration_falls_back_to_first_file_bitrate() {
        let analyzer = QualityAnalyzer::new(QualityConfig::default());
        let item = item_with(file("mp3", None, 192_000, 2, 0.0, "a.mp3", 1000));
        let quality = analyzer.analyze(&item).unwrap();
        assert_eq!(quality.bitrate_kbps, 192.0);
    }

    #[test]
    fn empty_audio_files_yields_no_analysis() {
        let analyzer = QualityAnalyzer::new(QualityConfig::default());
        let item = LibraryItem {
            id: "item-2".to_string(),
            external_id: None,
            title: "Empty".to_string(),
            author: None,
            path: "/books/empty".to_string(),
            total_size_bytes: 0,
            audio_files: vec![],
        };
        assert!(analyzer.analyze(&item).is_none());
    }
}
