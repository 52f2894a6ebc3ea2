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

//! Wire DTOs for the Library API. One struct per endpoint shape, with
//! field renames declared statically rather than relying on runtime alias
//! resolution (§9 design note on field-validated response objects).

use crate::models::{AudioFile, LibraryItem, LocalSeries, LocalSeriesBook};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ItemsPageResponse {
    pub results: Vec<ItemSummaryDto>,
    #[serde(default)]
    pub total: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ItemSummaryDto {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ItemDto {
    pub id: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    pub media: MediaDto,
}

#[derive(Debug, Deserialize)]
pub struct MediaDto {
    pub metadata: MetadataDto,
    #[serde(default, rename = "audioFiles")]
    pub audio_files: Vec<AudioFileDto>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataDto {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<AuthorDto>,
    #[serde(default, alias = "asin")]
    pub external_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthorDto {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioFileDto {
    #[serde(default)]
    pub metadata: AudioFileMetadataDto,
}

#[derive(Debug, Default, Deserialize)]
pub struct AudioFileMetadataDto {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default, rename = "bitRate")]
    pub bit_rate: Option<f64>,
    #[serde(default)]
    pub channels: Option<u32>,
    #[serde(default, rename = "channelLayout")]
    pub channel_layout: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, rename = "mimeType")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SeriesListResponseDto {
    #[serde(default)]
    pub results: Vec<LocalSeriesDto>,
}

#[derive(Debug, Deserialize)]
pub struct LocalSeriesDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub books: Vec<LocalSeriesBookDto>,
}

#[derive(Debug, Deserialize)]
pub struct LocalSeriesBookDto {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub sequence: Option<String>,
    #[serde(default, alias = "asin")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub narrator: Option<String>,
    #[serde(default)]
    pub duration_hours: Option<f64>,
}

impl From<LocalSeriesDto> for LocalSeries {
    fn from(dto: LocalSeriesDto) -> Self {
        LocalSeries {
            id: dto.id,
            name: dto.name,
            books: dto
                .books
                .into_iter()
                .map(|b| LocalSeriesBook {
                    id: b.id,
                    title: b.title,
                    sequence: b.sequence,
                    external_id: b.external_id,
                    author: b.author,
                    narrator: b.narrator,
                    duration_hours: b.duration_hours.unwrap_or(0.0),
                })
                .collect(),
        }
    }
}

impl From<ItemDto> for LibraryItem {
    fn from(dto: ItemDto) -> Self {
        let author = dto.media.metadata.authors.first().map(|a| a.name.clone());
        let audio_files: Vec<AudioFile> = dto
            .media
            .audio_files
            .into_iter()
            .map(|f| AudioFile {
                filename: f.metadata.filename.unwrap_or_default(),
                codec: f.metadata.codec,
                bitrate_bps: f.metadata.bit_rate.unwrap_or(0.0) as i64,
                channels: f.metadata.channels,
                channel_layout: f.metadata.channel_layout,
                duration_seconds: f.metadata.duration.unwrap_or(0.0),
                mime_type: f.metadata.mime_type,
                size_bytes: f.metadata.size.unwrap_or(0),
            })
            .collect();

        LibraryItem {
            id: dto.id,
            external_id: dto.media.metadata.external_id,
            title: dto.media.metadata.title,
            author,
            path: dto.path.unwrap_or_default(),
            total_size_bytes: dto.size.unwrap_or(0),
            audio_files,
        }
    }
}
