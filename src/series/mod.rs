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

//! Series Matcher (§4.6): normalization, book-matching, series discovery,
//! and the whole-library reconciliation pass.

mod discovery;
mod matcher;
mod normalize;
mod report;

pub use matcher::BookMatcher;
pub use report::{analyze_library, compare_series, SeriesAnalysisReport};
