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

//! Upgrade Finder Service (§4.7): scans a library, analyzes quality,
//! enriches candidates against the Catalog, filters, and ranks.

mod finder;
mod model;

pub use finder::{UpgradeFinderFilters, UpgradeFinderService};
pub use model::{EnrichedUpgradeCandidate, UpgradeFinderCounters, UpgradeFinderResult};
