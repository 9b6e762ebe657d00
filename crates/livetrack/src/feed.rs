// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Data-feed seams and their error taxonomy.
//!
//! Implementations do blocking I/O; the service layer runs them on a
//! blocking worker bounded by the polling interval. Every failure here is
//! transient by design: the engine logs it and keeps its last good state.

use std::time::Duration;

use thiserror::Error;

use crate::geo::BoundingBox;
use crate::model::{LiveAircraft, RouteDetail, RouteId};

/// Errors from a live or route fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("server returned status {0}")]
    Http(u16),
}

/// Source of live aircraft snapshots for a bounding box.
pub trait LiveFeed: Send + Sync {
    /// Fetch the current live features inside `bbox`.
    ///
    /// Bounding box ordering is (`min_lon`, `min_lat`, `max_lon`,
    /// `max_lat`) in EPSG:4326-equivalent degrees.
    fn fetch_live(&self, bbox: BoundingBox) -> Result<Vec<LiveAircraft>, FetchError>;
}

/// Source of route detail for inspection.
pub trait RouteFeed: Send + Sync {
    /// Fetch detail for one route. `Ok(None)` is the not-found signal.
    fn fetch_route(&self, route_id: RouteId) -> Result<Option<RouteDetail>, FetchError>;
}
