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

//! Feature and route data model.
//!
//! Live features are validated at the fetch boundary: coordinates out of
//! range reject the feature, and missing or non-finite motion data fails
//! closed to [`Motion::Static`] so that bad values never reach the geodesy
//! math. One [`LiveAircraft`] per route id is active at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{self, DistanceUnit, GeoPoint};

/// Identifier shared by a route and the aircraft currently flying it.
pub type RouteId = i64;

/// Placeholder id used while no real route is selected.
pub const NO_ROUTE: RouteId = -1;

/// Validation failure for a live feature.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("coordinate out of range: lon {lon}, lat {lat}")]
    CoordinateOutOfRange { lon: f64, lat: f64 },
}

/// Motion state of a live feature.
///
/// `Static` features are displayed at their reported position and never
/// drive an extrapolation task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    /// Full motion data: dead reckoning is possible.
    Moving {
        /// Degrees clockwise from north, normalized to [0, 360).
        bearing_deg: f64,
        /// Ground speed in meters per second.
        speed_mps: f64,
    },
    /// Bearing or speed missing/invalid; position only.
    Static,
}

impl Motion {
    /// Build a motion state from optional wire fields, failing closed.
    #[must_use]
    pub fn from_parts(bearing_deg: Option<f64>, speed_mps: Option<f64>) -> Self {
        match (bearing_deg, speed_mps) {
            (Some(b), Some(s)) if b.is_finite() && s.is_finite() && s >= 0.0 => Self::Moving {
                bearing_deg: geo::normalize_bearing(b),
                speed_mps: s,
            },
            _ => Self::Static,
        }
    }
}

/// One live aircraft as reported by a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveAircraft {
    /// Route/aircraft id, stable across polls.
    pub id: RouteId,
    /// Current geographic position.
    pub position: GeoPoint,
    /// Altitude in meters, when reported.
    pub altitude_m: Option<f64>,
    /// Aircraft type id (selects the rendered model/icon).
    pub type_id: u32,
    /// Validated motion state.
    pub motion: Motion,
}

impl LiveAircraft {
    /// Validate wire fields into a live feature.
    ///
    /// Coordinates out of range are an error; missing or non-finite
    /// bearing/speed degrade to [`Motion::Static`].
    pub fn new(
        id: RouteId,
        position: GeoPoint,
        type_id: u32,
        altitude_m: Option<f64>,
        bearing_deg: Option<f64>,
        speed_mps: Option<f64>,
    ) -> Result<Self, ModelError> {
        if !position.is_valid() {
            return Err(ModelError::CoordinateOutOfRange {
                lon: position.lon,
                lat: position.lat,
            });
        }
        Ok(Self {
            id,
            position,
            altitude_m: altitude_m.filter(|a| a.is_finite()),
            type_id,
            motion: Motion::from_parts(bearing_deg, speed_mps),
        })
    }
}

/// One recorded point of a route's historical path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub position: GeoPoint,
    pub altitude_m: f64,
    pub bearing_deg: f64,
    pub speed_mps: f64,
    pub time: DateTime<Utc>,
}

/// Historical ground truth for a route, immutable once loaded.
///
/// Carries a precomputed cumulative-distance table so scrub metrics don't
/// re-walk the path on every slider move.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePath {
    points: Vec<PathPoint>,
    cumulative_m: Vec<f64>,
}

impl RoutePath {
    #[must_use]
    pub fn new(points: Vec<PathPoint>) -> Self {
        let mut cumulative_m = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (i, point) in points.iter().enumerate() {
            if i > 0 {
                total += geo::distance(points[i - 1].position, point.position, DistanceUnit::Meters);
            }
            cumulative_m.push(total);
        }
        Self { points, cumulative_m }
    }

    #[must_use]
    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn point(&self, index: usize) -> Option<&PathPoint> {
        self.points.get(index)
    }

    #[must_use]
    pub fn last(&self) -> Option<&PathPoint> {
        self.points.last()
    }

    /// Distance in meters from the route start to the point at `index`.
    #[must_use]
    pub fn traveled_m(&self, index: usize) -> f64 {
        if self.cumulative_m.is_empty() {
            return 0.0;
        }
        let clamped = index.min(self.cumulative_m.len() - 1);
        self.cumulative_m[clamped]
    }

    /// Total route length in meters.
    #[must_use]
    pub fn total_length_m(&self) -> f64 {
        self.cumulative_m.last().copied().unwrap_or(0.0)
    }
}

/// A start or finish airport attached to a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub id: i64,
    pub name: String,
    pub position: GeoPoint,
}

/// Live telemetry displayed for an open route, refreshed from snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveStats {
    pub speed_mps: f64,
    pub altitude_m: f64,
    pub bearing_deg: f64,
    pub last_update: DateTime<Utc>,
}

/// Full route detail as returned by the route feed.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDetail {
    pub id: RouteId,
    pub path: RoutePath,
    pub start_airport: Airport,
    pub finish_airport: Airport,
    pub aircraft_type_id: u32,
    pub stats: LiveStats,
}
