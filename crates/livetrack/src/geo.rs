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

//! Spherical geodesy helpers.
//!
//! All positions are geographic longitude/latitude in degrees
//! (EPSG:4326-equivalent). Forward geodesy, great-circle distance, and
//! bearing computations use a spherical earth model, which is accurate to
//! well under 0.5% over the distances a dead-reckoned aircraft covers
//! between snapshots.

use serde::{Deserialize, Serialize};

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

const METERS_PER_NAUTICAL_MILE: f64 = 1852.0;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude in degrees, -180 to 180.
    pub lon: f64,
    /// Latitude in degrees, -90 to 90.
    pub lat: f64,
}

impl GeoPoint {
    /// Create a new point. Use [`GeoPoint::is_valid`] to check ranges.
    #[must_use]
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Whether both coordinates are finite and within range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

/// Unit for distance results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceUnit {
    /// Meters (the engine's native unit).
    #[default]
    Meters,
    /// Kilometers.
    Kilometers,
    /// Nautical miles.
    NauticalMiles,
}

impl DistanceUnit {
    fn from_meters(self, meters: f64) -> f64 {
        match self {
            Self::Meters => meters,
            Self::Kilometers => meters / 1000.0,
            Self::NauticalMiles => meters / METERS_PER_NAUTICAL_MILE,
        }
    }
}

/// Great-circle distance between two points using the Haversine formula.
///
/// Symmetric in its arguments; zero for identical points.
#[must_use]
pub fn distance(a: GeoPoint, b: GeoPoint, unit: DistanceUnit) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    unit.from_meters(EARTH_RADIUS_M * c)
}

/// Forward geodesy: the point reached by traveling `distance_m` meters from
/// `start` along `bearing_deg` (clockwise from north).
///
/// Numerically stable for zero distance (returns `start`); the bearing is
/// normalized modulo 360 first.
#[must_use]
pub fn destination(start: GeoPoint, distance_m: f64, bearing_deg: f64) -> GeoPoint {
    if distance_m == 0.0 {
        return start;
    }

    let bearing = normalize_bearing(bearing_deg).to_radians();
    let angular = distance_m / EARTH_RADIUS_M;
    let lat1 = start.lat.to_radians();
    let lon1 = start.lon.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    GeoPoint {
        lon: normalize_longitude(lon2.to_degrees()),
        lat: lat2.to_degrees(),
    }
}

/// Initial great-circle bearing from `a` to `b`, in degrees [0, 360).
#[must_use]
pub fn bearing(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    normalize_bearing(y.atan2(x).to_degrees())
}

/// Normalize a bearing into [0, 360).
#[must_use]
pub fn normalize_bearing(bearing_deg: f64) -> f64 {
    let b = bearing_deg % 360.0;
    if b < 0.0 {
        b + 360.0
    } else {
        b
    }
}

fn normalize_longitude(lon: f64) -> f64 {
    let mut l = (lon + 180.0) % 360.0;
    if l < 0.0 {
        l += 360.0;
    }
    l - 180.0
}

/// Rectangular geographic extent in degrees.
///
/// Ordering follows the live-feed wire contract:
/// (`min_lon`, `min_lat`, `max_lon`, `max_lat`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Whether the point lies inside (or on the edge of) the box.
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lon >= self.min_lon
            && point.lon <= self.max_lon
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }
}

/// Smallest bounding box enclosing the given points.
///
/// Returns `None` for an empty slice.
#[must_use]
pub fn bounding_box(points: &[GeoPoint]) -> Option<BoundingBox> {
    let first = points.first()?;
    let mut bbox = BoundingBox {
        min_lon: first.lon,
        min_lat: first.lat,
        max_lon: first.lon,
        max_lat: first.lat,
    };
    for p in &points[1..] {
        bbox.min_lon = bbox.min_lon.min(p.lon);
        bbox.min_lat = bbox.min_lat.min(p.lat);
        bbox.max_lon = bbox.max_lon.max(p.lon);
        bbox.max_lat = bbox.max_lat.max(p.lat);
    }
    Some(bbox)
}
