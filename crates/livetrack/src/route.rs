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

//! Route inspection: state machine, scrub animator, and playback.
//!
//! A selected route moves `Closed -> Loading -> Open` (or back to `Closed`
//! on a failed or not-found fetch). While open, the scrub index walks the
//! historical path and derives display metrics; playback advances the
//! index automatically under a speed multiplier. The scrub marker is a
//! separate layer from the live dead-reckoned marker and the two never
//! overwrite each other.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

use crate::geo::{self, DistanceUnit, GeoPoint};
use crate::layer::Shape;
use crate::model::{LiveAircraft, Motion, PathPoint, RouteDetail, RouteId, RoutePath};

/// Lifecycle of the route inspection panel.
#[derive(Debug)]
pub enum RouteInspection {
    /// Nothing selected.
    Closed,
    /// Detail fetch in flight.
    Loading { route_id: RouteId },
    /// Route detail loaded and layers populated.
    Open(Box<RouteView>),
}

impl RouteInspection {
    /// The inspected route id in `Loading` or `Open`.
    #[must_use]
    pub fn route_id(&self) -> Option<RouteId> {
        match self {
            Self::Closed => None,
            Self::Loading { route_id } => Some(*route_id),
            Self::Open(view) => Some(view.detail.id),
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}

/// Metrics derived for the current scrub position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrubMetrics {
    pub position: GeoPoint,
    pub altitude_m: f64,
    pub bearing_deg: f64,
    /// Meters traveled from the route start to this index.
    pub traveled_m: f64,
    /// Traveled / total, as a percentage rounded to two decimals.
    /// Zero when the route has no length.
    pub percent: f64,
    pub time: DateTime<Utc>,
}

/// Scrub playback state.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Playback {
    playing: bool,
    speed: f64,
    /// Fractional steps carried between frames.
    carry: f64,
}

impl Playback {
    fn new() -> Self {
        Self {
            playing: false,
            speed: 1.0,
            carry: 0.0,
        }
    }
}

/// An open route: detail, scrub index, playback.
#[derive(Debug)]
pub struct RouteView {
    pub detail: RouteDetail,
    index: usize,
    playback: Playback,
}

impl RouteView {
    /// Open a route with the scrub positioned at the most recent point.
    #[must_use]
    pub fn new(detail: RouteDetail) -> Self {
        let index = detail.path.len().saturating_sub(1);
        Self {
            detail,
            index,
            playback: Playback::new(),
        }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Move the scrub index, clamping out-of-range input to the nearest
    /// boundary. Returns true when the index actually changed.
    pub fn set_index(&mut self, index: i64) -> bool {
        if self.detail.path.is_empty() {
            return false;
        }
        let max = self.detail.path.len() as i64 - 1;
        let clamped = index.clamp(0, max) as usize;
        if clamped == self.index {
            return false;
        }
        self.index = clamped;
        true
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playback.playing
    }

    /// Start or stop playback. Starting from the final point rewinds to
    /// the beginning first.
    pub fn set_playing(&mut self, playing: bool) {
        if playing && self.index + 1 >= self.detail.path.len() {
            self.index = 0;
        }
        self.playback.playing = playing;
        self.playback.carry = 0.0;
    }

    /// Playback speed multiplier in path points per second.
    pub fn set_playback_speed(&mut self, speed: f64) {
        if speed.is_finite() && speed > 0.0 {
            self.playback.speed = speed;
        }
    }

    /// Advance playback by a frame's elapsed time. Returns true when the
    /// scrub index moved. Playback pauses itself at the final point.
    pub fn advance_playback(&mut self, elapsed: Duration) -> bool {
        if !self.playback.playing || self.detail.path.len() < 2 {
            return false;
        }
        self.playback.carry += elapsed.as_secs_f64() * self.playback.speed;
        let steps = self.playback.carry.floor() as usize;
        if steps == 0 {
            return false;
        }
        self.playback.carry -= steps as f64;

        let last = self.detail.path.len() - 1;
        self.index = (self.index + steps).min(last);
        if self.index == last {
            self.playback.playing = false;
        }
        true
    }

    /// Metrics for the current scrub index.
    #[must_use]
    pub fn metrics(&self) -> Option<ScrubMetrics> {
        let point = self.detail.path.point(self.index)?;
        let traveled = self.detail.path.traveled_m(self.index);
        let total = self.detail.path.total_length_m();
        let percent = if total > 0.0 {
            round2(traveled / total * 100.0)
        } else {
            0.0
        };
        Some(ScrubMetrics {
            position: point.position,
            altitude_m: point.altitude_m,
            bearing_deg: point.bearing_deg,
            traveled_m: traveled,
            percent,
            time: point.time,
        })
    }

    /// Slider marker shape for the current scrub index.
    #[must_use]
    pub fn slider_marker(&self) -> Option<Shape> {
        let point = self.detail.path.point(self.index)?;
        Some(Shape::Marker {
            position: point.position,
            bearing_deg: point.bearing_deg,
            altitude_m: Some(point.altitude_m),
            label: None,
        })
    }

    /// The full historical path as one line shape.
    #[must_use]
    pub fn path_shape(&self) -> Shape {
        Shape::Line {
            points: self.detail.path.points().iter().map(|p| p.position).collect(),
            altitude_m: None,
        }
    }

    /// Start/finish airport markers.
    #[must_use]
    pub fn station_markers(&self) -> Vec<Shape> {
        [&self.detail.start_airport, &self.detail.finish_airport]
            .into_iter()
            .map(|airport| Shape::Marker {
                position: airport.position,
                bearing_deg: 0.0,
                altitude_m: None,
                label: Some(airport.name.clone()),
            })
            .collect()
    }

    /// Traveled-tail segment from the last historical point to the live
    /// extrapolated position.
    #[must_use]
    pub fn tail_segment(&self, live_position: GeoPoint, altitude_m: Option<f64>) -> Option<Shape> {
        let last = self.detail.path.last()?;
        Some(Shape::Line {
            points: vec![last.position, live_position],
            altitude_m,
        })
    }

    /// Refresh the displayed live telemetry from a fresh snapshot feature.
    pub fn update_live_stats(&mut self, aircraft: &LiveAircraft) {
        if let Motion::Moving {
            bearing_deg,
            speed_mps,
        } = aircraft.motion
        {
            self.detail.stats.bearing_deg = bearing_deg;
            self.detail.stats.speed_mps = speed_mps;
        }
        if let Some(altitude) = aircraft.altitude_m {
            self.detail.stats.altitude_m = altitude;
        }
        self.detail.stats.last_update = Utc::now();
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Densify a historical path into one point per second.
///
/// Each recorded segment is split along its great circle with linearly
/// interpolated altitude, the segment's initial bearing, and its mean
/// speed, giving playback smooth per-second steps between sparse recorded
/// points. Segments with non-positive time spans are skipped.
#[must_use]
pub fn interpolate_steps(path: &RoutePath) -> Vec<PathPoint> {
    let mut steps = Vec::new();
    for pair in path.points().windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let span_secs = (b.time - a.time).num_seconds();
        if span_secs <= 0 {
            continue;
        }
        let span = span_secs as f64;
        let segment_m = geo::distance(a.position, b.position, DistanceUnit::Meters);
        let speed = segment_m / span;
        let bearing = geo::bearing(a.position, b.position);

        for second in 0..span_secs {
            let fraction = second as f64 / span;
            steps.push(PathPoint {
                position: geo::destination(a.position, segment_m * fraction, bearing),
                altitude_m: a.altitude_m + (b.altitude_m - a.altitude_m) * fraction,
                bearing_deg: bearing,
                speed_mps: speed,
                time: a.time + ChronoDuration::seconds(second),
            });
        }
    }
    steps
}
