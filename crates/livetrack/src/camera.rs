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

//! Follow-camera helpers.
//!
//! Pure functions mapping an aircraft's altitude to a comfortable viewing
//! band (zoom, pitch, look-ahead distance) and computing a camera center
//! displaced ahead of the aircraft along its bearing. The embedding
//! application decides when to actually fly the camera.

use crate::geo::{self, GeoPoint};

/// Altitude-banded camera parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBand {
    pub min_alt_m: f64,
    pub max_alt_m: f64,
    pub zoom: f64,
    pub pitch_deg: f64,
    /// How far ahead of the aircraft the camera center sits, in meters.
    pub look_ahead_m: f64,
}

const BANDS: [CameraBand; 18] = [
    CameraBand { min_alt_m: 0.0, max_alt_m: 50.0, zoom: 18.1, pitch_deg: 60.0, look_ahead_m: 50.0 },
    CameraBand { min_alt_m: 50.0, max_alt_m: 100.0, zoom: 15.5, pitch_deg: 60.0, look_ahead_m: 300.0 },
    CameraBand { min_alt_m: 100.0, max_alt_m: 500.0, zoom: 15.0, pitch_deg: 60.0, look_ahead_m: 500.0 },
    CameraBand { min_alt_m: 500.0, max_alt_m: 1000.0, zoom: 14.0, pitch_deg: 60.0, look_ahead_m: 800.0 },
    CameraBand { min_alt_m: 1000.0, max_alt_m: 2000.0, zoom: 13.0, pitch_deg: 60.0, look_ahead_m: 1200.0 },
    CameraBand { min_alt_m: 2000.0, max_alt_m: 3000.0, zoom: 12.0, pitch_deg: 60.0, look_ahead_m: 1800.0 },
    CameraBand { min_alt_m: 3000.0, max_alt_m: 4000.0, zoom: 11.5, pitch_deg: 60.0, look_ahead_m: 2500.0 },
    CameraBand { min_alt_m: 4000.0, max_alt_m: 5000.0, zoom: 11.0, pitch_deg: 60.0, look_ahead_m: 3500.0 },
    CameraBand { min_alt_m: 5000.0, max_alt_m: 6000.0, zoom: 10.5, pitch_deg: 60.0, look_ahead_m: 4500.0 },
    CameraBand { min_alt_m: 6000.0, max_alt_m: 7000.0, zoom: 10.0, pitch_deg: 60.0, look_ahead_m: 5500.0 },
    CameraBand { min_alt_m: 7000.0, max_alt_m: 8000.0, zoom: 9.5, pitch_deg: 60.0, look_ahead_m: 6500.0 },
    CameraBand { min_alt_m: 8000.0, max_alt_m: 9000.0, zoom: 9.0, pitch_deg: 60.0, look_ahead_m: 7500.0 },
    CameraBand { min_alt_m: 9000.0, max_alt_m: 10000.0, zoom: 8.5, pitch_deg: 60.0, look_ahead_m: 8500.0 },
    CameraBand { min_alt_m: 10000.0, max_alt_m: 11000.0, zoom: 8.0, pitch_deg: 60.0, look_ahead_m: 9500.0 },
    CameraBand { min_alt_m: 11000.0, max_alt_m: 12000.0, zoom: 7.5, pitch_deg: 60.0, look_ahead_m: 10500.0 },
    CameraBand { min_alt_m: 12000.0, max_alt_m: 13000.0, zoom: 7.0, pitch_deg: 60.0, look_ahead_m: 11500.0 },
    CameraBand { min_alt_m: 13000.0, max_alt_m: 14000.0, zoom: 6.5, pitch_deg: 60.0, look_ahead_m: 12500.0 },
    CameraBand { min_alt_m: 14000.0, max_alt_m: 15000.0, zoom: 6.0, pitch_deg: 60.0, look_ahead_m: 13500.0 },
];

/// Empirical constant for the altitude-to-zoom logarithm.
const ZOOM_ALTITUDE_C: f64 = 26_000_000.0;
const MAX_ZOOM: f64 = 18.0;

/// The camera band covering `altitude_m`; out-of-table altitudes get the
/// highest band.
#[must_use]
pub fn band_for_altitude(altitude_m: f64) -> CameraBand {
    BANDS
        .iter()
        .find(|band| altitude_m >= band.min_alt_m && altitude_m <= band.max_alt_m)
        .copied()
        .unwrap_or(BANDS[BANDS.len() - 1])
}

/// Continuous zoom for an altitude, `log2(C / altitude)` clamped to 18.
#[must_use]
pub fn zoom_for_altitude(altitude_m: f64) -> f64 {
    if altitude_m <= 0.0 {
        return MAX_ZOOM;
    }
    let zoom = (ZOOM_ALTITUDE_C / altitude_m).log2();
    if !zoom.is_finite() || zoom > 18.5 {
        MAX_ZOOM
    } else {
        zoom
    }
}

/// A follow-camera pose the embedding application can fly to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub center: GeoPoint,
    pub zoom: f64,
    pub bearing_deg: f64,
    pub pitch_deg: f64,
}

/// Camera pose tracking an aircraft: centered look-ahead meters in front
/// of it along its bearing, zoomed per its altitude band.
#[must_use]
pub fn follow_view(position: GeoPoint, altitude_m: f64, bearing_deg: f64) -> CameraView {
    let band = band_for_altitude(altitude_m);
    CameraView {
        center: geo::destination(position, band.look_ahead_m, bearing_deg),
        zoom: band.zoom,
        bearing_deg,
        pitch_deg: band.pitch_deg,
    }
}
