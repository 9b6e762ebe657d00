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

//! Zoom-dependent poll cadence.
//!
//! The refresh interval follows an inverse-exponential curve anchored at
//! two reference points: the baseline interval at zoom 0 and a fast
//! interval at the reference zoom. Zoomed out, many aircraft are visible
//! and the batched tile layer refreshes slowly; past the live threshold
//! the tile layer is suspended and the bounding-box live fetcher takes
//! over on the same curve, clamped to a floor.

use std::time::Duration;

/// Tunables for the poll cadence curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CadenceConfig {
    /// Interval at zoom 0.
    pub base_interval: Duration,
    /// Interval at `fast_zoom`.
    pub fast_interval: Duration,
    /// Reference zoom where `fast_interval` applies.
    pub fast_zoom: f64,
    /// Above this zoom, tiled polling stops and live fetching starts.
    pub live_zoom_threshold: f64,
    /// Hard floor for the interval at any zoom.
    pub min_interval: Duration,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(3600),
            fast_interval: Duration::from_secs(2),
            fast_zoom: 10.0,
            live_zoom_threshold: 10.0,
            min_interval: Duration::from_secs(1),
        }
    }
}

/// Which refresh path is active at the current zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Refresh the batched tile source.
    Tiled { interval: Duration },
    /// Fetch live features for the visible bounding box.
    Live { interval: Duration },
}

impl RefreshMode {
    #[must_use]
    pub fn interval(&self) -> Duration {
        match self {
            Self::Tiled { interval } | Self::Live { interval } => *interval,
        }
    }
}

impl CadenceConfig {
    /// Polling interval for a zoom level.
    ///
    /// Positive, finite, and non-increasing in zoom; non-finite or
    /// negative zooms get the baseline interval, arbitrarily large zooms
    /// are clamped to the floor.
    #[must_use]
    pub fn interval_for_zoom(&self, zoom: f64) -> Duration {
        if !zoom.is_finite() || zoom <= 0.0 {
            return self.base_interval;
        }

        let base_ms = millis(self.base_interval);
        let fast_ms = millis(self.fast_interval);
        let floor_ms = millis(self.min_interval);

        // factor^fast_zoom == fast/base, so the curve passes through both anchors
        let factor = (base_ms / fast_ms).powf(-1.0 / self.fast_zoom);
        let ms = (base_ms * factor.powf(zoom)).clamp(floor_ms, base_ms);

        Duration::from_millis(ms.round() as u64)
    }

    /// Refresh mode and interval for a zoom level.
    #[must_use]
    pub fn refresh_mode(&self, zoom: f64) -> RefreshMode {
        let interval = self.interval_for_zoom(zoom);
        if zoom.is_finite() && zoom > self.live_zoom_threshold {
            RefreshMode::Live { interval }
        } else {
            RefreshMode::Tiled { interval }
        }
    }
}

fn millis(d: Duration) -> f64 {
    d.as_millis() as f64
}
