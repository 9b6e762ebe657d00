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

//! Headless map surface.
//!
//! Stands in for a real renderer: serves the current viewport, counts
//! coalesced redraw requests per layer, and logs tile-source refreshes.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use livetrack::{BoundingBox, GeoPoint, LayerKind, MapSurface, Viewport};
use log::{debug, info};

#[derive(Debug)]
pub struct HeadlessSurface {
    viewport: RwLock<Viewport>,
    redraws: Mutex<HashMap<LayerKind, u64>>,
}

impl HeadlessSurface {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport: RwLock::new(viewport),
            redraws: Mutex::new(HashMap::new()),
        }
    }

    #[allow(dead_code)]
    pub fn set_viewport(&self, viewport: Viewport) {
        *self
            .viewport
            .write()
            .expect("viewport lock poisoned - unrecoverable state") = viewport;
    }

    /// Total redraw requests seen for one layer.
    pub fn redraws(&self, layer: LayerKind) -> u64 {
        self.redraws
            .lock()
            .expect("redraw counter lock poisoned - unrecoverable state")
            .get(&layer)
            .copied()
            .unwrap_or(0)
    }
}

impl MapSurface for HeadlessSurface {
    fn viewport(&self) -> Option<Viewport> {
        Some(
            *self
                .viewport
                .read()
                .expect("viewport lock poisoned - unrecoverable state"),
        )
    }

    fn request_redraw(&self, layer: LayerKind) {
        let mut redraws = self
            .redraws
            .lock()
            .expect("redraw counter lock poisoned - unrecoverable state");
        *redraws.entry(layer).or_insert(0) += 1;
        debug!("redraw requested for {layer:?}");
    }

    fn refresh_tiled(&self, cache_key: i64) {
        info!("tile source refresh requested (cache key {cache_key})");
    }
}

/// Build a viewport centered on a point with an extent matching the zoom
/// level (one world at zoom 0, halving per level).
pub fn viewport_around(center: GeoPoint, zoom: f64) -> Viewport {
    let clamped = zoom.clamp(0.0, 22.0);
    let lon_span = 360.0 / 2_f64.powf(clamped);
    let lat_span = 180.0 / 2_f64.powf(clamped);
    Viewport {
        zoom,
        bbox: BoundingBox {
            min_lon: (center.lon - lon_span / 2.0).max(-180.0),
            min_lat: (center.lat - lat_span / 2.0).max(-90.0),
            max_lon: (center.lon + lon_span / 2.0).min(180.0),
            max_lat: (center.lat + lat_span / 2.0).min(90.0),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_around_shrinks_with_zoom() {
        let center = GeoPoint::new(28.9784, 41.0082);
        let wide = viewport_around(center, 4.0);
        let tight = viewport_around(center, 12.0);

        assert!(wide.bbox.contains(center));
        assert!(tight.bbox.contains(center));
        let wide_span = wide.bbox.max_lon - wide.bbox.min_lon;
        let tight_span = tight.bbox.max_lon - tight.bbox.min_lon;
        assert!(tight_span < wide_span);
    }

    #[test]
    fn test_viewport_around_clamps_to_world() {
        let vp = viewport_around(GeoPoint::new(0.0, 0.0), 0.0);
        assert_eq!(vp.bbox.min_lon, -180.0);
        assert_eq!(vp.bbox.max_lon, 180.0);
        assert_eq!(vp.bbox.min_lat, -90.0);
        assert_eq!(vp.bbox.max_lat, 90.0);
    }

    #[test]
    fn test_redraw_counting() {
        let surface = HeadlessSurface::new(viewport_around(GeoPoint::new(28.0, 41.0), 12.0));
        surface.request_redraw(LayerKind::Live);
        surface.request_redraw(LayerKind::Live);
        surface.request_redraw(LayerKind::TraveledTail);
        assert_eq!(surface.redraws(LayerKind::Live), 2);
        assert_eq!(surface.redraws(LayerKind::TraveledTail), 1);
        assert_eq!(surface.redraws(LayerKind::SliderMarker), 0);
    }
}
