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

//! Shared test doubles.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::layer::{LayerKind, MapSurface, Viewport};

/// A surface that records redraw requests and serves a settable viewport.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    viewport: Mutex<Option<Viewport>>,
    redraws: Mutex<HashMap<LayerKind, u64>>,
    tile_refreshes: Mutex<Vec<i64>>,
}

impl RecordingSurface {
    pub fn set_viewport(&self, viewport: Viewport) {
        *self.viewport.lock().unwrap() = Some(viewport);
    }

    pub fn redraws(&self, layer: LayerKind) -> u64 {
        self.redraws
            .lock()
            .unwrap()
            .get(&layer)
            .copied()
            .unwrap_or(0)
    }

    pub fn tile_refreshes(&self) -> usize {
        self.tile_refreshes.lock().unwrap().len()
    }
}

impl MapSurface for RecordingSurface {
    fn viewport(&self) -> Option<Viewport> {
        *self.viewport.lock().unwrap()
    }

    fn request_redraw(&self, layer: LayerKind) {
        *self.redraws.lock().unwrap().entry(layer).or_insert(0) += 1;
    }

    fn refresh_tiled(&self, cache_key: i64) {
        self.tile_refreshes.lock().unwrap().push(cache_key);
    }
}
