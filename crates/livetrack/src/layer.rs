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

//! Display layers and the rendering-surface seam.
//!
//! The engine stores geographic coordinates only; projection to the
//! rendering surface's coordinate system happens entirely on the
//! [`MapSurface`] side. Layer contents are replaced wholesale
//! (`replace_all`/`replace`) so a reader never observes a transiently
//! empty layer between clear and repopulate.

use std::collections::HashMap;

use crate::geo::{BoundingBox, GeoPoint};
use crate::model::{LiveAircraft, RouteId};

/// The display layers the engine writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Live aircraft markers, dead-reckoned between snapshots.
    Live,
    /// The selected route's historical path line.
    RoutePath,
    /// Segment linking the path's last point to the live position.
    TraveledTail,
    /// The scrub slider's marker.
    SliderMarker,
    /// Start/finish airport markers.
    Stations,
}

/// Current map view, owned by the rendering collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: f64,
    pub bbox: BoundingBox,
}

/// Seam to the external map renderer.
///
/// `request_redraw` is a coalesced no-argument signal; the engine may call
/// it once per mutation without worrying about redundant redraws.
pub trait MapSurface: Send + Sync {
    /// Current viewport, if the surface has one yet.
    fn viewport(&self) -> Option<Viewport>;

    /// Ask the renderer to repaint one layer.
    fn request_redraw(&self, layer: LayerKind);

    /// Refresh the batched tile source with a new cache-busting key.
    fn refresh_tiled(&self, cache_key: i64);
}

/// Id-keyed live feature set.
#[derive(Debug, Default)]
pub struct LiveLayer {
    features: HashMap<RouteId, LiveAircraft>,
}

impl LiveLayer {
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: RouteId) -> bool {
        self.features.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: RouteId) -> Option<&LiveAircraft> {
        self.features.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LiveAircraft> {
        self.features.values()
    }

    /// Swap in a freshly built feature set in one step.
    pub fn replace_all(&mut self, features: HashMap<RouteId, LiveAircraft>) {
        self.features = features;
    }

    /// Move one feature. Returns true if the feature exists and actually
    /// changed position.
    pub fn set_position(&mut self, id: RouteId, position: GeoPoint) -> bool {
        match self.features.get_mut(&id) {
            Some(feature) if feature.position != position => {
                feature.position = position;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.features.clear();
    }
}

/// A drawable geometry on one of the auxiliary layers.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// A polyline, optionally tagged with an altitude for styling.
    Line {
        points: Vec<GeoPoint>,
        altitude_m: Option<f64>,
    },
    /// An oriented point marker.
    Marker {
        position: GeoPoint,
        bearing_deg: f64,
        altitude_m: Option<f64>,
        label: Option<String>,
    },
}

/// Plain shape layer for path lines, tail segments, and markers.
#[derive(Debug, Default)]
pub struct ShapeLayer {
    shapes: Vec<Shape>,
}

impl ShapeLayer {
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    #[must_use]
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn replace(&mut self, shapes: Vec<Shape>) {
        self.shapes = shapes;
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
    }
}

/// All layers the engine owns.
#[derive(Debug, Default)]
pub struct LayerSet {
    pub live: LiveLayer,
    pub route_path: ShapeLayer,
    pub tail: ShapeLayer,
    pub slider: ShapeLayer,
    pub stations: ShapeLayer,
}

impl LayerSet {
    /// Clear every route-scoped layer. Called under one engine mutation so
    /// a partial clear is never observable.
    pub fn clear_route_layers(&mut self) {
        self.route_path.clear();
        self.tail.clear();
        self.slider.clear();
        self.stations.clear();
    }
}
