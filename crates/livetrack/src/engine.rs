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

//! The synchronous tracking engine.
//!
//! [`TrackEngine`] owns every display layer, the extrapolation task
//! registry, and the route inspection state machine. All mutation happens
//! through short synchronous methods, so each snapshot application or
//! frame tick is atomic from any reader's perspective and fully
//! deterministic under an injected [`Clock`]. The async service layer in
//! the crate root drives it from timers; tests drive it directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use tokio::sync::broadcast;

use crate::cadence::CadenceConfig;
use crate::clock::Clock;
use crate::extrapolate::FrameDriver;
use crate::feed::FetchError;
use crate::layer::{LayerKind, LayerSet, MapSurface};
use crate::model::{LiveAircraft, RouteDetail, RouteId, NO_ROUTE};
use crate::route::{RouteInspection, RouteView};

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Poll cadence curve.
    pub cadence: CadenceConfig,
    /// Refresh the traveled tail every this many frame ticks.
    pub tail_refresh_ticks: u32,
    /// Buffered capacity of the event channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cadence: CadenceConfig::default(),
            tail_refresh_ticks: 10,
            event_capacity: 256,
        }
    }
}

/// Events emitted as engine state changes.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A live snapshot was applied with this many aircraft.
    SnapshotApplied { aircraft: usize },
    /// A live snapshot fetch failed; previous features were kept.
    SnapshotFailed,
    /// Route detail loaded and the inspection opened.
    RouteOpened(RouteId),
    /// The inspection closed and its layers were cleared.
    RouteClosed(RouteId),
    /// The requested route does not exist. One-shot user notification.
    RouteNotFound(RouteId),
    /// Route detail fetch failed transiently.
    RouteLoadFailed(RouteId),
    /// The scrub marker moved to a new path index.
    ScrubMoved { route_id: RouteId, index: usize },
}

/// Live-map tracking engine.
pub struct TrackEngine {
    config: EngineConfig,
    layers: LayerSet,
    driver: FrameDriver,
    inspection: RouteInspection,
    clock: Arc<dyn Clock>,
    surface: Arc<dyn MapSurface>,
    events: broadcast::Sender<EngineEvent>,
    last_tick: Option<Instant>,
}

impl std::fmt::Debug for TrackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackEngine")
            .field("live_features", &self.layers.live.len())
            .field("tasks", &self.driver.registry().len())
            .field("inspection", &self.inspection)
            .finish_non_exhaustive()
    }
}

impl TrackEngine {
    #[must_use]
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>, surface: Arc<dyn MapSurface>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        let driver = FrameDriver::new(config.tail_refresh_ticks);
        Self {
            config,
            layers: LayerSet::default(),
            driver,
            inspection: RouteInspection::Closed,
            clock,
            surface,
            events,
            last_tick: None,
        }
    }

    /// Subscribe to engine events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<EngineEvent> {
        self.events.clone()
    }

    #[must_use]
    pub fn cadence(&self) -> &CadenceConfig {
        &self.config.cadence
    }

    #[must_use]
    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    #[must_use]
    pub fn inspection(&self) -> &RouteInspection {
        &self.inspection
    }

    #[must_use]
    pub fn task_count(&self) -> usize {
        self.driver.registry().len()
    }

    /// Apply one fetched snapshot to the live layer.
    ///
    /// Empty or failed results leave the layer and the running tasks
    /// untouched so transient feed hiccups never blank the display. A
    /// non-empty result is built off-layer and swapped in atomically,
    /// re-anchoring tasks for surviving ids and cancelling departed ones.
    pub fn apply_snapshot(&mut self, result: Result<Vec<LiveAircraft>, FetchError>) {
        if self.inspection.route_id() == Some(NO_ROUTE) {
            debug!("inspection holds a placeholder route, skipping snapshot");
            return;
        }

        let batch = match result {
            Err(err) => {
                warn!("live snapshot fetch failed, keeping previous features: {err}");
                let _ = self.events.send(EngineEvent::SnapshotFailed);
                return;
            }
            Ok(batch) if batch.is_empty() => {
                debug!(
                    "empty live snapshot, keeping {} previous features",
                    self.layers.live.len()
                );
                return;
            }
            Ok(batch) => batch,
        };

        let now = self.clock.now();
        let mut fresh: HashMap<RouteId, LiveAircraft> = HashMap::with_capacity(batch.len());
        for aircraft in batch {
            fresh.insert(aircraft.id, aircraft);
        }

        self.driver.registry_mut().sync(&fresh, now);

        if let RouteInspection::Open(view) = &mut self.inspection {
            if let Some(aircraft) = fresh.get(&view.detail.id) {
                view.update_live_stats(aircraft);
            }
        }

        let count = fresh.len();
        self.layers.live.replace_all(fresh);
        self.surface.request_redraw(LayerKind::Live);
        let _ = self.events.send(EngineEvent::SnapshotApplied { aircraft: count });
    }

    /// Advance one display frame: dead-reckon every live task, advance
    /// playback, and refresh the traveled tail when due.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        let outcome = self.driver.tick(&mut self.layers.live, now);
        if outcome.moved {
            self.surface.request_redraw(LayerKind::Live);
        }

        if let Some(last) = self.last_tick {
            let elapsed = now.saturating_duration_since(last);
            let scrubbed = match &mut self.inspection {
                RouteInspection::Open(view) => view.advance_playback(elapsed),
                _ => false,
            };
            if scrubbed {
                self.refresh_slider();
            }
        }
        self.last_tick = Some(now);

        if outcome.tail_due {
            self.refresh_tail();
        }
    }

    /// Start loading a route for inspection. Returns false when the id is
    /// the placeholder or the route is already open.
    pub fn begin_route_load(&mut self, route_id: RouteId) -> bool {
        if route_id == NO_ROUTE {
            warn!("refusing to open placeholder route id");
            return false;
        }
        if self.inspection.route_id() == Some(route_id) && self.inspection.is_open() {
            debug!("route {route_id} already open");
            return false;
        }
        self.inspection = RouteInspection::Loading { route_id };
        true
    }

    /// Complete a route load with the fetch result.
    ///
    /// Stale completions (the user moved on while the fetch was in
    /// flight) are ignored, keeping the engine idempotent under
    /// out-of-order callbacks.
    pub fn complete_route_load(
        &mut self,
        route_id: RouteId,
        result: Result<Option<RouteDetail>, FetchError>,
    ) {
        match &self.inspection {
            RouteInspection::Loading { route_id: current } if *current == route_id => {}
            _ => {
                debug!("ignoring stale route load for {route_id}");
                return;
            }
        }

        match result {
            Ok(Some(detail)) => {
                let view = RouteView::new(detail);
                self.layers.route_path.replace(vec![view.path_shape()]);
                self.layers.stations.replace(view.station_markers());
                self.inspection = RouteInspection::Open(Box::new(view));
                self.surface.request_redraw(LayerKind::RoutePath);
                self.surface.request_redraw(LayerKind::Stations);
                self.refresh_slider();
                info!("route {route_id} opened");
                let _ = self.events.send(EngineEvent::RouteOpened(route_id));
            }
            Ok(None) => {
                warn!("route {route_id} not found");
                self.inspection = RouteInspection::Closed;
                let _ = self.events.send(EngineEvent::RouteNotFound(route_id));
            }
            Err(err) => {
                warn!("route {route_id} detail fetch failed: {err}");
                self.inspection = RouteInspection::Closed;
                let _ = self.events.send(EngineEvent::RouteLoadFailed(route_id));
            }
        }
    }

    /// Close the inspection and clear every route-scoped layer in one
    /// mutation.
    pub fn close_route(&mut self) {
        let Some(route_id) = self.inspection.route_id() else {
            return;
        };
        self.inspection = RouteInspection::Closed;
        self.layers.clear_route_layers();
        for kind in [
            LayerKind::RoutePath,
            LayerKind::TraveledTail,
            LayerKind::SliderMarker,
            LayerKind::Stations,
        ] {
            self.surface.request_redraw(kind);
        }
        info!("route {route_id} closed");
        let _ = self.events.send(EngineEvent::RouteClosed(route_id));
    }

    /// Move the scrub index, clamping out-of-range values.
    pub fn set_scrub_index(&mut self, index: i64) {
        let changed = match &mut self.inspection {
            RouteInspection::Open(view) => view.set_index(index),
            _ => return,
        };
        if changed {
            self.refresh_slider();
        }
    }

    /// Start or stop scrub playback.
    pub fn set_playing(&mut self, playing: bool) {
        let changed = match &mut self.inspection {
            RouteInspection::Open(view) => {
                let was = view.index();
                view.set_playing(playing);
                view.index() != was
            }
            _ => return,
        };
        if changed {
            self.refresh_slider();
        }
    }

    /// Change the playback speed multiplier.
    pub fn set_playback_speed(&mut self, speed: f64) {
        if let RouteInspection::Open(view) = &mut self.inspection {
            view.set_playback_speed(speed);
        }
    }

    fn refresh_slider(&mut self) {
        let (marker, route_id, index) = match &self.inspection {
            RouteInspection::Open(view) => match view.slider_marker() {
                Some(marker) => (marker, view.detail.id, view.index()),
                None => return,
            },
            _ => return,
        };
        self.layers.slider.replace(vec![marker]);
        self.surface.request_redraw(LayerKind::SliderMarker);
        let _ = self.events.send(EngineEvent::ScrubMoved { route_id, index });
    }

    fn refresh_tail(&mut self) {
        let route_id = match &self.inspection {
            RouteInspection::Open(view) => view.detail.id,
            _ => return,
        };
        // Aircraft currently unseen: keep the last tail instead of
        // flickering it away.
        let (live_position, altitude_m) = match self.layers.live.get(route_id) {
            Some(aircraft) => (aircraft.position, aircraft.altitude_m),
            None => return,
        };
        let segment = match &self.inspection {
            RouteInspection::Open(view) => view.tail_segment(live_position, altitude_m),
            _ => return,
        };
        let Some(segment) = segment else { return };
        self.layers.tail.replace(vec![segment]);
        self.surface.request_redraw(LayerKind::TraveledTail);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::geo::{self, GeoPoint};
    use crate::layer::Shape;
    use crate::model::{Airport, LiveStats, Motion, PathPoint, RoutePath};
    use crate::testutil::RecordingSurface;
    use chrono::Utc;

    fn engine_with(clock: Arc<ManualClock>, surface: Arc<RecordingSurface>) -> TrackEngine {
        TrackEngine::new(EngineConfig::default(), clock, surface)
    }

    fn moving(id: RouteId, lon: f64, lat: f64, bearing: f64, speed: f64) -> LiveAircraft {
        LiveAircraft {
            id,
            position: GeoPoint::new(lon, lat),
            altitude_m: Some(3000.0),
            type_id: 1,
            motion: Motion::Moving {
                bearing_deg: bearing,
                speed_mps: speed,
            },
        }
    }

    fn route_detail(id: RouteId, points: usize) -> RouteDetail {
        let t0 = Utc::now();
        let mut position = GeoPoint::new(28.0, 41.0);
        let mut path = Vec::with_capacity(points);
        for i in 0..points {
            path.push(PathPoint {
                position,
                altitude_m: 1000.0,
                bearing_deg: 90.0,
                speed_mps: 120.0,
                time: t0 + chrono::Duration::seconds(i as i64 * 10),
            });
            position = geo::destination(position, 1000.0, 90.0);
        }
        RouteDetail {
            id,
            path: RoutePath::new(path),
            start_airport: Airport {
                id: 1,
                name: "Start".to_string(),
                position: GeoPoint::new(28.0, 41.0),
            },
            finish_airport: Airport {
                id: 2,
                name: "Finish".to_string(),
                position,
            },
            aircraft_type_id: 4,
            stats: LiveStats {
                speed_mps: 120.0,
                altitude_m: 1000.0,
                bearing_deg: 90.0,
                last_update: t0,
            },
        }
    }

    #[test]
    fn test_failed_and_empty_snapshots_keep_previous_features() {
        let clock = Arc::new(ManualClock::new());
        let surface = Arc::new(RecordingSurface::default());
        let mut engine = engine_with(clock, surface);

        engine.apply_snapshot(Ok(vec![moving(1, 28.0, 41.0, 90.0, 100.0)]));
        assert_eq!(engine.layers().live.len(), 1);
        assert_eq!(engine.task_count(), 1);

        engine.apply_snapshot(Err(FetchError::Network("connection reset".to_string())));
        assert_eq!(engine.layers().live.len(), 1);
        assert_eq!(engine.task_count(), 1);

        engine.apply_snapshot(Ok(Vec::new()));
        assert_eq!(engine.layers().live.len(), 1);
        assert_eq!(engine.task_count(), 1);
    }

    #[test]
    fn test_snapshot_supersession_cancels_departed_tasks() {
        let clock = Arc::new(ManualClock::new());
        let surface = Arc::new(RecordingSurface::default());
        let mut engine = engine_with(Arc::clone(&clock), surface);

        engine.apply_snapshot(Ok(vec![
            moving(1, 28.0, 41.0, 90.0, 100.0),
            moving(2, 29.0, 40.0, 180.0, 150.0),
            moving(3, 30.0, 39.0, 270.0, 200.0),
        ]));
        assert_eq!(engine.task_count(), 3);

        clock.advance(Duration::from_secs(5));
        engine.apply_snapshot(Ok(vec![
            moving(1, 28.1, 41.0, 90.0, 100.0),
            moving(2, 29.0, 40.1, 180.0, 150.0),
        ]));

        // Feature 3 left the layer with the swap; its task dies on the
        // next tick while 1 and 2 keep extrapolating from fresh anchors.
        assert_eq!(engine.layers().live.len(), 2);
        clock.advance(Duration::from_millis(50));
        engine.tick();
        assert_eq!(engine.task_count(), 2);
    }

    #[test]
    fn test_dead_reckoning_end_to_end() {
        let clock = Arc::new(ManualClock::new());
        let surface = Arc::new(RecordingSurface::default());
        let mut engine = engine_with(Arc::clone(&clock), Arc::clone(&surface));

        // Snapshot at t=0: id 42 at (28.0, 41.0), bearing 90, 250 m/s
        engine.apply_snapshot(Ok(vec![moving(42, 28.0, 41.0, 90.0, 250.0)]));

        // No new snapshot for 2 s
        clock.advance(Duration::from_secs(2));
        engine.tick();

        let expected = geo::destination(GeoPoint::new(28.0, 41.0), 500.0, 90.0);
        let got = engine.layers().live.get(42).unwrap().position;
        assert!((got.lon - expected.lon).abs() < 1e-9, "got {got:?}");
        assert!((got.lat - expected.lat).abs() < 1e-9);
        assert!(surface.redraws(LayerKind::Live) >= 2);
    }

    #[test]
    fn test_static_feature_never_gets_a_task() {
        let clock = Arc::new(ManualClock::new());
        let surface = Arc::new(RecordingSurface::default());
        let mut engine = engine_with(Arc::clone(&clock), surface);

        let mut no_speed = moving(9, 28.0, 41.0, 90.0, 0.0);
        no_speed.motion = Motion::Static;
        engine.apply_snapshot(Ok(vec![no_speed]));

        assert_eq!(engine.layers().live.len(), 1);
        assert_eq!(engine.task_count(), 0);

        clock.advance(Duration::from_secs(10));
        engine.tick();
        assert_eq!(
            engine.layers().live.get(9).unwrap().position,
            GeoPoint::new(28.0, 41.0)
        );
    }

    #[test]
    fn test_route_open_close_clears_layers_atomically() {
        let clock = Arc::new(ManualClock::new());
        let surface = Arc::new(RecordingSurface::default());
        let mut engine = engine_with(clock, surface);

        assert!(engine.begin_route_load(42));
        engine.complete_route_load(42, Ok(Some(route_detail(42, 5))));
        assert!(engine.inspection().is_open());
        assert_eq!(engine.layers().route_path.len(), 1);
        assert_eq!(engine.layers().stations.len(), 2);
        assert_eq!(engine.layers().slider.len(), 1);

        engine.close_route();
        assert!(matches!(engine.inspection(), RouteInspection::Closed));
        assert_eq!(engine.layers().route_path.len(), 0);
        assert_eq!(engine.layers().tail.len(), 0);
        assert_eq!(engine.layers().slider.len(), 0);
        assert_eq!(engine.layers().stations.len(), 0);
    }

    #[test]
    fn test_route_not_found_surfaces_event_and_stays_closed() {
        let clock = Arc::new(ManualClock::new());
        let surface = Arc::new(RecordingSurface::default());
        let mut engine = engine_with(clock, surface);
        let mut events = engine.subscribe();

        assert!(engine.begin_route_load(7));
        engine.complete_route_load(7, Ok(None));
        assert!(matches!(engine.inspection(), RouteInspection::Closed));
        assert!(matches!(
            events.try_recv().unwrap(),
            EngineEvent::RouteNotFound(7)
        ));
    }

    #[test]
    fn test_stale_route_load_is_ignored() {
        let clock = Arc::new(ManualClock::new());
        let surface = Arc::new(RecordingSurface::default());
        let mut engine = engine_with(clock, surface);

        assert!(engine.begin_route_load(7));
        // User switched to another route while 7 was loading
        assert!(engine.begin_route_load(8));
        engine.complete_route_load(7, Ok(Some(route_detail(7, 3))));
        assert!(!engine.inspection().is_open());

        engine.complete_route_load(8, Ok(Some(route_detail(8, 3))));
        assert_eq!(engine.inspection().route_id(), Some(8));
    }

    #[test]
    fn test_placeholder_route_blocks_snapshots() {
        let clock = Arc::new(ManualClock::new());
        let surface = Arc::new(RecordingSurface::default());
        let mut engine = engine_with(clock, surface);

        assert!(!engine.begin_route_load(NO_ROUTE));

        // Force the placeholder in via Loading to exercise the guard
        engine.inspection = RouteInspection::Loading { route_id: NO_ROUTE };
        engine.apply_snapshot(Ok(vec![moving(1, 28.0, 41.0, 90.0, 100.0)]));
        assert_eq!(engine.layers().live.len(), 0);
    }

    #[test]
    fn test_scrub_clamps_and_moves_slider() {
        let clock = Arc::new(ManualClock::new());
        let surface = Arc::new(RecordingSurface::default());
        let mut engine = engine_with(clock, Arc::clone(&surface));

        assert!(engine.begin_route_load(42));
        engine.complete_route_load(42, Ok(Some(route_detail(42, 5))));

        engine.set_scrub_index(2);
        engine.set_scrub_index(-5);
        engine.set_scrub_index(999);

        let RouteInspection::Open(view) = engine.inspection() else {
            panic!("route should be open");
        };
        assert_eq!(view.index(), 4);
        assert!(surface.redraws(LayerKind::SliderMarker) >= 3);
    }

    #[test]
    fn test_tail_refreshes_on_schedule_and_survives_missing_feature() {
        let clock = Arc::new(ManualClock::new());
        let surface = Arc::new(RecordingSurface::default());
        let mut engine = engine_with(Arc::clone(&clock), surface);

        assert!(engine.begin_route_load(42));
        engine.complete_route_load(42, Ok(Some(route_detail(42, 3))));
        engine.apply_snapshot(Ok(vec![moving(42, 28.05, 41.0, 90.0, 200.0)]));

        // Ten frame ticks trigger one tail refresh
        for _ in 0..10 {
            clock.advance(Duration::from_millis(50));
            engine.tick();
        }
        assert_eq!(engine.layers().tail.len(), 1);
        let tail_before = engine.layers().tail.shapes()[0].clone();

        // Snapshot without the inspected aircraft: the tail keeps its
        // last value instead of clearing
        engine.apply_snapshot(Ok(vec![moving(99, 30.0, 40.0, 0.0, 100.0)]));
        for _ in 0..10 {
            clock.advance(Duration::from_millis(50));
            engine.tick();
        }
        assert_eq!(engine.layers().tail.len(), 1);
        assert_eq!(engine.layers().tail.shapes()[0], tail_before);
    }

    #[test]
    fn test_snapshot_refreshes_open_route_stats() {
        let clock = Arc::new(ManualClock::new());
        let surface = Arc::new(RecordingSurface::default());
        let mut engine = engine_with(clock, surface);

        assert!(engine.begin_route_load(42));
        engine.complete_route_load(42, Ok(Some(route_detail(42, 3))));

        let mut update = moving(42, 28.2, 41.0, 100.0, 180.0);
        update.altitude_m = Some(4200.0);
        engine.apply_snapshot(Ok(vec![update]));

        let RouteInspection::Open(view) = engine.inspection() else {
            panic!("route should be open");
        };
        assert_eq!(view.detail.stats.speed_mps, 180.0);
        assert_eq!(view.detail.stats.bearing_deg, 100.0);
        assert_eq!(view.detail.stats.altitude_m, 4200.0);
    }

    #[test]
    fn test_playback_drives_slider_through_ticks() {
        let clock = Arc::new(ManualClock::new());
        let surface = Arc::new(RecordingSurface::default());
        let mut engine = engine_with(Arc::clone(&clock), surface);

        assert!(engine.begin_route_load(42));
        engine.complete_route_load(42, Ok(Some(route_detail(42, 4))));
        engine.set_scrub_index(0);
        engine.set_playing(true);
        engine.set_playback_speed(1.0);

        engine.tick(); // establishes last_tick
        clock.advance(Duration::from_secs(1));
        engine.tick();

        let RouteInspection::Open(view) = engine.inspection() else {
            panic!("route should be open");
        };
        assert_eq!(view.index(), 1);
        let marker = &engine.layers().slider.shapes()[0];
        let Shape::Marker { position, .. } = marker else {
            panic!("expected marker");
        };
        assert_eq!(*position, view.detail.path.point(1).unwrap().position);
    }
}
