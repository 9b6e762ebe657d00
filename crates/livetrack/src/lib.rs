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

//! Dead-reckoning animation engine for live flight-tracking maps.
//!
//! This library takes sparse, periodically polled aircraft state
//! (position, bearing, speed) and produces smooth, continuously updated
//! on-screen positions between polls. The layers can be used independently
//! or composed through the service:
//!
//! - **Geodesy layer** ([`geo`]): destination point, haversine distance,
//!   bearings, bounding boxes
//! - **Engine layer** ([`engine`]): display layers, the extrapolation task
//!   registry and frame driver, route inspection with scrub and playback
//! - **Service layer** ([`LiveMapService`]): zoom-cadenced polling and
//!   fixed-rate frame ticks on tokio, with cancellation and events
//!
//! The map renderer and the data transport stay outside, reached through
//! the [`MapSurface`], [`LiveFeed`], and [`RouteFeed`] traits.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use livetrack::{
//!     BoundingBox, FetchError, LayerKind, LiveAircraft, LiveFeed, LiveMapService, MapSurface,
//!     RouteDetail, RouteFeed, RouteId, ServiceConfig, SystemClock, Viewport,
//! };
//!
//! struct Feed;
//!
//! impl LiveFeed for Feed {
//!     fn fetch_live(&self, _bbox: BoundingBox) -> Result<Vec<LiveAircraft>, FetchError> {
//!         // ...query your flight data service for the visible extent...
//!         Ok(Vec::new())
//!     }
//! }
//!
//! impl RouteFeed for Feed {
//!     fn fetch_route(&self, _route_id: RouteId) -> Result<Option<RouteDetail>, FetchError> {
//!         Ok(None)
//!     }
//! }
//!
//! struct Surface;
//!
//! impl MapSurface for Surface {
//!     fn viewport(&self) -> Option<Viewport> {
//!         Some(Viewport {
//!             zoom: 12.0,
//!             bbox: BoundingBox {
//!                 min_lon: 27.0,
//!                 min_lat: 40.0,
//!                 max_lon: 30.0,
//!                 max_lat: 42.0,
//!             },
//!         })
//!     }
//!     fn request_redraw(&self, _layer: LayerKind) {}
//!     fn refresh_tiled(&self, _cache_key: i64) {}
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let feed = Arc::new(Feed);
//!     let service = LiveMapService::spawn(
//!         ServiceConfig::default(),
//!         feed.clone(),
//!         feed,
//!         Arc::new(Surface),
//!         Arc::new(SystemClock),
//!     );
//!
//!     // The poll and frame loops now keep the layers current.
//!     service.open_route(42);
//!     # service.shutdown();
//! }
//! ```
//!
//! # Using the Engine Directly
//!
//! The synchronous [`TrackEngine`] can be driven without any runtime,
//! which is how the unit tests exercise it with a [`ManualClock`]:
//!
//! ```
//! use std::sync::Arc;
//!
//! use livetrack::{EngineConfig, LayerKind, ManualClock, MapSurface, TrackEngine, Viewport};
//!
//! struct NullSurface;
//!
//! impl MapSurface for NullSurface {
//!     fn viewport(&self) -> Option<Viewport> {
//!         None
//!     }
//!     fn request_redraw(&self, _layer: LayerKind) {}
//!     fn refresh_tiled(&self, _cache_key: i64) {}
//! }
//!
//! let clock = Arc::new(ManualClock::new());
//! let mut engine = TrackEngine::new(EngineConfig::default(), clock.clone(), Arc::new(NullSurface));
//!
//! engine.apply_snapshot(Ok(Vec::new()));
//! clock.advance(std::time::Duration::from_millis(50));
//! engine.tick();
//! assert_eq!(engine.layers().live.len(), 0);
//! ```

pub mod cadence;
pub mod camera;
pub mod clock;
pub mod engine;
pub mod extrapolate;
pub mod feed;
pub mod geo;
pub mod layer;
pub mod model;
pub mod route;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use log::{debug, info};
use tokio::sync::broadcast;
use tokio::task::spawn_blocking;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub use cadence::{CadenceConfig, RefreshMode};
pub use camera::{follow_view, CameraView};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineConfig, EngineEvent, TrackEngine};
pub use extrapolate::{ExtrapolationTask, TaskRegistry};
pub use feed::{FetchError, LiveFeed, RouteFeed};
pub use geo::{BoundingBox, DistanceUnit, GeoPoint};
pub use layer::{LayerKind, MapSurface, Shape, Viewport};
pub use model::{
    Airport, LiveAircraft, LiveStats, Motion, PathPoint, RouteDetail, RouteId, RoutePath, NO_ROUTE,
};
pub use route::{RouteInspection, ScrubMetrics};

/// Configuration for the service layer.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Engine tunables.
    pub engine: EngineConfig,
    /// Display frame period driving the dead-reckoning ticks.
    pub frame_interval: Duration,
    /// Retry delay while the surface has no viewport yet.
    pub viewport_retry: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            frame_interval: Duration::from_millis(50),
            viewport_retry: Duration::from_secs(2),
        }
    }
}

/// Handle to a running live-map service.
///
/// Spawns a zoom-cadenced poll loop and a fixed-rate frame loop on the
/// current tokio runtime. Dropping the handle (or calling
/// [`LiveMapService::shutdown`]) cancels both loops.
pub struct LiveMapService {
    engine: Arc<RwLock<TrackEngine>>,
    routes: Arc<dyn RouteFeed>,
    events: broadcast::Sender<EngineEvent>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for LiveMapService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveMapService")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl LiveMapService {
    /// Spawn the service with its background loops.
    #[must_use]
    pub fn spawn(
        config: ServiceConfig,
        feed: Arc<dyn LiveFeed>,
        routes: Arc<dyn RouteFeed>,
        surface: Arc<dyn MapSurface>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let engine = TrackEngine::new(config.engine.clone(), clock, Arc::clone(&surface));
        let events = engine.event_sender();
        let engine = Arc::new(RwLock::new(engine));
        let cancel = CancellationToken::new();

        let poll_engine = Arc::clone(&engine);
        let poll_cancel = cancel.clone();
        let cadence = config.engine.cadence;
        let viewport_retry = config.viewport_retry;
        tokio::spawn(async move {
            poll_loop(
                poll_engine,
                feed,
                surface,
                cadence,
                viewport_retry,
                poll_cancel,
            )
            .await;
        });

        let frame_engine = Arc::clone(&engine);
        let frame_cancel = cancel.clone();
        let frame_interval = config.frame_interval;
        tokio::spawn(async move {
            frame_loop(frame_engine, frame_interval, frame_cancel).await;
        });

        Self {
            engine,
            routes,
            events,
            cancel,
        }
    }

    /// Shared engine state, for status displays and custom drivers.
    #[must_use]
    pub fn engine(&self) -> Arc<RwLock<TrackEngine>> {
        Arc::clone(&self.engine)
    }

    /// Subscribe to engine events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Open a route for inspection: marks it loading and fetches detail in
    /// the background.
    pub fn open_route(&self, route_id: RouteId) {
        let should_fetch = match self.engine.write() {
            Ok(mut engine) => engine.begin_route_load(route_id),
            Err(_) => false,
        };
        if !should_fetch {
            return;
        }

        let routes = Arc::clone(&self.routes);
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            let fetched = spawn_blocking(move || routes.fetch_route(route_id)).await;
            let result = match fetched {
                Ok(result) => result,
                Err(join_err) => Err(FetchError::Network(join_err.to_string())),
            };
            if let Ok(mut engine) = engine.write() {
                engine.complete_route_load(route_id, result);
            }
        });
    }

    /// Close the current route inspection.
    pub fn close_route(&self) {
        if let Ok(mut engine) = self.engine.write() {
            engine.close_route();
        }
    }

    /// Move the scrub slider.
    pub fn set_scrub_index(&self, index: i64) {
        if let Ok(mut engine) = self.engine.write() {
            engine.set_scrub_index(index);
        }
    }

    /// Start or stop scrub playback.
    pub fn set_playing(&self, playing: bool) {
        if let Ok(mut engine) = self.engine.write() {
            engine.set_playing(playing);
        }
    }

    /// Change the playback speed multiplier.
    pub fn set_playback_speed(&self, speed: f64) {
        if let Ok(mut engine) = self.engine.write() {
            engine.set_playback_speed(speed);
        }
    }

    /// Cancel the background loops.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for LiveMapService {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_loop(
    engine: Arc<RwLock<TrackEngine>>,
    feed: Arc<dyn LiveFeed>,
    surface: Arc<dyn MapSurface>,
    cadence: CadenceConfig,
    viewport_retry: Duration,
    cancel: CancellationToken,
) {
    loop {
        let delay = match surface.viewport() {
            None => {
                debug!("no viewport yet, skipping poll cycle");
                viewport_retry
            }
            Some(viewport) => match cadence.refresh_mode(viewport.zoom) {
                RefreshMode::Tiled { interval } => {
                    surface.refresh_tiled(Utc::now().timestamp_millis());
                    interval
                }
                RefreshMode::Live { interval } => {
                    run_live_cycle(&engine, &feed, viewport, interval).await;
                    interval
                }
            },
        };

        tokio::select! {
            () = sleep(delay) => {}
            () = cancel.cancelled() => {
                info!("poll loop cancelled");
                return;
            }
        }
    }
}

/// One live fetch cycle, bounded by the polling interval so a hung request
/// never stacks in-flight work.
async fn run_live_cycle(
    engine: &Arc<RwLock<TrackEngine>>,
    feed: &Arc<dyn LiveFeed>,
    viewport: Viewport,
    fetch_timeout: Duration,
) {
    {
        let Ok(engine) = engine.read() else { return };
        if engine.inspection().route_id() == Some(NO_ROUTE) {
            debug!("placeholder route inspected, skipping live fetch");
            return;
        }
    }

    let feed = Arc::clone(feed);
    let bbox = viewport.bbox;
    let fetched = timeout(fetch_timeout, spawn_blocking(move || feed.fetch_live(bbox))).await;

    let result = match fetched {
        Err(_) => Err(FetchError::Timeout(fetch_timeout)),
        Ok(Err(join_err)) => Err(FetchError::Network(join_err.to_string())),
        Ok(Ok(result)) => result,
    };

    if let Ok(mut engine) = engine.write() {
        engine.apply_snapshot(result);
    }
}

async fn frame_loop(
    engine: Arc<RwLock<TrackEngine>>,
    frame_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Ok(mut engine) = engine.write() {
                    engine.tick();
                }
            }
            () = cancel.cancelled() => {
                info!("frame loop cancelled");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::RecordingSurface;

    struct StubFeed;

    impl LiveFeed for StubFeed {
        fn fetch_live(&self, _bbox: BoundingBox) -> Result<Vec<LiveAircraft>, FetchError> {
            Ok(vec![LiveAircraft {
                id: 42,
                position: GeoPoint::new(28.0, 41.0),
                altitude_m: Some(3000.0),
                type_id: 1,
                motion: Motion::Moving {
                    bearing_deg: 90.0,
                    speed_mps: 250.0,
                },
            }])
        }
    }

    impl RouteFeed for StubFeed {
        fn fetch_route(&self, route_id: RouteId) -> Result<Option<RouteDetail>, FetchError> {
            if route_id == 404 {
                return Ok(None);
            }
            Err(FetchError::Network("unreachable".to_string()))
        }
    }

    fn live_viewport() -> Viewport {
        Viewport {
            zoom: 12.0,
            bbox: BoundingBox {
                min_lon: 27.0,
                min_lat: 40.0,
                max_lon: 30.0,
                max_lat: 42.0,
            },
        }
    }

    #[tokio::test]
    async fn test_service_runs_an_immediate_live_cycle() {
        let surface = Arc::new(RecordingSurface::default());
        surface.set_viewport(live_viewport());
        let feed = Arc::new(StubFeed);

        let service = LiveMapService::spawn(
            ServiceConfig::default(),
            feed.clone(),
            feed,
            surface,
            Arc::new(SystemClock),
        );

        // The first poll cycle runs before the first sleep
        sleep(Duration::from_millis(200)).await;
        {
            let engine = service.engine();
            let engine = engine.read().unwrap();
            assert_eq!(engine.layers().live.len(), 1);
            assert_eq!(engine.task_count(), 1);
        }
        service.shutdown();
    }

    #[tokio::test]
    async fn test_service_surfaces_route_not_found() {
        let surface = Arc::new(RecordingSurface::default());
        surface.set_viewport(live_viewport());
        let feed = Arc::new(StubFeed);

        let service = LiveMapService::spawn(
            ServiceConfig::default(),
            feed.clone(),
            feed,
            surface,
            Arc::new(SystemClock),
        );
        let mut events = service.subscribe();

        service.open_route(404);
        let event = loop {
            match events.recv().await.unwrap() {
                EngineEvent::RouteNotFound(id) => break id,
                _ => continue,
            }
        };
        assert_eq!(event, 404);
        service.shutdown();
    }
}
