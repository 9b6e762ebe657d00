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

//! Dead-reckoning extrapolation.
//!
//! Between snapshots, every live feature with known bearing and speed is
//! advanced along its great-circle ray at the reported ground speed. Each
//! feature has one [`ExtrapolationTask`] in an id-keyed registry; a single
//! [`FrameDriver`] ticks the whole registry once per display frame, so
//! cancellation and ordering stay deterministic under an injected clock.
//!
//! A task's elapsed time is always measured from the anchor captured at
//! its last snapshot, never re-derived from displayed positions, so
//! repeated re-anchoring does not compound drift.

use std::collections::HashMap;
use std::time::Instant;

use log::debug;

use crate::geo::{self, GeoPoint};
use crate::layer::LiveLayer;
use crate::model::{LiveAircraft, Motion, RouteId};

/// Per-feature dead-reckoning state.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtrapolationTask {
    /// Position reported by the anchoring snapshot.
    pub anchor: GeoPoint,
    /// Monotonic time the anchor was captured.
    pub anchored_at: Instant,
    /// Degrees clockwise from north.
    pub bearing_deg: f64,
    /// Ground speed in meters per second.
    pub speed_mps: f64,
    /// Set when superseded; the task is dropped at the next tick.
    pub cancelled: bool,
}

impl ExtrapolationTask {
    /// Dead-reckoned position at `now`.
    #[must_use]
    pub fn position_at(&self, now: Instant) -> GeoPoint {
        let elapsed = now.saturating_duration_since(self.anchored_at).as_secs_f64();
        geo::destination(self.anchor, self.speed_mps * elapsed, self.bearing_deg)
    }
}

/// Id-keyed registry of active extrapolation tasks.
///
/// Owned by the frame driver; the snapshot path re-anchors and cancels
/// through [`TaskRegistry::sync`].
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<RouteId, ExtrapolationTask>,
}

impl TaskRegistry {
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: RouteId) -> Option<&ExtrapolationTask> {
        self.tasks.get(&id)
    }

    /// Create or re-anchor the task for `id` at a fresh snapshot position.
    pub fn anchor(
        &mut self,
        id: RouteId,
        position: GeoPoint,
        bearing_deg: f64,
        speed_mps: f64,
        now: Instant,
    ) {
        let task = ExtrapolationTask {
            anchor: position,
            anchored_at: now,
            bearing_deg,
            speed_mps,
            cancelled: false,
        };
        self.tasks.insert(id, task);
    }

    /// Flag the task for `id` as superseded. It stops at the next tick.
    pub fn cancel(&mut self, id: RouteId) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.cancelled = true;
        }
    }

    /// Reconcile the registry with a freshly fetched feature set:
    /// moving features are (re-)anchored, static features and ids that
    /// disappeared are cancelled.
    pub fn sync(&mut self, fresh: &HashMap<RouteId, LiveAircraft>, now: Instant) {
        let stale: Vec<RouteId> = self
            .tasks
            .keys()
            .filter(|id| !fresh.contains_key(id))
            .copied()
            .collect();
        for id in stale {
            self.cancel(id);
        }

        for (id, aircraft) in fresh {
            match aircraft.motion {
                Motion::Moving {
                    bearing_deg,
                    speed_mps,
                } => self.anchor(*id, aircraft.position, bearing_deg, speed_mps, now),
                Motion::Static => self.cancel(*id),
            }
        }
    }
}

/// Result of one frame tick.
#[derive(Debug, Clone, Copy)]
pub struct TickOutcome {
    /// At least one feature moved; the live layer needs a redraw.
    pub moved: bool,
    /// The traveled-tail refresh is due this frame.
    pub tail_due: bool,
}

/// Central per-frame driver for all extrapolation tasks.
#[derive(Debug)]
pub struct FrameDriver {
    registry: TaskRegistry,
    tick_count: u64,
    tail_refresh_ticks: u32,
}

impl FrameDriver {
    #[must_use]
    pub fn new(tail_refresh_ticks: u32) -> Self {
        Self {
            registry: TaskRegistry::default(),
            tick_count: 0,
            tail_refresh_ticks,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TaskRegistry {
        &mut self.registry
    }

    /// Advance every live task one frame.
    ///
    /// Cancelled tasks are dropped before computing anything; a task whose
    /// feature no longer exists in the live layer self-cancels. Everything
    /// else gets its dead-reckoned position written into the layer.
    pub fn tick(&mut self, live: &mut LiveLayer, now: Instant) -> TickOutcome {
        self.tick_count += 1;
        let mut moved = false;

        self.registry.tasks.retain(|id, task| {
            if task.cancelled {
                return false;
            }
            if !live.contains(*id) {
                debug!("feature {id} left the live layer, dropping its task");
                return false;
            }
            if live.set_position(*id, task.position_at(now)) {
                moved = true;
            }
            true
        });

        let tail_due = self.tail_refresh_ticks > 0
            && self.tick_count % u64::from(self.tail_refresh_ticks) == 0;

        TickOutcome { moved, tail_due }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::geo::DistanceUnit;

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

    fn layer_with(features: &[LiveAircraft]) -> LiveLayer {
        let mut layer = LiveLayer::default();
        layer.replace_all(features.iter().map(|a| (a.id, a.clone())).collect());
        layer
    }

    #[test]
    fn test_eastward_extrapolation_matches_speed_times_time() {
        let clock = ManualClock::new();
        let start = GeoPoint::new(28.0, 41.0);
        let aircraft = moving(42, start.lon, start.lat, 90.0, 250.0);
        let mut layer = layer_with(std::slice::from_ref(&aircraft));

        let mut driver = FrameDriver::new(10);
        driver
            .registry_mut()
            .anchor(42, start, 90.0, 250.0, clock.now());

        clock.advance(Duration::from_secs(2));
        let outcome = driver.tick(&mut layer, clock.now());
        assert!(outcome.moved);

        let expected = geo::destination(start, 500.0, 90.0);
        let got = layer.get(42).unwrap().position;
        assert!((got.lon - expected.lon).abs() < 1e-9, "got {got:?}");
        assert!(got.lon > start.lon);
        assert!((got.lat - start.lat).abs() < 0.001);

        let traveled = geo::distance(start, got, DistanceUnit::Meters);
        assert!((traveled - 500.0).abs() < 1.0, "traveled {traveled}");
    }

    #[test]
    fn test_cancelled_task_dropped_at_next_tick() {
        let clock = ManualClock::new();
        let aircraft = moving(1, 28.0, 41.0, 0.0, 100.0);
        let mut layer = layer_with(std::slice::from_ref(&aircraft));

        let mut driver = FrameDriver::new(10);
        driver
            .registry_mut()
            .anchor(1, aircraft.position, 0.0, 100.0, clock.now());
        driver.registry_mut().cancel(1);
        assert_eq!(driver.registry().len(), 1);

        clock.advance(Duration::from_secs(1));
        let outcome = driver.tick(&mut layer, clock.now());
        assert!(!outcome.moved);
        assert!(driver.registry().is_empty());
        // The feature itself stays at its last position
        assert_eq!(layer.get(1).unwrap().position, aircraft.position);
    }

    #[test]
    fn test_task_self_cancels_when_feature_removed() {
        let clock = ManualClock::new();
        let aircraft = moving(7, 28.0, 41.0, 90.0, 200.0);
        let mut layer = layer_with(&[aircraft.clone()]);

        let mut driver = FrameDriver::new(10);
        driver
            .registry_mut()
            .anchor(7, aircraft.position, 90.0, 200.0, clock.now());

        // A newer snapshot removed the feature without touching the registry
        layer.replace_all(HashMap::new());

        clock.advance(Duration::from_millis(50));
        driver.tick(&mut layer, clock.now());
        assert!(driver.registry().is_empty());
    }

    #[test]
    fn test_sync_reanchors_survivors_and_cancels_departed() {
        let clock = ManualClock::new();
        let first: HashMap<RouteId, LiveAircraft> = [
            moving(1, 28.0, 41.0, 90.0, 100.0),
            moving(2, 29.0, 40.0, 180.0, 150.0),
            moving(3, 30.0, 39.0, 270.0, 200.0),
        ]
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

        let mut driver = FrameDriver::new(10);
        driver.registry_mut().sync(&first, clock.now());
        assert_eq!(driver.registry().len(), 3);

        clock.advance(Duration::from_secs(5));
        let reanchor_time = clock.now();
        let second: HashMap<RouteId, LiveAircraft> = [
            moving(1, 28.1, 41.0, 95.0, 110.0),
            moving(2, 29.0, 40.1, 185.0, 150.0),
        ]
        .into_iter()
        .map(|a| (a.id, a))
        .collect();
        driver.registry_mut().sync(&second, reanchor_time);

        // Departed id is flagged, survivors re-anchored at the new time
        assert!(driver.registry().get(3).unwrap().cancelled);
        let task1 = driver.registry().get(1).unwrap();
        assert!(!task1.cancelled);
        assert_eq!(task1.anchored_at, reanchor_time);
        assert_eq!(task1.anchor, GeoPoint::new(28.1, 41.0));

        // Elapsed time counts from the new anchor, not the original one
        clock.advance(Duration::from_secs(2));
        let pos = task1.position_at(clock.now());
        let expected = geo::destination(GeoPoint::new(28.1, 41.0), 220.0, 95.0);
        assert!((pos.lon - expected.lon).abs() < 1e-9);
        assert!((pos.lat - expected.lat).abs() < 1e-9);

        // After the next tick over a layer holding only {1, 2}, task 3 is gone
        let mut layer = layer_with(&second.values().cloned().collect::<Vec<_>>());
        driver.tick(&mut layer, clock.now());
        assert_eq!(driver.registry().len(), 2);
        assert!(driver.registry().get(3).is_none());
    }

    #[test]
    fn test_sync_cancels_task_for_now_static_feature() {
        let clock = ManualClock::new();
        let mut driver = FrameDriver::new(10);
        driver
            .registry_mut()
            .anchor(5, GeoPoint::new(28.0, 41.0), 90.0, 100.0, clock.now());

        let mut gone_static = moving(5, 28.0, 41.0, 90.0, 100.0);
        gone_static.motion = Motion::Static;
        let fresh: HashMap<RouteId, LiveAircraft> = HashMap::from([(5, gone_static)]);
        driver.registry_mut().sync(&fresh, clock.now());

        assert!(driver.registry().get(5).unwrap().cancelled);
    }

    #[test]
    fn test_tail_due_every_nth_tick() {
        let clock = ManualClock::new();
        let mut layer = LiveLayer::default();
        let mut driver = FrameDriver::new(3);

        let due: Vec<bool> = (0..7)
            .map(|_| driver.tick(&mut layer, clock.now()).tail_due)
            .collect();
        assert_eq!(due, vec![false, false, true, false, false, true, false]);
    }
}
