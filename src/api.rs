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

//! HTTP flight data client.
//!
//! Implements the engine's feed traits against the flight data service:
//! `/livepoints` for bounding-box live snapshots and `/flights/{id}` for
//! route detail. Wire shapes are validated into model types here, at the
//! fetch boundary; features with malformed coordinates are dropped with a
//! warning and malformed motion data degrades to a static marker.

use std::time::Duration;

use chrono::{DateTime, Utc};
use livetrack::{
    Airport, BoundingBox, FetchError, GeoPoint, LiveAircraft, LiveFeed, LiveStats, PathPoint,
    RouteDetail, RouteFeed, RouteId, RoutePath,
};
use log::warn;
use serde::Deserialize;

pub struct FlightApi {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl std::fmt::Debug for FlightApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightApi")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl FlightApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
            timeout,
        })
    }

    fn map_error(&self, err: &reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl LiveFeed for FlightApi {
    fn fetch_live(&self, bbox: BoundingBox) -> Result<Vec<LiveAircraft>, FetchError> {
        let url = format!(
            "{}/livepoints?min_lon={}&min_lat={}&max_lon={}&max_lat={}",
            self.base_url, bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat
        );
        let response = self.client.get(&url).send().map_err(|e| self.map_error(&e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }
        let points: Vec<LivePointDto> = response.json().map_err(|e| self.map_error(&e))?;
        Ok(points.into_iter().filter_map(LivePointDto::into_aircraft).collect())
    }
}

impl RouteFeed for FlightApi {
    fn fetch_route(&self, route_id: RouteId) -> Result<Option<RouteDetail>, FetchError> {
        let url = format!("{}/flights/{route_id}", self.base_url);
        let response = self.client.get(&url).send().map_err(|e| self.map_error(&e))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }
        let flight: FlightDto = response.json().map_err(|e| self.map_error(&e))?;
        Ok(Some(flight.into_detail()))
    }
}

/// GeoJSON-style point geometry, `[lon, lat]`.
#[derive(Debug, Deserialize)]
struct PointDto {
    coordinates: Vec<f64>,
}

impl PointDto {
    fn to_point(&self) -> Option<GeoPoint> {
        match self.coordinates.as_slice() {
            [lon, lat, ..] => Some(GeoPoint::new(*lon, *lat)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LivePointDto {
    id: RouteId,
    point: PointDto,
    #[serde(default)]
    bearing: Option<f64>,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    altitude: Option<f64>,
    #[serde(rename = "type", default)]
    type_id: u32,
}

impl LivePointDto {
    fn into_aircraft(self) -> Option<LiveAircraft> {
        let Some(position) = self.point.to_point() else {
            warn!("live feature {} has no coordinates, dropping it", self.id);
            return None;
        };
        match LiveAircraft::new(
            self.id,
            position,
            self.type_id,
            self.altitude,
            self.bearing,
            self.speed,
        ) {
            Ok(aircraft) => Some(aircraft),
            Err(err) => {
                warn!("live feature {} rejected: {err}", self.id);
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct AirportDto {
    id: i64,
    name: String,
    geometry: PointDto,
}

impl AirportDto {
    fn into_airport(self) -> Option<Airport> {
        let position = self.geometry.to_point()?;
        Some(Airport {
            id: self.id,
            name: self.name,
            position,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AircraftDto {
    #[serde(rename = "aircraftTypeId")]
    aircraft_type_id: u32,
}

#[derive(Debug, Deserialize)]
struct PathPropertiesDto {
    altitude: f64,
    bearing: f64,
    speed: f64,
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct PathFeatureDto {
    geometry: PointDto,
    properties: PathPropertiesDto,
}

#[derive(Debug, Deserialize)]
struct PathDto {
    features: Vec<PathFeatureDto>,
}

#[derive(Debug, Deserialize)]
struct FlightDto {
    id: RouteId,
    last_update_date: DateTime<Utc>,
    speed: f64,
    altitude: f64,
    bearing: f64,
    start_airport: AirportDto,
    finish_airport: AirportDto,
    aircraft: AircraftDto,
    path: PathDto,
}

impl FlightDto {
    fn into_detail(self) -> RouteDetail {
        let points = self
            .path
            .features
            .into_iter()
            .filter_map(|feature| {
                let Some(position) = feature.geometry.to_point() else {
                    warn!("path feature without coordinates dropped");
                    return None;
                };
                Some(PathPoint {
                    position,
                    altitude_m: feature.properties.altitude,
                    bearing_deg: feature.properties.bearing,
                    speed_mps: feature.properties.speed,
                    time: feature.properties.date,
                })
            })
            .collect();

        let fallback = GeoPoint::new(0.0, 0.0);
        RouteDetail {
            id: self.id,
            path: RoutePath::new(points),
            start_airport: self.start_airport.into_airport().unwrap_or(Airport {
                id: 0,
                name: String::new(),
                position: fallback,
            }),
            finish_airport: self.finish_airport.into_airport().unwrap_or(Airport {
                id: 0,
                name: String::new(),
                position: fallback,
            }),
            aircraft_type_id: self.aircraft.aircraft_type_id,
            stats: LiveStats {
                speed_mps: self.speed,
                altitude_m: self.altitude,
                bearing_deg: self.bearing,
                last_update: self.last_update_date,
            },
        }
    }
}
