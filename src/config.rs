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

//! Application configuration management.
//!
//! Persistent TOML configuration for the host: flight data endpoint,
//! initial viewport, and loop timing.

use serde::{Deserialize, Serialize};

/// Default flight data service endpoint
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:2004";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    /// Base URL of the flight data service
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Initial viewport center latitude
    #[serde(default = "default_center_lat")]
    pub center_lat: f64,

    /// Initial viewport center longitude
    #[serde(default = "default_center_lon")]
    pub center_lon: f64,

    /// Initial map zoom level
    #[serde(default = "default_zoom")]
    pub default_zoom: f64,

    /// Display frame period in milliseconds
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Seconds between status printouts
    #[serde(default = "default_status_period_secs")]
    pub status_period_secs: u64,
}

// Default value functions for serde
fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_center_lat() -> f64 {
    41.0082
}

fn default_center_lon() -> f64 {
    28.9784
}

fn default_zoom() -> f64 {
    12.0
}

fn default_frame_interval_ms() -> u64 {
    50
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_status_period_secs() -> u64 {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            center_lat: default_center_lat(),
            center_lon: default_center_lon(),
            default_zoom: default_zoom(),
            frame_interval_ms: default_frame_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            status_period_secs: default_status_period_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load("flighttrail", "config")
    }

    /// Save configuration to disk
    #[allow(dead_code)]
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store("flighttrail", "config", self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path("flighttrail", "config")
    }
}
