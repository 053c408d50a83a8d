use crate::application::telemetry_source::Credentials;
use crate::application::tracking_session::SessionSettings;
use crate::domain::trail::DEFAULT_TRAIL_CAPACITY;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TrackerConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: "https://hst-api.wialon.com".to_string(),
            username: "Cebit".to_string(),
            password: "cebit".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrackingConfig {
    pub trail_capacity: usize,
    pub poll_interval_ms: u64,
    pub stale_after_secs: Option<u64>,
    pub resync_interval_secs: Option<u64>,
    pub icon_size: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            trail_capacity: DEFAULT_TRAIL_CAPACITY,
            poll_interval_ms: 1000,
            stale_after_secs: None,
            resync_interval_secs: Some(300),
            icon_size: 32,
        }
    }
}

impl TrackingConfig {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            trail_capacity: self.trail_capacity,
            stale_after: self.stale_after_secs.map(Duration::from_secs),
            // Zero disables scheduled resyncs
            resync_every: self
                .resync_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        // tokio intervals reject a zero period
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Initial map view handed to map clients; not used by the tracker itself
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_lat: 52.32728615559,
            center_lng: 9.798388481140,
            zoom: 14,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Load `config/tracker.{toml,...}` (optional) overlaid with
/// `TRACKER__SECTION__KEY` environment variables
pub fn load_tracker_config() -> anyhow::Result<TrackerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/tracker").required(false))
        .add_source(config::Environment::with_prefix("TRACKER").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}
