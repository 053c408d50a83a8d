// Position and identity domain models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier assigned by the telemetry source
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// A single geocoordinate observed for an entity
///
/// Arrival order is the ordering authority; `observed_at` is carried along
/// when the source reports it but is never used to reorder samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
impl PositionSample {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            observed_at: None,
        }
    }

    pub fn observed(latitude: f64, longitude: f64, observed_at: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            observed_at: Some(observed_at),
        }
    }
}

/// Geographic bounding box (south-west / north-east corners)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub fn around(sample: &PositionSample) -> Self {
        Self {
            south: sample.latitude,
            west: sample.longitude,
            north: sample.latitude,
            east: sample.longitude,
        }
    }

    pub fn extend(&mut self, sample: &PositionSample) {
        self.south = self.south.min(sample.latitude);
        self.north = self.north.max(sample.latitude);
        self.west = self.west.min(sample.longitude);
        self.east = self.east.max(sample.longitude);
    }

    /// Smallest box containing every sample, `None` for an empty input
    pub fn enclosing<'a>(samples: impl IntoIterator<Item = &'a PositionSample>) -> Option<Self> {
        let mut iter = samples.into_iter();
        let mut bounds = Self::around(iter.next()?);
        for sample in iter {
            bounds.extend(sample);
        }
        Some(bounds)
    }
}
