// Per-entity visual state
use super::position::{EntityId, PositionSample};
use super::trail::TrailBuffer;
use chrono::{DateTime, Utc};

pub const SPEED_UNIT: &str = "kph";

/// Optional scalar reported alongside positions (speed)
#[derive(Debug, Clone, PartialEq)]
pub struct AuxiliaryMetric {
    pub value: f64,
    pub unit: &'static str,
}

impl AuxiliaryMetric {
    pub fn speed(value: f64) -> Self {
        Self {
            value,
            unit: SPEED_UNIT,
        }
    }
}

/// Everything needed to draw one entity: marker content plus trail
///
/// `last_known_position` is always the most recently applied sample and,
/// when present, is also the last element of `trail`.
#[derive(Debug, Clone)]
pub struct EntityVisualState {
    pub id: EntityId,
    pub display_name: String,
    pub icon_url: Option<String>,
    pub last_known_position: Option<PositionSample>,
    pub auxiliary_metric: Option<AuxiliaryMetric>,
    pub trail: TrailBuffer,
    pub last_seen: DateTime<Utc>,
}

impl EntityVisualState {
    pub fn new(id: EntityId, display_name: String, trail_capacity: usize, seen_at: DateTime<Utc>) -> Self {
        Self {
            id,
            display_name,
            icon_url: None,
            last_known_position: None,
            auxiliary_metric: None,
            trail: TrailBuffer::new(trail_capacity),
            last_seen: seen_at,
        }
    }

    /// Marker text: name followed by the speed line
    pub fn display_label(&self) -> String {
        let speed = match &self.auxiliary_metric {
            Some(metric) => format!("{} {}", format_metric(metric.value), metric.unit),
            None => format!("n/a {}", SPEED_UNIT),
        };
        format!("{}\nSpeed: {}", self.display_name, speed)
    }
}

// Whole numbers below this print through i64 without rounding or saturating
const INTEGER_FORMAT_LIMIT: f64 = 1e15;

fn format_metric(value: f64) -> String {
    // Whole numbers print without a trailing ".0", matching how the source reports speed
    if value.fract() == 0.0 && value.abs() < INTEGER_FORMAT_LIMIT {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
