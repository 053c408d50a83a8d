// Inbound telemetry shapes, already decoded from the wire
use super::position::{EntityId, PositionSample};

/// One entity as reported by the bulk snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalEntityDescriptor {
    pub id: EntityId,
    pub name: String,
    pub icon_url: Option<String>,
    pub position: Option<PositionSample>,
    pub speed: Option<f64>,
}

#[cfg(test)]
impl ExternalEntityDescriptor {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon_url: None,
            position: None,
            speed: None,
        }
    }

    pub fn at(mut self, position: PositionSample) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_icon(mut self, icon_url: impl Into<String>) -> Self {
        self.icon_url = Some(icon_url.into());
        self
    }
}

/// Attributes carried by a single change notification
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeChangeSet {
    pub position: Option<PositionSample>,
    pub speed: Option<f64>,
}

impl AttributeChangeSet {
    #[cfg(test)]
    pub fn position(position: PositionSample) -> Self {
        Self {
            position: Some(position),
            speed: None,
        }
    }

    #[cfg(test)]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.speed.is_none()
    }
}

/// A change notification addressed to one entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityChange {
    pub id: EntityId,
    pub changes: AttributeChangeSet,
}

impl EntityChange {
    pub fn new(id: impl Into<EntityId>, changes: AttributeChangeSet) -> Self {
        Self {
            id: id.into(),
            changes,
        }
    }
}
