// Entity registry - Identifier to visual state mapping
use crate::domain::change::ExternalEntityDescriptor;
use crate::domain::entity::{AuxiliaryMetric, EntityVisualState};
use crate::domain::position::{EntityId, PositionSample};
use crate::domain::trail::DEFAULT_TRAIL_CAPACITY;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// What an applied position changed, borrowed from the registry so the
/// caller can render without a second lookup
#[derive(Debug)]
pub struct AppliedUpdate<'a> {
    pub state: &'a EntityVisualState,
    pub previous_position: Option<PositionSample>,
    pub previous_label: String,
    pub evicted: Option<PositionSample>,
}

impl AppliedUpdate<'_> {
    /// True when the entity had no position before this update
    pub fn is_first_fix(&self) -> bool {
        self.previous_position.is_none()
    }

    pub fn label_changed(&self) -> bool {
        self.state.display_label() != self.previous_label
    }
}

#[derive(Debug)]
pub struct EntityRegistry {
    entities: HashMap<EntityId, EntityVisualState>,
    trail_capacity: usize,
}

impl EntityRegistry {
    pub fn new(trail_capacity: usize) -> Self {
        Self {
            entities: HashMap::new(),
            trail_capacity,
        }
    }

    /// Create an entry for the descriptor unless its id is already present.
    /// Returns `true` only when a new entry was created.
    pub fn register(&mut self, descriptor: &ExternalEntityDescriptor) -> bool {
        self.register_at(descriptor, Utc::now())
    }

    pub fn register_at(&mut self, descriptor: &ExternalEntityDescriptor, seen_at: DateTime<Utc>) -> bool {
        if self.entities.contains_key(&descriptor.id) {
            return false;
        }

        let mut state = EntityVisualState::new(
            descriptor.id.clone(),
            descriptor.name.clone(),
            self.trail_capacity,
            seen_at,
        );
        state.icon_url = descriptor.icon_url.clone();
        state.auxiliary_metric = descriptor.speed.map(AuxiliaryMetric::speed);
        if let Some(position) = descriptor.position {
            state.trail.append(position);
            state.last_known_position = Some(position);
        }

        self.entities.insert(descriptor.id.clone(), state);
        true
    }

    /// Apply a new position to a registered entity.
    ///
    /// Returns `None` (and changes nothing) when the id is not registered.
    pub fn apply_position(
        &mut self,
        id: &EntityId,
        sample: PositionSample,
        metric: Option<f64>,
    ) -> Option<AppliedUpdate<'_>> {
        self.apply_position_at(id, sample, metric, Utc::now())
    }

    pub fn apply_position_at(
        &mut self,
        id: &EntityId,
        sample: PositionSample,
        metric: Option<f64>,
        received_at: DateTime<Utc>,
    ) -> Option<AppliedUpdate<'_>> {
        let state = self.entities.get_mut(id)?;

        let previous_position = state.last_known_position;
        let previous_label = state.display_label();

        state.last_known_position = Some(sample);
        if let Some(value) = metric {
            state.auxiliary_metric = Some(AuxiliaryMetric::speed(value));
        }
        let evicted = state.trail.append(sample);
        state.last_seen = received_at;

        Some(AppliedUpdate {
            state: &*state,
            previous_position,
            previous_label,
            evicted,
        })
    }

    pub fn get(&self, id: &EntityId) -> Option<&EntityVisualState> {
        self.entities.get(id)
    }

    #[cfg(test)]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drop every entity whose last update is older than `cutoff`.
    /// Returns the removed ids in sorted order.
    pub fn evict_stale(&mut self, cutoff: DateTime<Utc>) -> Vec<EntityId> {
        let mut stale: Vec<EntityId> = self
            .entities
            .values()
            .filter(|state| state.last_seen < cutoff)
            .map(|state| state.id.clone())
            .collect();
        stale.sort();

        for id in &stale {
            self.entities.remove(id);
        }
        stale
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TRAIL_CAPACITY)
    }
}
