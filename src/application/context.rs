// Tracking context - Registry plus subscription bookkeeping for one session
use crate::application::registry::EntityRegistry;
use crate::domain::position::EntityId;
use std::collections::HashSet;

/// Owned state of one tracking session; passed explicitly to the loader
/// and dispatcher so independent sessions never share anything
#[derive(Debug, Default)]
pub struct TrackingContext {
    pub registry: EntityRegistry,
    subscriptions: HashSet<EntityId>,
}

impl TrackingContext {
    pub fn new(trail_capacity: usize) -> Self {
        Self {
            registry: EntityRegistry::new(trail_capacity),
            subscriptions: HashSet::new(),
        }
    }

    /// Record a subscription; `false` if the id was already subscribed
    pub fn subscribe(&mut self, id: &EntityId) -> bool {
        self.subscriptions.insert(id.clone())
    }

    pub fn unsubscribe(&mut self, id: &EntityId) -> bool {
        self.subscriptions.remove(id)
    }

    #[cfg(test)]
    pub fn is_subscribed(&self, id: &EntityId) -> bool {
        self.subscriptions.contains(id)
    }

    #[cfg(test)]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}
