// Event dispatcher - Routes change notifications into the registry
use crate::application::context::TrackingContext;
use crate::application::render_adapter::{render_update, RenderAdapter};
use crate::domain::change::AttributeChangeSet;
use crate::domain::position::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Known entity moved
    Moved,
    /// Known entity received its first position and was placed on the map
    Placed,
    /// Change set had no position; nothing moves
    NoPosition,
    /// Id was never registered; the event is absorbed
    DroppedUnknown,
}

/// Handle one change notification for `id`.
///
/// Speed without a position does not update anything. Events for
/// unregistered ids are dropped without side effects since they are expected
/// while bootstrap and the event stream race each other.
pub fn on_entity_changed(
    ctx: &mut TrackingContext,
    id: &EntityId,
    changes: &AttributeChangeSet,
    adapter: &mut dyn RenderAdapter,
) -> DispatchOutcome {
    let Some(position) = changes.position else {
        return DispatchOutcome::NoPosition;
    };

    match ctx.registry.apply_position(id, position, changes.speed) {
        Some(update) => {
            let outcome = if update.is_first_fix() {
                DispatchOutcome::Placed
            } else {
                DispatchOutcome::Moved
            };
            render_update(adapter, &update);
            outcome
        }
        None => {
            tracing::debug!("Dropping change for unregistered entity {}", id);
            DispatchOutcome::DroppedUnknown
        }
    }
}
