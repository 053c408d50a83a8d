// Render adapter - Outbound drawing interface the core drives
use crate::application::registry::AppliedUpdate;
use crate::domain::entity::EntityVisualState;
use crate::domain::position::{EntityId, PositionSample};
use serde::Serialize;

/// One outbound drawing instruction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderCommand {
    PlaceMarker {
        id: EntityId,
        position: PositionSample,
        label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        icon_url: Option<String>,
    },
    MoveMarker {
        id: EntityId,
        position: PositionSample,
    },
    UpdateMarkerLabel {
        id: EntityId,
        label: String,
    },
    AppendTrailPoint {
        id: EntityId,
        position: PositionSample,
    },
    TrimTrailStart {
        id: EntityId,
        count: usize,
    },
    RemoveEntity {
        id: EntityId,
    },
}

/// Map surface owned by someone else; the core only issues calls
pub trait RenderAdapter: Send {
    fn place_marker(&mut self, id: &EntityId, position: &PositionSample, label: &str, icon_url: Option<&str>);

    fn move_marker(&mut self, id: &EntityId, position: &PositionSample);

    fn update_marker_label(&mut self, id: &EntityId, label: &str);

    fn append_trail_point(&mut self, id: &EntityId, position: &PositionSample);

    fn trim_trail_start(&mut self, id: &EntityId, count: usize);

    /// Remove both marker and trail
    fn remove_entity(&mut self, id: &EntityId);
}

/// Draw an entity that just became visible: marker plus its trail so far
pub fn render_placement(adapter: &mut dyn RenderAdapter, state: &EntityVisualState) {
    let Some(position) = &state.last_known_position else {
        return;
    };

    adapter.place_marker(&state.id, position, &state.display_label(), state.icon_url.as_deref());
    for point in state.trail.iter() {
        adapter.append_trail_point(&state.id, point);
    }
}

/// Redraw after a position was applied to the registry
pub fn render_update(adapter: &mut dyn RenderAdapter, update: &AppliedUpdate<'_>) {
    let state = update.state;
    let Some(position) = &state.last_known_position else {
        return;
    };

    if update.is_first_fix() {
        render_placement(adapter, state);
        return;
    }

    adapter.move_marker(&state.id, position);
    if update.label_changed() {
        adapter.update_marker_label(&state.id, &state.display_label());
    }
    adapter.append_trail_point(&state.id, position);
    if update.evicted.is_some() {
        adapter.trim_trail_start(&state.id, 1);
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Captures every call; clones share the same log
    #[derive(Debug, Clone, Default)]
    pub struct RecordingRenderAdapter {
        log: Arc<Mutex<Vec<RenderCommand>>>,
    }

    impl RecordingRenderAdapter {
        pub fn commands(&self) -> Vec<RenderCommand> {
            self.log.lock().unwrap().clone()
        }

        pub fn clear(&self) {
            self.log.lock().unwrap().clear();
        }

        fn push(&self, command: RenderCommand) {
            self.log.lock().unwrap().push(command);
        }
    }

    impl RenderAdapter for RecordingRenderAdapter {
        fn place_marker(&mut self, id: &EntityId, position: &PositionSample, label: &str, icon_url: Option<&str>) {
            self.push(RenderCommand::PlaceMarker {
                id: id.clone(),
                position: *position,
                label: label.to_string(),
                icon_url: icon_url.map(str::to_string),
            });
        }

        fn move_marker(&mut self, id: &EntityId, position: &PositionSample) {
            self.push(RenderCommand::MoveMarker {
                id: id.clone(),
                position: *position,
            });
        }

        fn update_marker_label(&mut self, id: &EntityId, label: &str) {
            self.push(RenderCommand::UpdateMarkerLabel {
                id: id.clone(),
                label: label.to_string(),
            });
        }

        fn append_trail_point(&mut self, id: &EntityId, position: &PositionSample) {
            self.push(RenderCommand::AppendTrailPoint {
                id: id.clone(),
                position: *position,
            });
        }

        fn trim_trail_start(&mut self, id: &EntityId, count: usize) {
            self.push(RenderCommand::TrimTrailStart { id: id.clone(), count });
        }

        fn remove_entity(&mut self, id: &EntityId) {
            self.push(RenderCommand::RemoveEntity { id: id.clone() });
        }
    }
}
