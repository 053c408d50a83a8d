// Map feed - Render adapter that keeps a scene and broadcasts every call
use crate::application::render_adapter::{RenderAdapter, RenderCommand};
use crate::domain::position::{EntityId, PositionSample};
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerView {
    pub position: PositionSample,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailView {
    pub color: String,
    pub points: Vec<PositionSample>,
}

/// Everything currently drawn on the map
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapScene {
    pub markers: BTreeMap<EntityId, MarkerView>,
    pub trails: BTreeMap<EntityId, TrailView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedEvent {
    pub seq: u64,
    #[serde(flatten)]
    pub command: RenderCommand,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trail_color: Option<String>,
}

pub struct MapFeed {
    scene: Arc<RwLock<MapScene>>,
    events: broadcast::Sender<FeedEvent>,
    seq: u64,
}

/// Read side of a [`MapFeed`], cheap to clone into request handlers
#[derive(Clone)]
pub struct FeedHandle {
    scene: Arc<RwLock<MapScene>>,
    events: broadcast::Sender<FeedEvent>,
}

impl FeedHandle {
    pub fn scene(&self) -> MapScene {
        self.scene.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }
}

impl MapFeed {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            scene: Arc::new(RwLock::new(MapScene::default())),
            events,
            seq: 0,
        }
    }

    pub fn handle(&self) -> FeedHandle {
        FeedHandle {
            scene: self.scene.clone(),
            events: self.events.clone(),
        }
    }

    fn scene_mut(&self) -> RwLockWriteGuard<'_, MapScene> {
        self.scene.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&mut self, command: RenderCommand, trail_color: Option<String>) {
        self.seq += 1;
        // No subscribers is fine; the scene is the source of truth
        let _ = self.events.send(FeedEvent {
            seq: self.seq,
            command,
            trail_color,
        });
    }
}

impl RenderAdapter for MapFeed {
    fn place_marker(&mut self, id: &EntityId, position: &PositionSample, label: &str, icon_url: Option<&str>) {
        let color = {
            let mut scene = self.scene_mut();
            scene.markers.insert(
                id.clone(),
                MarkerView {
                    position: *position,
                    label: label.to_string(),
                    icon_url: icon_url.map(str::to_string),
                },
            );
            let trail = scene.trails.entry(id.clone()).or_insert_with(|| TrailView {
                color: random_color(),
                points: Vec::new(),
            });
            trail.color.clone()
        };

        self.publish(
            RenderCommand::PlaceMarker {
                id: id.clone(),
                position: *position,
                label: label.to_string(),
                icon_url: icon_url.map(str::to_string),
            },
            Some(color),
        );
    }

    fn move_marker(&mut self, id: &EntityId, position: &PositionSample) {
        if let Some(marker) = self.scene_mut().markers.get_mut(id) {
            marker.position = *position;
        }
        self.publish(
            RenderCommand::MoveMarker {
                id: id.clone(),
                position: *position,
            },
            None,
        );
    }

    fn update_marker_label(&mut self, id: &EntityId, label: &str) {
        if let Some(marker) = self.scene_mut().markers.get_mut(id) {
            marker.label = label.to_string();
        }
        self.publish(
            RenderCommand::UpdateMarkerLabel {
                id: id.clone(),
                label: label.to_string(),
            },
            None,
        );
    }

    fn append_trail_point(&mut self, id: &EntityId, position: &PositionSample) {
        self.scene_mut()
            .trails
            .entry(id.clone())
            .or_insert_with(|| TrailView {
                color: random_color(),
                points: Vec::new(),
            })
            .points
            .push(*position);
        self.publish(
            RenderCommand::AppendTrailPoint {
                id: id.clone(),
                position: *position,
            },
            None,
        );
    }

    fn trim_trail_start(&mut self, id: &EntityId, count: usize) {
        if let Some(trail) = self.scene_mut().trails.get_mut(id) {
            let count = count.min(trail.points.len());
            trail.points.drain(..count);
        }
        self.publish(RenderCommand::TrimTrailStart { id: id.clone(), count }, None);
    }

    fn remove_entity(&mut self, id: &EntityId) {
        {
            let mut scene = self.scene_mut();
            scene.markers.remove(id);
            scene.trails.remove(id);
        }
        self.publish(RenderCommand::RemoveEntity { id: id.clone() }, None);
    }
}

/// Random `#RRGGBB` colour for a new trail
pub fn random_color() -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut rng = rand::thread_rng();
    let mut color = String::with_capacity(7);
    color.push('#');
    for _ in 0..6 {
        color.push(DIGITS[rng.gen_range(0..16)] as char);
    }
    color
}
