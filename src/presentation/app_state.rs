// Application state for HTTP handlers
use crate::infrastructure::config::MapConfig;
use crate::infrastructure::map_feed::FeedHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub feed: FeedHandle,
    pub map: MapConfig,
    /// Cleared once the tracking session has stopped consuming events
    pub tracking: Arc<AtomicBool>,
}
