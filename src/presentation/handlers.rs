// HTTP request handlers
use crate::infrastructure::config::MapConfig;
use crate::infrastructure::map_feed::{FeedEvent, MapScene};
use crate::presentation::app_state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, Response, StatusCode},
    Json,
};
use bytes::Bytes;
use futures::stream::Stream;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

/// Health check endpoint; unhealthy once the tracker stopped
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    if state.tracking.load(Ordering::SeqCst) {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "tracking stopped")
    }
}

/// Initial map center and zoom
pub async fn map_settings(State(state): State<Arc<AppState>>) -> Json<MapConfig> {
    Json(state.map.clone())
}

/// Every marker and trail currently on the map
pub async fn list_entities(State(state): State<Arc<AppState>>) -> Json<MapScene> {
    Json(state.feed.scene())
}

/// Live render commands as newline-delimited JSON
pub async fn stream_render(State(state): State<Arc<AppState>>) -> Result<Response<Body>, StatusCode> {
    let lines = render_lines(state.feed.subscribe());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(lines))
        .map_err(|e| {
            tracing::error!("Response build error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// One JSON line per feed event until the feed shuts down.
/// Slow clients skip what they missed and carry on.
pub fn render_lines(
    mut rx: broadcast::Receiver<FeedEvent>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_vec(&event) {
                    Ok(mut line) => {
                        line.push(b'\n');
                        yield Ok::<Bytes, std::io::Error>(Bytes::from(line));
                    }
                    Err(e) => tracing::error!("Feed event serialization error: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Stream client lagged, skipped {} render commands", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render_adapter::RenderAdapter;
    use crate::domain::position::{EntityId, PositionSample};
    use crate::infrastructure::map_feed::MapFeed;
    use futures::StreamExt;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn test_health_reflects_tracker_state() {
        let state = Arc::new(AppState {
            feed: MapFeed::new(1).handle(),
            map: MapConfig::default(),
            tracking: Arc::new(AtomicBool::new(true)),
        });
        assert_eq!(health_check(State(state.clone())).await, (StatusCode::OK, "ok"));

        state.tracking.store(false, Ordering::SeqCst);
        assert_eq!(
            health_check(State(state)).await,
            (StatusCode::SERVICE_UNAVAILABLE, "tracking stopped")
        );
    }

    #[tokio::test]
    async fn test_list_entities_returns_scene() {
        let mut feed = MapFeed::new(8);
        feed.place_marker(&EntityId::from("U1"), &PositionSample::new(52.0, 9.0), "U1", None);
        let state = Arc::new(AppState {
            feed: feed.handle(),
            map: MapConfig::default(),
            tracking: Arc::new(AtomicBool::new(true)),
        });

        let Json(scene) = list_entities(State(state)).await;
        assert_eq!(scene.markers.len(), 1);
        assert_eq!(scene.markers[&EntityId::from("U1")].label, "U1");
    }

    #[tokio::test]
    async fn test_render_lines_ends_when_feed_is_dropped() {
        let mut feed = MapFeed::new(8);
        let lines = render_lines(feed.handle().subscribe());
        futures::pin_mut!(lines);

        feed.move_marker(&EntityId::from("U1"), &PositionSample::new(1.0, 2.0));
        drop(feed);

        let line = lines.next().await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(value["op"], "move_marker");
        assert_eq!(value["seq"], 1);
        assert!(line.ends_with(b"\n"));
        assert!(lines.next().await.is_none());
    }
}
