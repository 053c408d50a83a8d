// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::snapshot_loader::SnapshotOutcome;
use crate::application::telemetry_source::TelemetrySource;
use crate::application::tracking_session::TrackingSession;
use crate::infrastructure::config::load_tracker_config;
use crate::infrastructure::event_pump::spawn_event_pump;
use crate::infrastructure::map_feed::MapFeed;
use crate::infrastructure::wialon_source::WialonSource;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{health_check, list_entities, map_settings, stream_render};

const EVENT_QUEUE_CAPACITY: usize = 1024;
const FEED_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_tracker_config().context("Failed to load tracker configuration")?;

    // Remote telemetry service (infrastructure layer)
    let source: Arc<dyn TelemetrySource> = Arc::new(WialonSource::new(
        config.session.url.clone(),
        config.tracking.icon_size,
    ));

    // Render side: the feed draws, the handle serves readers
    let feed = MapFeed::new(FEED_CAPACITY);
    let feed_handle = feed.handle();

    // Login, snapshot and subscriptions (application layer)
    let (session, outcome) = match TrackingSession::establish(
        source.clone(),
        &config.session.credentials(),
        feed,
        config.tracking.session_settings(),
    )
    .await
    {
        Ok(established) => established,
        Err(e) => {
            tracing::error!("{}", e);
            return Err(e).context("Tracking session could not be established");
        }
    };

    match &outcome {
        SnapshotOutcome::Loaded(report) => {
            if let Some(bounds) = report.bounds {
                tracing::info!(
                    "Units span lat {:.5}..{:.5}, lng {:.5}..{:.5}",
                    bounds.south,
                    bounds.north,
                    bounds.west,
                    bounds.east
                );
            }
        }
        SnapshotOutcome::Empty => match config.tracking.session_settings().resync_every {
            Some(period) => tracing::info!("Units not found, rechecking every {:?}", period),
            None => tracing::info!("Units not found and resync is disabled"),
        },
    }

    // Arm the dispatcher: transport -> queue -> session
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let pump = spawn_event_pump(source, config.tracking.poll_interval(), tx);
    let tracker = tokio::spawn(session.run(rx));

    // The session ends when the pump gives up (e.g. expired remote session)
    let tracking = Arc::new(AtomicBool::new(true));
    let tracking_flag = tracking.clone();
    tokio::spawn(async move {
        if let Err(e) = tracker.await {
            tracing::error!("Tracking task failed: {}", e);
        }
        tracking_flag.store(false, Ordering::SeqCst);
        tracing::error!("Tracking session stopped; live positions are no longer updated");
    });

    // Create application state
    let state = Arc::new(AppState {
        feed: feed_handle,
        map: config.map.clone(),
        tracking,
    });

    // Build router (presentation layer)
    // The stream route stays uncompressed so lines are flushed as they arrive
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/map", get(map_settings))
        .route("/entities", get(list_entities).layer(CompressionLayer::new()))
        .route("/stream", get(stream_render))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    tracing::info!("Starting fleet-tracker on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    pump.abort();
    Ok(())
}
