// Event pump - Polls the telemetry source into the session's change queue
use crate::application::telemetry_source::TelemetrySource;
use crate::domain::change::EntityChange;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawn a task that polls `source` every `period` and forwards changes in
/// the order the transport returned them. Stops once the receiver is gone
/// or the remote session has expired; dropping `tx` then ends the session.
pub fn spawn_event_pump(
    source: Arc<dyn TelemetrySource>,
    period: Duration,
    tx: mpsc::Sender<EntityChange>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if tx.is_closed() {
                break;
            }

            match source.poll_events().await {
                Ok(changes) => {
                    if !changes.is_empty() {
                        tracing::debug!("Received {} entity changes", changes.len());
                    }
                    for change in changes {
                        if tx.send(change).await.is_err() {
                            tracing::debug!("Change queue closed, stopping event pump");
                            return;
                        }
                    }
                }
                Err(e) if e.is_session_expired() => {
                    tracing::error!("Telemetry session expired, stopping event pump: {}", e);
                    return;
                }
                Err(e) => {
                    // The next tick polls again
                    tracing::warn!("Telemetry poll failed: {}", e);
                }
            }
        }

        tracing::debug!("Change queue closed, stopping event pump");
    })
}
