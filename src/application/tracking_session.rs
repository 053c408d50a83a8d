// Tracking session - Login, snapshot, then incremental updates
use crate::application::context::TrackingContext;
use crate::application::dispatcher::{on_entity_changed, DispatchOutcome};
use crate::application::render_adapter::RenderAdapter;
use crate::application::snapshot_loader::{load_snapshot, SnapshotOutcome};
use crate::application::telemetry_source::{Credentials, SourceError, TelemetrySource};
use crate::domain::change::EntityChange;
use crate::domain::position::EntityId;
use crate::domain::trail::DEFAULT_TRAIL_CAPACITY;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval};

const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);
const MIN_RESYNC_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("handshake failed: {0}")]
    HandshakeFailure(#[source] SourceError),

    #[error("snapshot load failed: {0}")]
    SnapshotFailure(#[source] SourceError),

    #[error("subscription failed: {0}")]
    SubscriptionFailure(#[source] SourceError),
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub trail_capacity: usize,
    /// Entities silent for longer than this are removed; `None` keeps them forever
    pub stale_after: Option<Duration>,
    /// How often the snapshot is reloaded to pick up late units; `None` never
    pub resync_every: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            trail_capacity: DEFAULT_TRAIL_CAPACITY,
            stale_after: None,
            resync_every: None,
        }
    }
}

/// An armed session: the handshake succeeded and the snapshot is loaded
pub struct TrackingSession<A: RenderAdapter> {
    source: Arc<dyn TelemetrySource>,
    context: TrackingContext,
    adapter: A,
    settings: SessionSettings,
}

impl<A: RenderAdapter> TrackingSession<A> {
    /// Log in, load the snapshot and subscribe every entity, in that order.
    ///
    /// A failed handshake returns before any state is built.
    pub async fn establish(
        source: Arc<dyn TelemetrySource>,
        credentials: &Credentials,
        adapter: A,
        settings: SessionSettings,
    ) -> Result<(Self, SnapshotOutcome), SessionError> {
        source
            .login(credentials)
            .await
            .map_err(SessionError::HandshakeFailure)?;
        tracing::info!("Logged in successfully as {}", credentials.username);

        let mut session = Self {
            source,
            context: TrackingContext::new(settings.trail_capacity),
            adapter,
            settings,
        };
        let outcome = session.resync().await?;
        Ok((session, outcome))
    }

    /// Fetch a fresh snapshot and fold it into the existing state.
    ///
    /// Only ids not seen before are subscribed at the transport.
    pub async fn resync(&mut self) -> Result<SnapshotOutcome, SessionError> {
        let descriptors = self
            .source
            .load_entities()
            .await
            .map_err(SessionError::SnapshotFailure)?;

        let outcome = load_snapshot(&mut self.context, descriptors, &mut self.adapter);

        let new_ids = outcome.newly_subscribed();
        if !new_ids.is_empty() {
            if let Err(e) = self.source.subscribe(new_ids).await {
                // Forget the ids so a later resync asks for them again
                for id in new_ids {
                    self.context.unsubscribe(id);
                }
                return Err(SessionError::SubscriptionFailure(e));
            }
            tracing::debug!("Subscribed {} entities for change events", new_ids.len());
        }

        Ok(outcome)
    }

    pub fn dispatch(&mut self, change: &EntityChange) -> DispatchOutcome {
        on_entity_changed(&mut self.context, &change.id, &change.changes, &mut self.adapter)
    }

    /// Remove entities that stopped reporting. No-op unless `stale_after` is set.
    pub fn evict_stale(&mut self, now: DateTime<Utc>) -> Vec<EntityId> {
        let Some(stale_after) = self.settings.stale_after else {
            return Vec::new();
        };
        let Some(cutoff) = TimeDelta::from_std(stale_after)
            .ok()
            .and_then(|delta| now.checked_sub_signed(delta))
        else {
            return Vec::new();
        };

        let removed = self.context.registry.evict_stale(cutoff);
        for id in &removed {
            self.context.unsubscribe(id);
            self.adapter.remove_entity(id);
        }
        if !removed.is_empty() {
            tracing::info!("Evicted {} entities silent for over {:?}", removed.len(), stale_after);
        }
        removed
    }

    /// Consume changes until the sender side closes.
    ///
    /// This task is the only writer of the registry, so changes are applied
    /// strictly in channel order.
    pub async fn run(mut self, mut events: mpsc::Receiver<EntityChange>) -> Self {
        let mut sweep = self
            .settings
            .stale_after
            .map(|period| tokio::time::interval(period.max(MIN_SWEEP_PERIOD)));
        // The snapshot was just loaded by establish, so skip the immediate tick
        let mut resync = self.settings.resync_every.map(|period| {
            let period = period.max(MIN_RESYNC_PERIOD);
            tokio::time::interval_at(Instant::now() + period, period)
        });

        loop {
            tokio::select! {
                change = events.recv() => match change {
                    Some(change) => {
                        self.dispatch(&change);
                    }
                    None => break,
                },
                _ = next_tick(&mut sweep) => {
                    self.evict_stale(Utc::now());
                }
                _ = next_tick(&mut resync) => {
                    if let Err(e) = self.resync().await {
                        tracing::warn!("Snapshot resync failed: {}", e);
                    }
                }
            }
        }

        if self.context.registry.is_empty() {
            tracing::info!("Event stream closed with no tracked entities");
        } else {
            tracing::info!("Event stream closed, tracking {} entities", self.context.registry.len());
        }
        self
    }

    #[cfg(test)]
    pub fn context(&self) -> &TrackingContext {
        &self.context
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
