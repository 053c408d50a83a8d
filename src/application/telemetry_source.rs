// Telemetry source trait - Remote fleet service seen from the core
use crate::domain::change::{EntityChange, ExternalEntityDescriptor};
use crate::domain::position::EntityId;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Remote code for an unknown or expired session
pub const INVALID_SESSION: i64 = 1;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("no active session")]
    NotLoggedIn,

    #[error("malformed response: {0}")]
    Decode(String),
}

impl SourceError {
    /// The session is gone; no further call on it can succeed
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            SourceError::NotLoggedIn | SourceError::Remote { code: INVALID_SESSION, .. }
        )
    }
}

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Establish the remote session
    async fn login(&self, credentials: &Credentials) -> Result<(), SourceError>;

    /// Bulk list of every entity visible to the session
    async fn load_entities(&self) -> Result<Vec<ExternalEntityDescriptor>, SourceError>;

    /// Ask for change notifications for these ids; only called once per id
    async fn subscribe(&self, ids: &[EntityId]) -> Result<(), SourceError>;

    /// Changes delivered since the previous poll, in transport order
    async fn poll_events(&self) -> Result<Vec<EntityChange>, SourceError>;
}
