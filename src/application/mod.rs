// Application layer - Tracking state machine and collaborator seams
pub mod context;
pub mod dispatcher;
pub mod registry;
pub mod render_adapter;
pub mod snapshot_loader;
pub mod telemetry_source;
pub mod tracking_session;
