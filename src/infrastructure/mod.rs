// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod event_pump;
pub mod map_feed;
pub mod wialon_source;
