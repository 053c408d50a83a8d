// Presentation layer - HTTP surface for map clients
pub mod app_state;
pub mod handlers;
