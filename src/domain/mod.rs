// Domain layer - Pure tracking data types
pub mod change;
pub mod entity;
pub mod position;
pub mod trail;
