//! HTTP API handlers for fmea-ws

pub mod health;
pub mod worksheet;

pub use health::health_routes;
pub use worksheet::worksheet_routes;
