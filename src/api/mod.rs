//! HTTP surface: one suggestion endpoint plus health and metrics.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{build_router, start_server, AppState};
