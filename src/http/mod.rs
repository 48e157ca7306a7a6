//! HTTP API server for external control (the UI's start/stop surface)
//!
//! This module provides a REST API for controlling live sessions:
//! - POST /sessions/start - Start a new live conversation
//! - POST /sessions/:id/stop - Stop a session
//! - GET /sessions/:id/status - Query session state and stats
//! - GET /sessions/:id/transcript - Get finalized conversation turns
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, SessionDefaults};
