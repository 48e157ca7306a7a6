//! Live conversation session management
//!
//! This module provides the `LiveSession` abstraction that manages:
//! - Microphone capture and streaming to the live endpoint
//! - Ordered playback of streamed model audio
//! - Per-turn transcript accumulation
//! - Connection lifecycle state and teardown

mod config;
mod session;
mod state;
mod stats;
mod transcript;

pub use config::SessionConfig;
pub use session::LiveSession;
pub use state::ConnectionState;
pub use stats::SessionStats;
pub use transcript::{TranscriptAggregator, TranscriptTurn};
